//! Line-oriented tokenisation of raw test contexts.
//!
//! A tokenizer receives a batch of lines and must return exactly one token
//! sequence per input line.

use std::fs;
use std::io::Write;
use std::process::Command;

use crate::TaggerError;

pub trait Tokenizer {
    fn tokenize(&self, lines: &[String]) -> Result<Vec<Vec<String>>, TaggerError>;
}

/// Splits on whitespace and peels leading and trailing punctuation into
/// separate tokens. Word-internal punctuation (`e.g.`, `l'acqua`) is kept.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleTokenizer;

impl SimpleTokenizer {
    pub fn tokenize_line(line: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for chunk in line.split_whitespace() {
            let start = chunk
                .char_indices()
                .find(|(_, c)| !is_punct(*c))
                .map(|(i, _)| i)
                .unwrap_or(chunk.len());
            let end = chunk
                .char_indices()
                .rev()
                .find(|(_, c)| !is_punct(*c))
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(start);
            tokens.extend(chunk[..start].chars().map(String::from));
            if start < end {
                tokens.push(chunk[start..end].to_string());
            }
            tokens.extend(chunk[end.max(start)..].chars().map(String::from));
        }
        tokens
    }
}

fn is_punct(c: char) -> bool {
    c.is_ascii_punctuation() || matches!(c, '«' | '»' | '“' | '”' | '‘' | '’' | '…' | '¿' | '¡')
}

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, lines: &[String]) -> Result<Vec<Vec<String>>, TaggerError> {
        Ok(lines.iter().map(|l| Self::tokenize_line(l)).collect())
    }
}

/// The `ucto` rule-based tokenizer, run once per batch as
/// `ucto -L<lang> -m -n <in> <out>`.
#[derive(Clone, Debug)]
pub struct Ucto {
    pub lang: String,
    pub program: String,
}

impl Ucto {
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            program: "ucto".to_string(),
        }
    }
}

impl Tokenizer for Ucto {
    fn tokenize(&self, lines: &[String]) -> Result<Vec<Vec<String>>, TaggerError> {
        let mut input = tempfile::NamedTempFile::new()?;
        for line in lines {
            writeln!(input, "{}", line.replace('\n', " "))?;
        }
        input.flush()?;
        let output = tempfile::NamedTempFile::new()?;
        let status = Command::new(&self.program)
            .arg(format!("-L{}", self.lang))
            .args(["-m", "-n"])
            .arg(input.path())
            .arg(output.path())
            .status()?;
        if !status.success() {
            return Err(TaggerError::Subprocess {
                program: self.program.clone(),
                status,
            });
        }
        let text = fs::read_to_string(output.path())?;
        let mut out: Vec<Vec<String>> = text
            .lines()
            .take(lines.len())
            .map(|l| l.split_whitespace().map(str::to_string).collect())
            .collect();
        out.resize(lines.len(), Vec::new());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peels_edge_punctuation() {
        assert_eq!(
            SimpleTokenizer::tokenize_line("The bank, (finally) closed."),
            vec!["The", "bank", ",", "(", "finally", ")", "closed", "."]
        );
        assert_eq!(
            SimpleTokenizer::tokenize_line("e.g. l'acqua ..."),
            vec!["e.g", ".", "l'acqua", ".", ".", "."]
        );
    }

    #[test]
    fn one_sequence_per_line() {
        let lines = vec!["a b".to_string(), String::new()];
        let out = SimpleTokenizer.tokenize(&lines).unwrap();
        assert_eq!(out, vec![vec!["a".to_string(), "b".to_string()], vec![]]);
    }

    #[test]
    fn missing_ucto_is_an_io_error() {
        let ucto = Ucto {
            lang: "en".into(),
            program: "/nonexistent/ucto".into(),
        };
        assert!(matches!(
            ucto.tokenize(&["x".to_string()]),
            Err(TaggerError::Io(_))
        ));
    }
}
