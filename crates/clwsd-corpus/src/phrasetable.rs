//! Moses phrase tables.
//!
//! Each line is `source ||| target ||| scores [||| alignment [||| counts]]`.
//! Options are kept per source phrase in file order, which is the ranking the
//! phrase table was written with.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use clwsd_types::TranslationOption;

use crate::{LoadMode, load_file, strip_cr};

/// Column layout of a phrase table.
#[derive(Clone, Debug)]
pub struct PhraseTableFormat {
    pub delimiter: String,
    /// Index into the score field holding P(source|target).
    pub p_source_given_target_column: usize,
    /// Index into the score field holding P(target|source).
    pub p_target_given_source_column: usize,
    /// Swap source and target columns (use a target-to-source table).
    pub reverse: bool,
}

impl Default for PhraseTableFormat {
    fn default() -> Self {
        Self {
            delimiter: "|||".to_string(),
            p_source_given_target_column: 0,
            p_target_given_source_column: 2,
            reverse: false,
        }
    }
}

/// Translation options keyed by source phrase.
#[derive(Clone, Debug, Default)]
pub struct PhraseTable {
    options: HashMap<String, Vec<TranslationOption>>,
}

impl PhraseTable {
    pub fn load(path: impl AsRef<Path>, format: PhraseTableFormat) -> Result<Self> {
        Self::load_with_mode(path, format, LoadMode::Mmap)
    }

    pub fn load_with_mode(
        path: impl AsRef<Path>,
        format: PhraseTableFormat,
        mode: LoadMode,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Moses phrase table does not exist: {}", path.display());
        }
        let buffer = load_file(path, mode)?;
        Self::parse(buffer.as_slice(), &format)
            .with_context(|| format!("parse phrase table {}", path.display()))
    }

    pub fn parse(bytes: &[u8], format: &PhraseTableFormat) -> Result<Self> {
        let mut options: HashMap<String, Vec<TranslationOption>> = HashMap::new();
        for (lineno, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = strip_cr(raw_line);
            if line.is_empty() {
                continue;
            }
            let line = std::str::from_utf8(line)
                .with_context(|| format!("line {} is not valid utf8", lineno + 1))?;
            let fields: Vec<&str> = line.split(format.delimiter.as_str()).map(str::trim).collect();
            if fields.len() < 3 {
                anyhow::bail!("line {}: expected at least 3 fields", lineno + 1);
            }
            let (source, target) = if format.reverse {
                (fields[1], fields[0])
            } else {
                (fields[0], fields[1])
            };
            let scores: Vec<f64> = fields[2]
                .split_ascii_whitespace()
                .map(|s| {
                    s.parse::<f64>()
                        .with_context(|| format!("line {}: score {s:?}", lineno + 1))
                })
                .collect::<Result<_>>()?;
            let score = |column: usize| {
                scores.get(column).copied().ok_or_else(|| {
                    anyhow::anyhow!("line {}: missing score column {}", lineno + 1, column)
                })
            };
            let (p_t_s, p_s_t) = if format.reverse {
                (
                    score(format.p_source_given_target_column)?,
                    score(format.p_target_given_source_column)?,
                )
            } else {
                (
                    score(format.p_target_given_source_column)?,
                    score(format.p_source_given_target_column)?,
                )
            };
            let null_alignments = fields
                .get(3)
                .map(|alignment| unaligned_target_count(target, alignment, format.reverse))
                .unwrap_or(0);

            options
                .entry(source.to_string())
                .or_default()
                .push(TranslationOption {
                    target: target.to_string(),
                    p_target_given_source: p_t_s,
                    p_source_given_target: p_s_t,
                    null_alignments,
                });
        }
        Ok(Self { options })
    }

    pub fn contains(&self, source: &str) -> bool {
        self.options.contains_key(source)
    }

    /// Options for an exact source phrase, or an empty slice.
    pub fn options(&self, source: &str) -> &[TranslationOption] {
        self.options.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Number of target tokens with no alignment point in a `i-j` alignment field.
fn unaligned_target_count(target: &str, alignment: &str, reverse: bool) -> u32 {
    let target_len = target.split_ascii_whitespace().count();
    if alignment.is_empty() {
        return 0;
    }
    let mut aligned = vec![false; target_len];
    for point in alignment.split_ascii_whitespace() {
        let Some((s, t)) = point.split_once('-') else {
            continue;
        };
        let index = if reverse { s } else { t };
        if let Ok(j) = index.parse::<usize>()
            && j < target_len
        {
            aligned[j] = true;
        }
    }
    aligned.iter().filter(|a| !**a).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "bank ||| banca ||| 0.8 0.5 0.9 0.6 ||| 0-0 ||| 10 12 8\n\
bank ||| riva del fiume ||| 0.1 0.05 0.2 0.1 ||| 0-0 ||| 1 2 1\n\
closed ||| chiusa ||| 0.7 0.6 0.6 0.5\n";

    #[test]
    fn keeps_options_in_file_order() {
        let table = PhraseTable::parse(TABLE.as_bytes(), &PhraseTableFormat::default()).unwrap();
        assert_eq!(table.len(), 2);
        let opts = table.options("bank");
        assert_eq!(opts.len(), 2);
        assert_eq!(opts[0].target, "banca");
        assert_eq!(opts[0].p_target_given_source, 0.9);
        assert_eq!(opts[0].p_source_given_target, 0.8);
        assert_eq!(opts[1].target_tokens(), vec!["riva", "del", "fiume"]);
        assert_eq!(opts[1].null_alignments, 2);
        assert!(table.options("river").is_empty());
    }

    #[test]
    fn reverse_swaps_direction() {
        let format = PhraseTableFormat {
            reverse: true,
            ..PhraseTableFormat::default()
        };
        let table = PhraseTable::parse(TABLE.as_bytes(), &format).unwrap();
        let opts = table.options("banca");
        assert_eq!(opts[0].target, "bank");
        assert_eq!(opts[0].p_target_given_source, 0.8);
    }

    #[test]
    fn rejects_short_score_fields() {
        let format = PhraseTableFormat::default();
        assert!(PhraseTable::parse(b"a ||| b ||| 0.5\n", &format).is_err());
        assert!(PhraseTable::parse(b"a ||| b\n", &format).is_err());
    }
}
