//! Tagging and tokenisation capabilities.
//!
//! The pipeline only ever needs one thing from a tagger: turn a token
//! sequence into an equal-length [`TaggedSentence`]. Backends are a closed
//! set described by [`TaggerSpec`]; remote tagger servers are recognised but
//! fail fast with [`TaggerError::Unsupported`] instead of surfacing later as
//! a broken run.
//!
//! # Example
//! ```no_run
//! use clwsd_tagger::TaggerSpec;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut tagger = TaggerSpec::parse("lex:data/it.lex")?.build()?;
//! let words: Vec<String> = "la banca è chiusa".split(' ').map(String::from).collect();
//! let tagged = tagger.process(&words)?;
//! println!("{:?}", tagged.lemmas);
//! # Ok(()) }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;

use clwsd_types::TaggedSentence;
use thiserror::Error;

pub mod lexicon;
pub mod pretagged;
pub mod tokenizer;

pub use lexicon::{Analysis, Lexicon, LexiconTagger};
pub use pretagged::PretaggedTagger;
pub use tokenizer::{SimpleTokenizer, Tokenizer, Ucto};

#[derive(Debug, Error)]
pub enum TaggerError {
    #[error("tagger backend {0} is not supported; use a lexicon or a pretagged file")]
    Unsupported(String),
    #[error("invalid tagger specification {0:?}")]
    InvalidSpec(String),
    #[error("pretagged input exhausted after {0} sentences")]
    Exhausted(usize),
    #[error("pretagged sentence {line} has {found} tokens, expected {expected}")]
    Mismatch {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("{program} failed: {status}")]
    Subprocess { program: String, status: ExitStatus },
    #[error("tagger I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a token sequence into words, POS tags and lemmas.
pub trait Tagger: Send {
    fn process(&mut self, words: &[String]) -> Result<TaggedSentence, TaggerError>;

    /// Called before every pass over a corpus.
    fn reset(&mut self) -> Result<(), TaggerError> {
        Ok(())
    }
}

/// Leaves tokens untagged: POS `?`, lemma equal to the surface form.
#[derive(Clone, Copy, Debug, Default)]
pub struct Untagged;

impl Tagger for Untagged {
    fn process(&mut self, words: &[String]) -> Result<TaggedSentence, TaggerError> {
        Ok(TaggedSentence::untagged(words.to_vec()))
    }
}

/// Tagger selection, as written on the command line.
///
/// | spec               | backend                                 |
/// |--------------------|-----------------------------------------|
/// | `none`             | [`Untagged`]                            |
/// | `lex:PATH`, `*.lex`| [`LexiconTagger`]                       |
/// | `file:PATH`        | [`PretaggedTagger`]                     |
/// | `frog:PORT`        | Frog server (unsupported)               |
/// | `freeling:CHANNEL` | FreeLing server (unsupported)           |
/// | `corenlp`          | Stanford CoreNLP (unsupported)          |
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaggerSpec {
    Untagged,
    Lexicon(PathBuf),
    Pretagged(PathBuf),
    Frog { port: u16 },
    Freeling { channel: String },
    CoreNlp,
}

impl TaggerSpec {
    pub fn parse(raw: &str) -> Result<Self, TaggerError> {
        let raw = raw.trim();
        let invalid = || TaggerError::InvalidSpec(raw.to_string());
        let (kind, arg) = match raw.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (raw, None),
        };
        let spec = match (kind.to_ascii_lowercase().as_str(), arg) {
            ("none", None) => TaggerSpec::Untagged,
            ("lex", Some(path)) if !path.is_empty() => TaggerSpec::Lexicon(path.into()),
            ("file", Some(path)) if !path.is_empty() => TaggerSpec::Pretagged(path.into()),
            ("frog", Some(port)) => TaggerSpec::Frog {
                port: port.parse().map_err(|_| invalid())?,
            },
            ("freeling", Some(channel)) if !channel.is_empty() => TaggerSpec::Freeling {
                channel: channel.to_string(),
            },
            ("corenlp", None) => TaggerSpec::CoreNlp,
            (_, None) if raw.ends_with(".lex") => TaggerSpec::Lexicon(raw.into()),
            _ => return Err(invalid()),
        };
        Ok(spec)
    }

    pub fn build(&self) -> anyhow::Result<Box<dyn Tagger>> {
        match self {
            TaggerSpec::Untagged => Ok(Box::new(Untagged)),
            TaggerSpec::Lexicon(path) => Ok(Box::new(LexiconTagger::new(Lexicon::load(path)?))),
            TaggerSpec::Pretagged(path) => Ok(Box::new(PretaggedTagger::open(path)?)),
            remote => Err(TaggerError::Unsupported(remote.to_string()).into()),
        }
    }
}

impl fmt::Display for TaggerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaggerSpec::Untagged => f.write_str("none"),
            TaggerSpec::Lexicon(path) => write!(f, "lex:{}", path.display()),
            TaggerSpec::Pretagged(path) => write!(f, "file:{}", path.display()),
            TaggerSpec::Frog { port } => write!(f, "frog:{port}"),
            TaggerSpec::Freeling { channel } => write!(f, "freeling:{channel}"),
            TaggerSpec::CoreNlp => f.write_str("corenlp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_specs() {
        assert_eq!(TaggerSpec::parse("none").unwrap(), TaggerSpec::Untagged);
        assert_eq!(
            TaggerSpec::parse("frog:12345").unwrap(),
            TaggerSpec::Frog { port: 12345 }
        );
        assert_eq!(
            TaggerSpec::parse("de.lex").unwrap(),
            TaggerSpec::Lexicon("de.lex".into())
        );
        assert_eq!(
            TaggerSpec::parse("file:/tmp/en.tagged").unwrap(),
            TaggerSpec::Pretagged("/tmp/en.tagged".into())
        );
        assert!(matches!(
            TaggerSpec::parse("frog:http"),
            Err(TaggerError::InvalidSpec(_))
        ));
        assert!(TaggerSpec::parse("treetagger").is_err());
    }

    #[test]
    fn remote_backends_fail_fast() {
        let err = TaggerSpec::parse("freeling:en")
            .unwrap()
            .build()
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<TaggerError>(),
            Some(TaggerError::Unsupported(_))
        ));
        assert!(TaggerSpec::CoreNlp.build().is_err());
    }

    #[test]
    fn untagged_copies_words() {
        let words = vec!["the".to_string(), "bank".to_string()];
        let tagged = Untagged.process(&words).unwrap();
        assert_eq!(tagged.lemmas, words);
        assert_eq!(tagged.postags, vec!["?", "?"]);
    }
}
