//! Lexicon lookup tagger.
//!
//! A lexicon is a TSV file of `word \t lemma \t tag` rows. Words missing from
//! the lexicon are run through suffix rules and accepted only when the
//! resulting candidate is itself a lemma of the lexicon, the same way morphy
//! verifies its guesses against the dictionary.
//!
//! Suffix rules live in an optional sibling file (`it.lex` -> `it.rules`),
//! one `suffix replacement` pair per line; a lone suffix means "strip it".
//! A missing rules file is treated as empty.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clwsd_types::{TaggedSentence, UNKNOWN, coarse_pos};

use crate::{Tagger, TaggerError};

/// How a word was analysed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Analysis {
    Lexicon,
    Rule { suffix: String, replacement: String },
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
    lemma: String,
    tag: String,
}

#[derive(Clone, Debug, Default)]
pub struct Lexicon {
    words: HashMap<String, Entry>,
    /// Lemma -> tag of its first lexicon row.
    lemmas: HashMap<String, String>,
    rules: Vec<(String, String)>,
}

impl Lexicon {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("read lexicon {}", path.display()))?;
        let mut lexicon =
            Self::parse(&text).with_context(|| format!("parse lexicon {}", path.display()))?;
        let rules_path = path.with_extension("rules");
        if rules_path.exists() {
            let text = fs::read_to_string(&rules_path)
                .with_context(|| format!("read suffix rules {}", rules_path.display()))?;
            lexicon.rules = parse_rules(&text);
        }
        Ok(lexicon)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut lexicon = Self::default();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim_start_matches('\u{feff}');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let [word, lemma, tag, ..] = fields.as_slice() else {
                anyhow::bail!("line {}: expected word, lemma and tag", lineno + 1);
            };
            lexicon.insert(word, lemma, tag);
        }
        Ok(lexicon)
    }

    /// First row wins for both the word and the lemma tables.
    pub fn insert(&mut self, word: &str, lemma: &str, tag: &str) {
        self.words
            .entry(word.to_string())
            .or_insert_with(|| Entry {
                lemma: lemma.to_string(),
                tag: tag.to_string(),
            });
        self.lemmas
            .entry(lemma.to_string())
            .or_insert_with(|| tag.to_string());
    }

    pub fn with_rules(mut self, rules: Vec<(String, String)>) -> Self {
        self.rules = rules;
        self
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// `(lemma, tag, analysis)` for one word. Tries the surface form, then
    /// its lowercase form, then the suffix rules in order.
    pub fn analyse(&self, word: &str) -> (String, String, Analysis) {
        let lower = word.to_lowercase();
        for form in [word, lower.as_str()] {
            if let Some(entry) = self.words.get(form) {
                return (entry.lemma.clone(), entry.tag.clone(), Analysis::Lexicon);
            }
        }
        for (suffix, replacement) in &self.rules {
            if let Some(stem) = lower.strip_suffix(suffix.as_str()) {
                let candidate = format!("{stem}{replacement}");
                if let Some(tag) = self.lemmas.get(&candidate) {
                    return (
                        candidate,
                        tag.clone(),
                        Analysis::Rule {
                            suffix: suffix.clone(),
                            replacement: replacement.clone(),
                        },
                    );
                }
            }
        }
        (word.to_string(), UNKNOWN.to_string(), Analysis::Unknown)
    }
}

fn parse_rules(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let suffix = parts.next()?;
            if suffix.starts_with('#') {
                return None;
            }
            Some((suffix.to_string(), parts.next().unwrap_or("").to_string()))
        })
        .collect()
}

pub struct LexiconTagger {
    lexicon: Lexicon,
}

impl LexiconTagger {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }
}

impl Tagger for LexiconTagger {
    fn process(&mut self, words: &[String]) -> Result<TaggedSentence, TaggerError> {
        let mut postags = Vec::with_capacity(words.len());
        let mut lemmas = Vec::with_capacity(words.len());
        for word in words {
            let (lemma, tag, _) = self.lexicon.analyse(word);
            postags.push(coarse_pos(&tag));
            lemmas.push(lemma);
        }
        Ok(TaggedSentence::from_tagger_output(
            words.to_vec(),
            postags,
            lemmas,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Lexicon {
        Lexicon::parse("banca\tbanca\tNOM\nbanche\tbanca\tNOM\nchiusa\tchiudere\tVER:pper\n")
            .unwrap()
            .with_rules(vec![("e".into(), "a".into()), ("i".into(), "o".into())])
    }

    #[test]
    fn looks_up_surface_and_lowercase() {
        let lex = lexicon();
        assert_eq!(lex.len(), 3);
        assert_eq!(lex.analyse("Banche").0, "banca");
        assert_eq!(lex.analyse("chiusa").1, "VER:pper");
    }

    #[test]
    fn suffix_rules_are_verified_against_lemmas() {
        let lex = lexicon();
        let (lemma, tag, analysis) = lex.analyse("bance");
        assert_eq!((lemma.as_str(), tag.as_str()), ("banca", "NOM"));
        assert_eq!(
            analysis,
            Analysis::Rule {
                suffix: "e".into(),
                replacement: "a".into()
            }
        );

        // "bancho" is not a lemma, so the guess is rejected.
        let (lemma, tag, analysis) = lex.analyse("banchi");
        assert_eq!((lemma.as_str(), tag.as_str()), ("banchi", "?"));
        assert_eq!(analysis, Analysis::Unknown);
    }

    #[test]
    fn rule_hit_takes_the_lemma_tag() {
        let mut lex = Lexicon::default().with_rules(vec![("i".into(), "o".into())]);
        lex.insert("fiume", "fiume", "NOM");
        let (lemma, tag, analysis) = lex.analyse("fiumi");
        assert_eq!((lemma.as_str(), tag.as_str()), ("fiumi", "?"));
        assert_eq!(analysis, Analysis::Unknown);

        lex.insert("libro", "libro", "NOM");
        let (lemma, tag, analysis) = lex.analyse("libri");
        assert_eq!((lemma.as_str(), tag.as_str()), ("libro", "NOM"));
        assert!(matches!(analysis, Analysis::Rule { .. }));
    }

    #[test]
    fn tagger_coarsens_tags() {
        let mut tagger = LexiconTagger::new(lexicon());
        let words: Vec<String> = ["la", "banca", "è", "chiusa"]
            .iter()
            .map(|w| w.to_string())
            .collect();
        let tagged = tagger.process(&words).unwrap();
        assert_eq!(tagged.postags, vec!["?", "n", "?", "v"]);
        assert_eq!(tagged.lemmas, vec!["la", "banca", "è", "chiudere"]);
    }

    #[test]
    fn parses_rule_files() {
        let rules = parse_rules("# it\ni o\nhe\n\n");
        assert_eq!(
            rules,
            vec![("i".into(), "o".into()), ("he".into(), String::new())]
        );
    }
}
