//! Shared value types for cross-lingual word sense disambiguation.
//!
//! Everything that crosses a crate boundary lives here: the `(lemma, pos)`
//! key used for registries, bags and co-occurrence tables, the per-classifier
//! key that adds the target language, tagged sentences as produced by a
//! tagger, phrase-table translation options, and labelled exemplars.
//!
//! Keys are plain value types so the same conceptual key always has the same
//! shape, whether it indexes a registry, a bag file name or a classifier.
//!
//! ```rust
//! use clwsd_types::{ExemplarKey, LemmaKey, coarse_pos};
//!
//! let key = LemmaKey::new("bank", coarse_pos("NN"));
//! assert_eq!(key.to_string(), "bank.n");
//! let clf = ExemplarKey::new(key, "it");
//! assert_eq!(clf.file_stem(), "bank.n.it");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Feature value emitted for window positions outside the sentence.
pub const NULL_FEATURE: &str = "{NULL}";

/// Placeholder for a missing part-of-speech tag or lemma.
pub const UNKNOWN: &str = "?";

/// Reduce a tagger tag to the coarse, lowercase single-character class used
/// throughout the pipeline (`NN` -> `n`, `VBZ` -> `v`). Empty tags map to
/// [`UNKNOWN`].
pub fn coarse_pos(tag: &str) -> String {
    match tag.chars().next() {
        Some(c) => c.to_lowercase().collect(),
        None => UNKNOWN.to_string(),
    }
}

/// `(lemma, pos)` pair identifying a focus word, a keyword or a context word.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LemmaKey {
    pub lemma: String,
    pub pos: String,
}

impl LemmaKey {
    pub fn new(lemma: impl Into<String>, pos: impl Into<String>) -> Self {
        Self {
            lemma: lemma.into(),
            pos: pos.into(),
        }
    }

    /// Parse a `lemma.pos` item such as the `item` attribute of a test lexelt.
    /// The split happens at the last dot so lemmas may contain dots.
    pub fn parse_item(item: &str) -> Option<Self> {
        let (lemma, pos) = item.rsplit_once('.')?;
        if lemma.is_empty() || pos.is_empty() {
            return None;
        }
        Some(Self::new(lemma, pos))
    }
}

impl fmt::Display for LemmaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.lemma, self.pos)
    }
}

/// Key of one word expert: a focus lemma for one target language.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ExemplarKey {
    pub focus: LemmaKey,
    pub lang: String,
}

impl ExemplarKey {
    pub fn new(focus: LemmaKey, lang: impl Into<String>) -> Self {
        Self {
            focus,
            lang: lang.into(),
        }
    }

    /// `lemma.pos.lang`, the stem shared by train, bag and model files.
    pub fn file_stem(&self) -> String {
        format!("{}.{}.{}", self.focus.lemma, self.focus.pos, self.lang)
    }
}

impl fmt::Display for ExemplarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_stem())
    }
}

/// A sentence after tagging: three index-aligned channels of equal length.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TaggedSentence {
    pub words: Vec<String>,
    pub postags: Vec<String>,
    pub lemmas: Vec<String>,
}

impl TaggedSentence {
    /// Build from tagger output, coarsening POS tags and replacing missing
    /// POS tags or lemmas with [`UNKNOWN`]. Short channels are padded so the
    /// equal-length contract always holds.
    pub fn from_tagger_output(
        words: Vec<String>,
        postags: Vec<String>,
        lemmas: Vec<String>,
    ) -> Self {
        let n = words.len();
        let mut postags: Vec<String> = postags.iter().take(n).map(|t| coarse_pos(t)).collect();
        postags.resize(n, UNKNOWN.to_string());
        let mut lemmas: Vec<String> = lemmas
            .into_iter()
            .take(n)
            .map(|l| if l.is_empty() { UNKNOWN.to_string() } else { l })
            .collect();
        lemmas.resize(n, UNKNOWN.to_string());
        Self {
            words,
            postags,
            lemmas,
        }
    }

    /// An untagged sentence: POS unknown, lemma equal to the surface form.
    pub fn untagged(words: Vec<String>) -> Self {
        let postags = vec![UNKNOWN.to_string(); words.len()];
        let lemmas = words.clone();
        Self {
            words,
            postags,
            lemmas,
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// `(lemma, pos)` of the token at `index`.
    pub fn key_at(&self, index: usize) -> Option<LemmaKey> {
        Some(LemmaKey::new(
            self.lemmas.get(index)?.clone(),
            self.postags.get(index)?.clone(),
        ))
    }

    /// Iterate `(index, word, pos, lemma)` over all tokens.
    pub fn tokens(&self) -> impl Iterator<Item = (usize, &str, &str, &str)> + '_ {
        self.words
            .iter()
            .zip(&self.postags)
            .zip(&self.lemmas)
            .enumerate()
            .map(|(i, ((w, p), l))| (i, w.as_str(), p.as_str(), l.as_str()))
    }
}

/// One ranked translation candidate for a source phrase.
#[derive(Clone, Debug, PartialEq)]
pub struct TranslationOption {
    pub target: String,
    pub p_target_given_source: f64,
    pub p_source_given_target: f64,
    pub null_alignments: u32,
}

impl TranslationOption {
    /// Target phrase split into tokens.
    pub fn target_tokens(&self) -> Vec<&str> {
        self.target.split(' ').filter(|t| !t.is_empty()).collect()
    }
}

/// A labelled training instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Exemplar {
    pub features: Vec<String>,
    pub label: String,
}

/// Classifier answer for one feature vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub label: String,
    /// Class weights of the nearest neighbours.
    pub distribution: BTreeMap<String, f64>,
    pub distance: f64,
}

/// Senses ordered by descending score; equal scores keep label order.
pub fn rank_distribution(distribution: &BTreeMap<String, f64>) -> Vec<(&str, f64)> {
    let mut ranked: Vec<(&str, f64)> = distribution
        .iter()
        .map(|(sense, score)| (sense.as_str(), *score))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}
