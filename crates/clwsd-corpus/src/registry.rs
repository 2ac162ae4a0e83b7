//! Target-word registry.
//!
//! Tab-separated, one key per line, either `lemma\tpos` (track the lemma with
//! no fixed sense inventory) or `lemma\tpos\tlang\tsense1;sense2;...`. Blank
//! lines and lines starting with `#` are skipped; a leading byte-order mark is
//! stripped. Any other row shape aborts the load.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clwsd_types::LemmaKey;

use crate::strip_bom;

/// Sense inventory attached to a registry key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Senses {
    /// Track the lemma; any sense observed in the corpus is acceptable.
    Untracked,
    /// Known senses per target language, in file order.
    ByLanguage(BTreeMap<String, Vec<String>>),
}

/// Registry of `(lemma, pos)` keys worth extracting. Immutable once loaded.
#[derive(Clone, Debug, Default)]
pub struct TargetWords {
    entries: BTreeMap<LemmaKey, Senses>,
}

impl TargetWords {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("read target words {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parse target words {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut entries: BTreeMap<LemmaKey, Senses> = BTreeMap::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = strip_bom(raw);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.trim().split('\t').collect();
            match fields.as_slice() {
                [lemma, pos] => {
                    entries.insert(LemmaKey::new(lemma.trim(), pos.trim()), Senses::Untracked);
                }
                [lemma, pos, lang, senses] => {
                    let key = LemmaKey::new(lemma.trim(), pos.trim());
                    let senses: Vec<String> = senses
                        .split(';')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                    let slot = entries
                        .entry(key)
                        .or_insert_with(|| Senses::ByLanguage(BTreeMap::new()));
                    if matches!(slot, Senses::Untracked) {
                        *slot = Senses::ByLanguage(BTreeMap::new());
                    }
                    if let Senses::ByLanguage(by_lang) = slot {
                        by_lang.insert(lang.trim().to_string(), senses);
                    }
                }
                other => anyhow::bail!(
                    "line {}: invalid format in target words ({} columns, expected 2 or 4)",
                    lineno + 1,
                    other.len()
                ),
            }
        }
        Ok(Self { entries })
    }

    pub fn contains(&self, key: &LemmaKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &LemmaKey) -> Option<&Senses> {
        self.entries.get(key)
    }

    /// Known senses of `key` in `lang`, if the registry lists any.
    pub fn senses(&self, key: &LemmaKey, lang: &str) -> Option<&[String]> {
        match self.entries.get(key)? {
            Senses::Untracked => None,
            Senses::ByLanguage(by_lang) => by_lang.get(lang).map(Vec::as_slice),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &LemmaKey> + '_ {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
