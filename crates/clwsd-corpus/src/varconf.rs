//! Per-lemma feature configurations chosen after a configuration sweep.
//!
//! Each line is `lemma <whitespace> id` where `id` is a configuration id such
//! as `c3`, `c1lp` or `c2lpb`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::strip_bom;

/// Compact feature configuration id: `c<N>` followed by any of `l` (lemma
/// channel), `p` (POS channel) and `b` (bag of words).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ConfigId {
    pub context_size: usize,
    pub pos: bool,
    pub lemma: bool,
    pub bag: bool,
}

impl FromStr for ConfigId {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix('c')
            .ok_or_else(|| anyhow::anyhow!("configuration id {raw:?} does not start with 'c'"))?;
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            anyhow::bail!("configuration id {raw:?} has no context size");
        }
        let context_size = rest[..digits]
            .parse()
            .with_context(|| format!("configuration id {raw:?}"))?;
        let mut id = ConfigId {
            context_size,
            ..ConfigId::default()
        };
        for flag in rest[digits..].chars() {
            match flag {
                'l' => id.lemma = true,
                'p' => id.pos = true,
                'b' => id.bag = true,
                other => anyhow::bail!("configuration id {raw:?}: unknown flag {other:?}"),
            }
        }
        Ok(id)
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.context_size)?;
        if self.lemma {
            f.write_str("l")?;
        }
        if self.pos {
            f.write_str("p")?;
        }
        if self.bag {
            f.write_str("b")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct VariableConfiguration {
    by_lemma: BTreeMap<String, ConfigId>,
}

impl VariableConfiguration {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("read variable configuration {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parse {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut by_lemma = BTreeMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = strip_bom(line).trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(lemma), Some(id)) = (fields.next(), fields.next()) else {
                anyhow::bail!("line {}: expected 'lemma id'", lineno + 1);
            };
            let id: ConfigId = id.parse().with_context(|| format!("line {}", lineno + 1))?;
            by_lemma.insert(lemma.to_string(), id);
        }
        Ok(Self { by_lemma })
    }

    pub fn get(&self, lemma: &str) -> Option<ConfigId> {
        self.by_lemma.get(lemma).copied()
    }

    pub fn len(&self) -> usize {
        self.by_lemma.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_lemma.is_empty()
    }
}
