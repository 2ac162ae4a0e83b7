//! Readers and writers for every file the disambiguation pipeline consumes or
//! produces.
//!
//! - [`TargetWords`]: the registry of tracked `(lemma, pos)` keys, optionally
//!   with a sense inventory per target language.
//! - [`PhraseTable`]: Moses phrase tables, loaded through mmap or an owned
//!   buffer chosen at runtime via [`LoadMode`].
//! - [`GizaReader`] and [`AlignmentIntersection`]: streaming GIZA++ `A3` files
//!   and the intersection of two directional alignments.
//! - [`ParallelCorpus`]: line-aligned source and target text.
//! - [`bag`]: bag-of-words keyword files.
//! - [`TestSet`]: SemEval cross-lingual WSD test XML.
//! - [`VariableConfiguration`]: per-lemma feature configuration ids.
//!
//! All loaders return `anyhow::Result` with the offending file and line in
//! the error context.
//!
//! # Example
//! ```no_run
//! use clwsd_corpus::{LoadMode, PhraseTable, PhraseTableFormat, TargetWords};
//! use clwsd_types::LemmaKey;
//!
//! # fn main() -> anyhow::Result<()> {
//! let registry = TargetWords::load("data/targetwords")?;
//! let table = PhraseTable::load_with_mode(
//!     "model/phrase-table",
//!     PhraseTableFormat::default(),
//!     LoadMode::Mmap,
//! )?;
//! if registry.contains(&LemmaKey::new("bank", "n")) {
//!     for option in table.options("bank") {
//!         println!("{} {}", option.target, option.p_target_given_source);
//!     }
//! }
//! # Ok(()) }
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::Mmap;

pub mod bag;
pub mod giza;
pub mod parallel;
pub mod phrasetable;
pub mod registry;
pub mod testset;
pub mod varconf;

pub use bag::{BagEntry, bag_path, load_bags, read_bag, read_bag_keywords, write_bag};
pub use giza::{AlignedSpan, AlignmentIntersection, GizaReader, GizaSentence};
pub use parallel::ParallelCorpus;
pub use phrasetable::{PhraseTable, PhraseTableFormat};
pub use registry::{Senses, TargetWords};
pub use testset::{Lexelt, TestInstance, TestSet, language_code};
pub use varconf::{ConfigId, VariableConfiguration};

/// Strategy for loading large resource files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map the file (fast, no copy of the raw bytes).
    Mmap,
    /// Read the file into an owned buffer (portable fallback).
    Owned,
}

impl LoadMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "mmap" => Some(LoadMode::Mmap),
            "owned" => Some(LoadMode::Owned),
            _ => None,
        }
    }
}

pub(crate) enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

pub(crate) fn load_file(path: &Path, mode: LoadMode) -> Result<Buffer> {
    match mode {
        LoadMode::Mmap => {
            let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            unsafe { Mmap::map(&file) }
                .map(Buffer::Mmap)
                .with_context(|| format!("mmap {}", path.display()))
        }
        LoadMode::Owned => {
            let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            Ok(Buffer::Owned(buf))
        }
    }
}

/// Fail early when a required input is missing.
pub fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        anyhow::bail!("{what} does not exist: {}", path.display());
    }
    Ok(())
}

pub(crate) fn strip_cr(line: &[u8]) -> &[u8] {
    if line.ends_with(b"\r") {
        &line[..line.len() - 1]
    } else {
        line
    }
}

pub(crate) fn strip_bom(line: &str) -> &str {
    line.strip_prefix('\u{feff}').unwrap_or(line)
}
