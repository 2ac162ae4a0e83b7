//! Bag-of-words keyword files (`<lemma>.<pos>.<lang>.bag`).
//!
//! One selected keyword per line:
//! `keywordLemma \t keywordPos \t sense \t count \t probability`.
//! Training writes the rows sorted; testing only needs the deduplicated
//! `(keywordLemma, keywordPos)` sequence, in file order.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clwsd_types::{ExemplarKey, LemmaKey};

/// One selected keyword together with the statistics that selected it.
#[derive(Clone, Debug, PartialEq)]
pub struct BagEntry {
    pub keyword: LemmaKey,
    pub sense: String,
    pub count: u64,
    pub probability: f64,
}

pub fn bag_path(dir: &Path, key: &ExemplarKey) -> PathBuf {
    dir.join(format!("{}.bag", key.file_stem()))
}

pub fn write_bag(path: &Path, entries: &[BagEntry]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create bag {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for entry in entries {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            entry.keyword.lemma, entry.keyword.pos, entry.sense, entry.count, entry.probability
        )
        .with_context(|| format!("write bag {}", path.display()))?;
    }
    out.flush()
        .with_context(|| format!("write bag {}", path.display()))
}

pub fn read_bag(path: &Path) -> Result<Vec<BagEntry>> {
    let text = fs::read_to_string(path).with_context(|| format!("read bag {}", path.display()))?;
    let mut entries = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let [lemma, pos, sense, count, probability] = fields.as_slice() else {
            anyhow::bail!(
                "{}:{} expected 5 columns, found {}",
                path.display(),
                lineno + 1,
                fields.len()
            );
        };
        entries.push(BagEntry {
            keyword: LemmaKey::new(*lemma, *pos),
            sense: sense.to_string(),
            count: count
                .trim()
                .parse()
                .with_context(|| format!("{}:{} count", path.display(), lineno + 1))?,
            probability: probability
                .trim()
                .parse()
                .with_context(|| format!("{}:{} probability", path.display(), lineno + 1))?,
        });
    }
    Ok(entries)
}

/// Deduplicated keywords of a bag file in file order.
pub fn read_bag_keywords(path: &Path) -> Result<Vec<LemmaKey>> {
    let mut keywords: Vec<LemmaKey> = Vec::new();
    for entry in read_bag(path)? {
        if !keywords.contains(&entry.keyword) {
            keywords.push(entry.keyword);
        }
    }
    Ok(keywords)
}

/// Load every `*.<lang>.bag` file in `dir`, keyed by focus word.
pub fn load_bags(dir: &Path, lang: &str) -> Result<BTreeMap<LemmaKey, Vec<LemmaKey>>> {
    let mut bags = BTreeMap::new();
    let suffix = format!(".{lang}.bag");
    let listing = fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))?;
    for entry in listing {
        let path = entry
            .with_context(|| format!("list {}", dir.display()))?
            .path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(item) = name.strip_suffix(&suffix) else {
            continue;
        };
        let Some(focus) = LemmaKey::parse_item(item) else {
            continue;
        };
        bags.insert(focus, read_bag_keywords(&path)?);
    }
    Ok(bags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.n.it.bag");
        fs::write(&path, "money\tn\tbanca\t4\n").unwrap();
        assert!(read_bag(&path).is_err());
    }

    #[test]
    fn load_bags_filters_by_language() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bank.n.it.bag"), "money\tn\tbanca\t4\t0.01\n").unwrap();
        fs::write(dir.path().join("bank.n.nl.bag"), "water\tn\toever\t4\t0.01\n").unwrap();
        fs::write(dir.path().join("bank.n.it.train"), "x\ty\n").unwrap();
        let bags = load_bags(dir.path(), "it").unwrap();
        assert_eq!(bags.len(), 1);
        assert_eq!(
            bags[&LemmaKey::new("bank", "n")],
            vec![LemmaKey::new("money", "n")]
        );
    }
}
