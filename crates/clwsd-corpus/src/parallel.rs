//! Line-aligned parallel text: line `n` of the source file translates line
//! `n` of the target file. Tokens are whitespace separated.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::require_file;

#[derive(Clone, Debug)]
pub struct ParallelCorpus {
    source: PathBuf,
    target: PathBuf,
}

impl ParallelCorpus {
    pub fn new(source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<Self> {
        let source = source.as_ref().to_path_buf();
        let target = target.as_ref().to_path_buf();
        require_file(&source, "source file")?;
        require_file(&target, "target file")?;
        Ok(Self { source, target })
    }

    /// Open a fresh pass over the corpus. Stops at the end of the shorter file.
    pub fn pairs(&self) -> Result<SentencePairs> {
        let open = |path: &Path| -> Result<Lines<BufReader<File>>> {
            let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            Ok(BufReader::new(file).lines())
        };
        Ok(SentencePairs {
            source: open(&self.source)?,
            target: open(&self.target)?,
            line: 0,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source
    }

    pub fn target_path(&self) -> &Path {
        &self.target
    }
}

/// One tokenised sentence pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentencePair {
    /// 0-based line number.
    pub index: usize,
    pub source: Vec<String>,
    pub target: Vec<String>,
}

pub struct SentencePairs {
    source: Lines<BufReader<File>>,
    target: Lines<BufReader<File>>,
    line: usize,
}

impl Iterator for SentencePairs {
    type Item = Result<SentencePair>;

    fn next(&mut self) -> Option<Self::Item> {
        let source = self.source.next()?;
        let target = self.target.next()?;
        let index = self.line;
        self.line += 1;
        let pair = source
            .and_then(|s| target.map(|t| (s, t)))
            .with_context(|| format!("read sentence pair {}", index + 1))
            .map(|(s, t)| SentencePair {
                index,
                source: tokens(&s),
                target: tokens(&t),
            });
        Some(pair)
    }
}

fn tokens(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn zips_until_shorter_side_ends() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("en.txt");
        let tgt = dir.path().join("it.txt");
        fs::write(&src, "the bank is closed\nthe river bank\nextra line\n").unwrap();
        fs::write(&tgt, "la banca è chiusa\nla riva del fiume\n").unwrap();
        let corpus = ParallelCorpus::new(&src, &tgt).unwrap();
        let pairs: Vec<SentencePair> = corpus.pairs().unwrap().map(Result::unwrap).collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].index, 1);
        assert_eq!(pairs[1].target, vec!["la", "riva", "del", "fiume"]);
    }

    #[test]
    fn missing_files_fail_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("en.txt");
        fs::write(&src, "x\n").unwrap();
        let err = ParallelCorpus::new(&src, dir.path().join("missing.txt")).unwrap_err();
        assert!(err.to_string().contains("target file does not exist"));
    }
}
