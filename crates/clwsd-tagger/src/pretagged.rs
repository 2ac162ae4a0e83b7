//! Replays tagger output produced offline.
//!
//! One sentence per line, space-separated `word|tag|lemma` tokens. Missing
//! tag or lemma parts become `?`. Lines are consumed in order, one per
//! [`Tagger::process`] call, and [`Tagger::reset`] rewinds to the first line
//! so a multi-pass run sees the same tags every pass.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clwsd_types::TaggedSentence;

use crate::{Tagger, TaggerError};

pub struct PretaggedTagger {
    path: PathBuf,
    reader: BufReader<File>,
    line: usize,
}

impl PretaggedTagger {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).with_context(|| format!("open pretagged file {}", path.display()))?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
            line: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Tagger for PretaggedTagger {
    fn process(&mut self, words: &[String]) -> Result<TaggedSentence, TaggerError> {
        let mut buf = String::new();
        if self.reader.read_line(&mut buf)? == 0 {
            return Err(TaggerError::Exhausted(self.line));
        }
        self.line += 1;
        let mut tagged_words = Vec::new();
        let mut postags = Vec::new();
        let mut lemmas = Vec::new();
        for token in buf.split_whitespace() {
            let mut parts = token.splitn(3, '|');
            tagged_words.push(parts.next().unwrap_or_default().to_string());
            postags.push(parts.next().unwrap_or_default().to_string());
            lemmas.push(parts.next().unwrap_or_default().to_string());
        }
        if tagged_words.len() != words.len() {
            return Err(TaggerError::Mismatch {
                line: self.line,
                expected: words.len(),
                found: tagged_words.len(),
            });
        }
        Ok(TaggedSentence::from_tagger_output(
            tagged_words,
            postags,
            lemmas,
        ))
    }

    fn reset(&mut self) -> Result<(), TaggerError> {
        self.reader = BufReader::new(File::open(&self.path)?);
        self.line = 0;
        Ok(())
    }
}
