//! GIZA++ `A3.final` alignment files and their intersection.
//!
//! Each sentence pair spans three lines:
//!
//! ```text
//! # Sentence pair (1) source length 4 target length 4 alignment score : 1.3e-06
//! la banca è chiusa
//! NULL ({ }) the ({ 1 }) bank ({ 2 }) is ({ 3 }) closed ({ 4 })
//! ```
//!
//! The second line holds the words being aligned *to*; the third line holds
//! the aligned-*from* words, each followed by the 1-based positions it links
//! to. Files are read as streams so two directional models can be advanced in
//! lockstep with the corpus.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// One sentence pair of a directional alignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GizaSentence {
    /// Words on the second line.
    pub target: Vec<String>,
    /// Words on the third line, without the `NULL` pseudo-word.
    pub source: Vec<String>,
    /// Per source word, the 0-based target positions it is linked to.
    pub links: Vec<Vec<usize>>,
}

impl GizaSentence {
    pub fn parse(target_line: &str, source_line: &str) -> Result<Self> {
        let target: Vec<String> = target_line.split_whitespace().map(str::to_string).collect();
        let mut tokens = source_line.split_whitespace();
        let mut source = Vec::new();
        let mut links = Vec::new();
        let mut first = true;
        while let Some(word) = tokens.next() {
            match tokens.next() {
                Some("({") => {}
                other => anyhow::bail!("expected '({{' after {word:?}, found {other:?}"),
            }
            let mut positions = Vec::new();
            loop {
                match tokens.next() {
                    Some("})") => break,
                    Some(n) => {
                        let pos: usize = n
                            .parse()
                            .with_context(|| format!("alignment position {n:?} for {word:?}"))?;
                        if pos == 0 || pos > target.len() {
                            anyhow::bail!(
                                "alignment position {pos} for {word:?} out of range (target length {})",
                                target.len()
                            );
                        }
                        positions.push(pos - 1);
                    }
                    None => anyhow::bail!("unterminated alignment block for {word:?}"),
                }
            }
            if first && word == "NULL" {
                first = false;
                continue;
            }
            first = false;
            source.push(word.to_string());
            links.push(positions);
        }
        Ok(Self {
            target,
            source,
            links,
        })
    }
}

/// Streaming reader over an `A3.final` file.
pub struct GizaReader<R> {
    reader: R,
    origin: PathBuf,
    line: usize,
}

impl GizaReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("open GIZA alignment {}", path.display()))?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R: BufRead> GizaReader<R> {
    pub fn new(reader: R, origin: impl AsRef<Path>) -> Self {
        Self {
            reader,
            origin: origin.as_ref().to_path_buf(),
            line: 0,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = String::new();
        let n = self
            .reader
            .read_line(&mut buf)
            .with_context(|| format!("read {}:{}", self.origin.display(), self.line + 1))?;
        if n == 0 {
            return Ok(None);
        }
        self.line += 1;
        Ok(Some(buf.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn read_sentence(&mut self) -> Result<Option<GizaSentence>> {
        let header = loop {
            match self.next_line()? {
                None => return Ok(None),
                Some(l) if l.trim().is_empty() => continue,
                Some(l) => break l,
            }
        };
        if !header.starts_with('#') {
            anyhow::bail!(
                "{}:{} expected sentence pair header, found {:?}",
                self.origin.display(),
                self.line,
                header
            );
        }
        let target = self.next_line()?.ok_or_else(|| {
            anyhow::anyhow!("{}:{} truncated sentence pair", self.origin.display(), self.line)
        })?;
        let source = self.next_line()?.ok_or_else(|| {
            anyhow::anyhow!("{}:{} truncated sentence pair", self.origin.display(), self.line)
        })?;
        GizaSentence::parse(&target, &source)
            .with_context(|| format!("{}:{}", self.origin.display(), self.line))
            .map(Some)
    }
}

impl<R: BufRead> Iterator for GizaReader<R> {
    type Item = Result<GizaSentence>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_sentence().transpose()
    }
}

/// Contiguous run of target tokens aligned to one source token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlignedSpan {
    pub start: usize,
    pub len: usize,
}

/// Source→target links present in both directional alignments of a
/// sentence pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlignmentIntersection {
    target: Vec<String>,
    links: Vec<Vec<usize>>,
}

impl AlignmentIntersection {
    /// Intersect a source→target alignment with a target→source alignment of
    /// the same sentence pair.
    pub fn intersect(s2t: &GizaSentence, t2s: &GizaSentence) -> Result<Self> {
        if s2t.source.len() != t2s.target.len() || s2t.target.len() != t2s.source.len() {
            anyhow::bail!(
                "mismatch between directional alignments ({}x{} vs {}x{}), unable to intersect",
                s2t.source.len(),
                s2t.target.len(),
                t2s.target.len(),
                t2s.source.len()
            );
        }
        let reverse: HashSet<(usize, usize)> = t2s
            .links
            .iter()
            .enumerate()
            .flat_map(|(j, sources)| sources.iter().map(move |&i| (i, j)))
            .collect();
        let links = s2t
            .links
            .iter()
            .enumerate()
            .map(|(i, targets)| {
                let mut kept: Vec<usize> = targets
                    .iter()
                    .copied()
                    .filter(|j| reverse.contains(&(i, *j)))
                    .collect();
                kept.sort_unstable();
                kept.dedup();
                kept
            })
            .collect();
        Ok(Self {
            target: s2t.target.clone(),
            links,
        })
    }

    /// Target positions linked to `source_index` in both directions.
    pub fn links(&self, source_index: usize) -> &[usize] {
        self.links.get(source_index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The aligned target span of a source token. `None` when the token is
    /// unaligned or its links are not contiguous.
    pub fn aligned_target(&self, source_index: usize) -> Option<AlignedSpan> {
        let links = self.links(source_index);
        let (&first, &last) = (links.first()?, links.last()?);
        if last - first + 1 != links.len() {
            return None;
        }
        Some(AlignedSpan {
            start: first,
            len: links.len(),
        })
    }

    /// Surface text of a span, space-joined.
    pub fn target_text(&self, span: AlignedSpan) -> String {
        self.target[span.start..span.start + span.len].join(" ")
    }

    pub fn target(&self) -> &[String] {
        &self.target
    }
}
