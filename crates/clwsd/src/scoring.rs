//! Per-lemma scoring and the aggregate results report.
//!
//! The scorer is an external script run once per lemma and output kind. It
//! writes `<outdir>/<lemma>.<pos>.{best,oof}.results` containing a
//! `precision = P, recall = R` line; [`report`] gathers those into
//! `<outdir>/results`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use clwsd_types::LemmaKey;
use tracing::{error, info, warn};

pub const REPORT_FILE: &str = "results";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    Best,
    OutOfFive,
}

impl OutputKind {
    pub fn extension(self) -> &'static str {
        match self {
            OutputKind::Best => "best",
            OutputKind::OutOfFive => "oof",
        }
    }
}

pub fn output_path(dir: &Path, key: &LemmaKey, kind: OutputKind) -> PathBuf {
    dir.join(format!("{}.{}", key, kind.extension()))
}

/// Runs `perl <script> <output> <gold> [-t oof]` for each lemma.
#[derive(Clone, Debug)]
pub struct Scorer {
    pub interpreter: String,
    pub script: PathBuf,
}

impl Scorer {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: "perl".to_string(),
            script: script.into(),
        }
    }

    /// `<testdir>/<lang>/<lemma>_gold.txt`.
    pub fn gold_path(test_dir: &Path, lang: &str, key: &LemmaKey) -> PathBuf {
        test_dir.join(lang).join(format!("{}_gold.txt", key.lemma))
    }

    /// Score one output file. A failing scorer is logged, not fatal.
    pub fn score(
        &self,
        output_dir: &Path,
        test_dir: &Path,
        lang: &str,
        key: &LemmaKey,
        kind: OutputKind,
    ) -> Result<bool> {
        let output = output_path(output_dir, key, kind);
        let gold = Self::gold_path(test_dir, lang, key);
        let errors = output_dir.join(format!("{}.{}.scorerr", key, kind.extension()));
        let stderr = File::create(&errors).with_context(|| format!("create {}", errors.display()))?;

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&self.script).arg(&output).arg(&gold);
        if kind == OutputKind::OutOfFive {
            cmd.args(["-t", "oof"]);
        }
        let status = match cmd.stderr(Stdio::from(stderr)).status() {
            Ok(status) => status,
            Err(e) => {
                error!("scorer failed to start for {key}: {e}");
                return Ok(false);
            }
        };
        if !status.success() {
            error!(
                "scorer failed for {key} ({status}), inspect {}",
                errors.display()
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Score every lemma in both kinds, then write the report.
    pub fn score_all(
        &self,
        output_dir: &Path,
        test_dir: &Path,
        lang: &str,
        keys: &[LemmaKey],
    ) -> Result<Report> {
        for key in keys {
            info!("scoring {key}");
            self.score(output_dir, test_dir, lang, key, OutputKind::Best)?;
            self.score(output_dir, test_dir, lang, key, OutputKind::OutOfFive)?;
        }
        report(output_dir)
    }
}

/// `(P, R)` from a `precision = P, recall = R` line.
pub fn parse_precision_recall(line: &str) -> Option<(f64, f64)> {
    let rest = line.strip_prefix("precision = ")?;
    let (precision, rest) = rest.split_once(',')?;
    let recall = rest.split_once("recall = ")?.1;
    Some((precision.trim().parse().ok()?, recall.trim().parse().ok()?))
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Section {
    /// `(lemma, precision, recall)` in file name order.
    pub rows: Vec<(String, f64, f64)>,
}

impl Section {
    pub fn average(&self) -> (f64, f64) {
        if self.rows.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.rows.len() as f64;
        let p: f64 = self.rows.iter().map(|r| r.1).sum();
        let r: f64 = self.rows.iter().map(|r| r.2).sum();
        (p / n, r / n)
    }

    fn render(&self, out: &mut String) {
        for (lemma, p, r) in &self.rows {
            out.push_str(&format!("{lemma}:\t{p}\t{r}\n"));
        }
        let (p, r) = self.average();
        out.push_str(&format!("AVERAGE:\t{p}\t{r}\n"));
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    pub best: Section,
    pub out_of_five: Section,
}

impl Report {
    pub fn render(&self) -> String {
        let mut out = String::from("BEST RESULTS\n-------------\n");
        self.best.render(&mut out);
        out.push_str("\n\nOUT OF FIVE RESULTS\n-------------\n");
        self.out_of_five.render(&mut out);
        out
    }
}

fn collect_section(dir: &Path, kind: OutputKind) -> Result<Section> {
    let suffix = format!(".{}.results", kind.extension());
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("read dir {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(&suffix))
        })
        .collect();
    files.sort();

    let mut section = Section::default();
    for file in files {
        let Some(lemma) = file
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split('.').next())
            .map(str::to_string)
        else {
            continue;
        };
        let text = fs::read_to_string(&file).with_context(|| format!("read {}", file.display()))?;
        match text.lines().find_map(parse_precision_recall) {
            Some((p, r)) => section.rows.push((lemma, p, r)),
            None => warn!("no precision line in {}", file.display()),
        }
    }
    if section.rows.is_empty() {
        warn!("no {} results in {}", kind.extension(), dir.display());
    }
    Ok(section)
}

/// Gather the per-lemma results in `dir` and write `<dir>/results`.
pub fn report(dir: &Path) -> Result<Report> {
    let report = Report {
        best: collect_section(dir, OutputKind::Best)?,
        out_of_five: collect_section(dir, OutputKind::OutOfFive)?,
    };
    let path = dir.join(REPORT_FILE);
    fs::write(&path, report.render()).with_context(|| format!("write {}", path.display()))?;
    Ok(report)
}
