//! Classifier parameter search.
//!
//! The search program runs as a black box on a train file and writes a log;
//! its last line names the winning setting as `.`-separated tokens such as
//! `IB1.O.gr.k3`, which [`options_from_log`] turns into classifier options.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::info;

use crate::classifier::with_suffix;

pub fn log_path(train_file: &Path) -> PathBuf {
    with_suffix(train_file, ".paramsearch")
}

/// Map the setting on the last line of a paramsearch log to classifier
/// options. Unknown tokens are ignored.
pub fn options_from_log(log: &str) -> String {
    let Some(last) = log.lines().rev().find(|l| !l.trim().is_empty()) else {
        return String::new();
    };
    let mut options: Vec<String> = Vec::new();
    for token in last.trim().split('.') {
        match token {
            "IB1" | "IG" | "TRIBL" | "IB2" | "TRIBL2" => options.push(format!("-a {token}")),
            "M" | "C" | "D" | "DC" | "L" | "J" | "N" | "I" | "O" => {
                options.push(format!("-m {token}"))
            }
            "nw" | "gr" | "ig" | "x2" | "sv" => options.push(format!("-w {token}")),
            "Z" | "IL" => options.push(format!("-d {token}")),
            _ if token.starts_with("ED:") => options.push(format!("-d {token}")),
            _ => {
                if let Some(n) = numeric_suffix(token, 'L') {
                    options.push(format!("-L {n}"));
                } else if let Some(n) = numeric_suffix(token, 'k') {
                    options.push(format!("-k {n}"));
                }
            }
        }
    }
    options.join(" ")
}

fn numeric_suffix(token: &str, prefix: char) -> Option<&str> {
    token
        .strip_prefix(prefix)
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Options from the paramsearch log of `train_file`, if the search ran.
pub fn read_options(train_file: &Path) -> Result<Option<String>> {
    let path = log_path(train_file);
    if !path.is_file() {
        return Ok(None);
    }
    let log = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    Ok(Some(options_from_log(&log)))
}

/// Run `<program> ib1 <train_file>` with its output captured in the log.
pub fn run_paramsearch(program: &str, train_file: &Path) -> Result<PathBuf> {
    let path = log_path(train_file);
    let log = File::create(&path).with_context(|| format!("create {}", path.display()))?;
    info!("{program} ib1 {}", train_file.display());
    let status = Command::new(program)
        .arg("ib1")
        .arg(train_file)
        .stdout(Stdio::from(log))
        .status()
        .with_context(|| format!("run {program}"))?;
    if !status.success() {
        anyhow::bail!("{program} failed on {}: {status}", train_file.display());
    }
    Ok(path)
}
