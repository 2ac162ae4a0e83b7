use std::path::PathBuf;
use std::process::ExitStatus;

use clwsd_tagger::TaggerError;
use clwsd_types::{ExemplarKey, LemmaKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {message}")]
    Format {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("no training instances in {0}")]
    Empty(PathBuf),
    #[error("expected {expected} features, got {found}")]
    Width { expected: usize, found: usize },
    #[error("{program} failed: {status}")]
    Subprocess { program: String, status: ExitStatus },
    #[error("unparseable classifier output: {0:?}")]
    Output(String),
}

impl ClassifierError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ClassifierError::Io {
            path: path.into(),
            source,
        }
    }
}

/// The focus word could not be found again after tokenisation.
#[derive(Debug, Error)]
#[error("focus word {head:?} not found after tokenisation in {tokens:?}")]
pub struct FocusError {
    pub head: String,
    pub tokens: Vec<String>,
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("no translation resource: give a phrase table or both GIZA alignment files")]
    NoAlignmentSource,
    #[error("{key}: feature vector has {found} values, the schema has {expected}")]
    Schema {
        key: ExemplarKey,
        expected: usize,
        found: usize,
    },
    #[error("training failed for {} classifier(s): {}", .failed.len(), join_keys(.failed))]
    Flush { failed: Vec<ExemplarKey> },
    #[error("failed to build the training thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Tagger(#[from] TaggerError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum TestError {
    #[error("no variable configuration for lemma {0}")]
    MissingVariableConfiguration(String),
    #[error("feature configuration {requested} does not match the trained configuration {trained}")]
    SchemaMismatch { requested: String, trained: String },
    #[error("{key} instance {id} ({stage}): {source}")]
    Focus {
        key: LemmaKey,
        id: u64,
        stage: &'static str,
        #[source]
        source: FocusError,
    },
    #[error("{key} ({stage}): {source}")]
    Classifier {
        key: ExemplarKey,
        stage: &'static str,
        #[source]
        source: ClassifierError,
    },
    #[error(transparent)]
    Tagger(#[from] TaggerError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn join_keys(keys: &[ExemplarKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
