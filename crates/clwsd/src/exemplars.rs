//! Per-word-expert exemplar buffers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clwsd_types::{Exemplar, ExemplarKey};
use rayon::prelude::*;
use tracing::{error, info};

use crate::classifier::{ClassifierEngine, train_file, write_train_file};
use crate::error::{ClassifierError, TrainError};

/// Buffers exemplars per `(lemma, pos, lang)` until [`flush`](Self::flush).
#[derive(Debug)]
pub struct ExemplarAccumulator {
    output_dir: PathBuf,
    buffers: BTreeMap<ExemplarKey, Vec<Exemplar>>,
}

impl ExemplarAccumulator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            buffers: BTreeMap::new(),
        }
    }

    /// `<outdir>/<lemma>.<pos>.<lang>`.
    pub fn prefix(&self, key: &ExemplarKey) -> PathBuf {
        self.output_dir.join(key.file_stem())
    }

    /// Add one exemplar. Every exemplar of a key must have the width of the
    /// first one.
    pub fn append(
        &mut self,
        key: &ExemplarKey,
        features: Vec<String>,
        label: String,
    ) -> Result<(), TrainError> {
        let buffer = self.buffers.entry(key.clone()).or_default();
        if let Some(first) = buffer.first()
            && first.features.len() != features.len()
        {
            return Err(TrainError::Schema {
                key: key.clone(),
                expected: first.features.len(),
                found: features.len(),
            });
        }
        buffer.push(Exemplar { features, label });
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &ExemplarKey> + '_ {
        self.buffers.keys()
    }

    pub fn get(&self, key: &ExemplarKey) -> Option<&[Exemplar]> {
        self.buffers.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Write every buffer to `<prefix>.train` and train it, `threads` keys at
    /// a time (0 for rayon's default). Returns the trained prefixes; any
    /// failure is logged and the flush fails naming every failed key.
    pub fn flush(
        &self,
        engine: &dyn ClassifierEngine,
        options: &str,
        threads: usize,
    ) -> Result<Vec<PathBuf>, TrainError> {
        let builder = rayon::ThreadPoolBuilder::new().thread_name(|tid| format!("train-{tid}"));
        let pool = if threads != 0 {
            builder.num_threads(threads)
        } else {
            builder
        }
        .build()?;

        info!(
            "training {} classifiers with {} ({} threads)",
            self.buffers.len(),
            engine.name(),
            pool.current_num_threads()
        );
        let outcomes: Vec<(ExemplarKey, PathBuf, Result<(), ClassifierError>)> = pool.install(|| {
            self.buffers
                .par_iter()
                .map(|(key, exemplars)| {
                    let prefix = self.prefix(key);
                    let outcome = train_one(engine, &prefix, exemplars, options);
                    (key.clone(), prefix, outcome)
                })
                .collect()
        });

        let mut trained = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();
        for (key, prefix, outcome) in outcomes {
            match outcome {
                Ok(()) => trained.push(prefix),
                Err(e) => {
                    error!("{key}: {e}");
                    failed.push(key);
                }
            }
        }
        if failed.is_empty() {
            Ok(trained)
        } else {
            Err(TrainError::Flush { failed })
        }
    }
}

fn train_one(
    engine: &dyn ClassifierEngine,
    prefix: &Path,
    exemplars: &[Exemplar],
    options: &str,
) -> Result<(), ClassifierError> {
    write_train_file(&train_file(prefix), exemplars)?;
    engine.train(prefix, options)
}
