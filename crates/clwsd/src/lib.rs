//! Cross-lingual word sense disambiguation.
//!
//! Word experts are trained from a word-aligned parallel corpus: every
//! occurrence of a registry lemma whose translation can be found in the
//! target sentence becomes an exemplar, labelled with the (lemmatised)
//! translation and described by its local context and, optionally, by
//! bag-of-words keyword indicators. At test time the same feature vectors
//! are built for SemEval test instances and classified.
//!
//! - [`trainer::Trainer`] runs exemplar generation and training.
//! - [`tester::Tester`] classifies test files and writes `best`/`oof` output.
//! - [`scoring`] runs the external scorer and writes the results report.

pub mod alignment;
pub mod bow;
pub mod classifier;
pub mod config;
pub mod error;
pub mod exemplars;
pub mod features;
pub mod label;
pub mod output;
pub mod paramsearch;
pub mod scoring;
pub mod tester;
pub mod trainer;

pub use alignment::{AlignedTarget, AlignmentSource, Resolution, resolve};
pub use bow::CooccurrenceCounts;
pub use classifier::{Classifier, ClassifierEngine, Ib1Engine, TimblEngine};
pub use config::{
    AlignmentConfig, BagScope, BowParams, FeatureConfig, TestConfig, TrainConfig, WindowBoundary,
};
pub use error::{ClassifierError, FocusError, TestError, TrainError};
pub use exemplars::ExemplarAccumulator;
pub use scoring::{Report, Scorer};
pub use tester::{TestReport, Tester};
pub use trainer::{TrainReport, Trainer, TrainingInput, TranslationResource};
