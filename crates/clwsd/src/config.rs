//! Run configuration.
//!
//! [`FeatureConfig`] fixes the feature-vector schema. The trainer persists it
//! next to the classifiers so a test run can refuse to classify with a
//! different schema.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clwsd_corpus::{ConfigId, PhraseTableFormat, VariableConfiguration};
use serde::{Deserialize, Serialize};

/// File name of the persisted [`FeatureConfig`] in an output directory.
pub const FEATURE_CONFIG_FILE: &str = "features.json";

pub const DEFAULT_CLASSIFIER_OPTIONS: &str = "-a 0 -k 1";

/// Which window positions count as inside the sentence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowBoundary {
    /// Every index `0..len` is in bounds.
    #[default]
    Inclusive,
    /// Index 0 is treated as out of bounds, as older training runs did.
    SkipFirstToken,
}

impl WindowBoundary {
    pub fn contains(self, index: isize, len: usize) -> bool {
        let lower = match self {
            WindowBoundary::Inclusive => 0,
            WindowBoundary::SkipFirstToken => 1,
        };
        index >= lower && (index as usize) < len
    }
}

/// Where bag-of-words keywords are searched for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BagScope {
    #[default]
    Sentence,
    Window,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub context_size: usize,
    pub pos: bool,
    pub lemma: bool,
    pub bag: bool,
    #[serde(default)]
    pub window_boundary: WindowBoundary,
    #[serde(default)]
    pub bag_scope: BagScope,
}

impl FeatureConfig {
    pub fn id(&self) -> ConfigId {
        ConfigId {
            context_size: self.context_size,
            pos: self.pos,
            lemma: self.lemma,
            bag: self.bag,
        }
    }

    /// Same boundary and scope, with the channels of `id`.
    pub fn with_id(&self, id: ConfigId) -> Self {
        Self {
            context_size: id.context_size,
            pos: id.pos,
            lemma: id.lemma,
            bag: id.bag,
            ..self.clone()
        }
    }

    pub fn channels(&self) -> usize {
        1 + usize::from(self.pos) + usize::from(self.lemma)
    }

    /// Length of the local window part of a feature vector.
    pub fn window_len(&self) -> usize {
        (2 * self.context_size + 1) * self.channels()
    }

    pub fn vector_len(&self, bag_len: usize) -> usize {
        self.window_len() + if self.bag { bag_len } else { 0 }
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(FEATURE_CONFIG_FILE);
        let json = serde_json::to_string_pretty(self).context("serialise feature config")?;
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))
    }

    /// The persisted configuration of `dir`, if training wrote one.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(FEATURE_CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let config =
            serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
        Ok(Some(config))
    }
}

/// Bag-of-words keyword selection thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BowParams {
    /// Minimum co-occurrence count of keyword and sense.
    pub absolute_threshold: u64,
    /// Minimum P(sense|keyword).
    pub prob_threshold: f64,
    /// Minimum corpus frequency of a keyword.
    pub filter_threshold: u64,
    /// Tune `absolute_threshold` per focus word to keep bags in 6..=499.
    pub adaptive: bool,
}

impl Default for BowParams {
    fn default() -> Self {
        Self {
            absolute_threshold: 3,
            prob_threshold: 0.001,
            filter_threshold: 20,
            adaptive: false,
        }
    }
}

impl FromStr for BowParams {
    type Err = anyhow::Error;

    /// `absolute[,probability[,filter]]`; omitted fields keep their defaults.
    fn from_str(raw: &str) -> Result<Self> {
        let mut params = BowParams::default();
        let mut fields = raw.split(',').map(str::trim);
        if let Some(f) = fields.next().filter(|f| !f.is_empty()) {
            params.absolute_threshold = f.parse().with_context(|| format!("absolute threshold {f:?}"))?;
        }
        if let Some(f) = fields.next() {
            params.prob_threshold = f.parse().with_context(|| format!("probability threshold {f:?}"))?;
        }
        if let Some(f) = fields.next() {
            params.filter_threshold = f.parse().with_context(|| format!("filter threshold {f:?}"))?;
        }
        Ok(params)
    }
}

/// Where exemplar labels come from.
#[derive(Clone, Debug)]
pub enum AlignmentConfig {
    PhraseTable {
        path: PathBuf,
        format: PhraseTableFormat,
    },
    Giza {
        source_to_target: PathBuf,
        target_to_source: PathBuf,
    },
}

#[derive(Clone, Debug)]
pub struct TrainConfig {
    pub output_dir: PathBuf,
    pub target_lang: String,
    pub features: FeatureConfig,
    pub bow: BowParams,
    pub max_divergence_from_best: f64,
    pub classifier_options: String,
    /// Worker threads for classifier training; 0 lets rayon decide.
    pub threads: usize,
    pub voter: bool,
    /// Parameter search program run on every train file, if any.
    pub paramsearch: Option<String>,
}

impl TrainConfig {
    pub fn new(output_dir: impl Into<PathBuf>, target_lang: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            target_lang: target_lang.into(),
            features: FeatureConfig::default(),
            bow: BowParams::default(),
            max_divergence_from_best: 0.5,
            classifier_options: DEFAULT_CLASSIFIER_OPTIONS.to_string(),
            threads: 0,
            voter: false,
            paramsearch: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TestConfig {
    pub test_dir: PathBuf,
    pub output_dir: PathBuf,
    pub target_lang: String,
    pub features: FeatureConfig,
    pub classifier_options: String,
    /// Senses scoring at least this fraction of the best score are output.
    pub divergence_from_best_output: f64,
    pub constrain_senses: bool,
    pub voter: bool,
    /// Per-lemma feature configuration overriding `features`.
    pub variable: Option<VariableConfiguration>,
}

impl TestConfig {
    pub fn new(
        test_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            test_dir: test_dir.into(),
            output_dir: output_dir.into(),
            target_lang: target_lang.into(),
            features: FeatureConfig::default(),
            classifier_options: DEFAULT_CLASSIFIER_OPTIONS.to_string(),
            divergence_from_best_output: 0.9,
            constrain_senses: false,
            voter: false,
            variable: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_length_formula() {
        let config = FeatureConfig {
            context_size: 2,
            pos: true,
            lemma: true,
            bag: true,
            ..FeatureConfig::default()
        };
        assert_eq!(config.window_len(), 15);
        assert_eq!(config.vector_len(4), 19);
        assert_eq!(config.id().to_string(), "c2lpb");
        let plain = config.with_id("c1".parse().unwrap());
        assert_eq!(plain.vector_len(4), 3);
    }

    #[test]
    fn boundaries() {
        assert!(WindowBoundary::Inclusive.contains(0, 3));
        assert!(!WindowBoundary::SkipFirstToken.contains(0, 3));
        assert!(!WindowBoundary::Inclusive.contains(-1, 3));
        assert!(!WindowBoundary::Inclusive.contains(3, 3));
    }

    #[test]
    fn parses_bow_params() {
        let p: BowParams = "5,0.01".parse().unwrap();
        assert_eq!(p.absolute_threshold, 5);
        assert_eq!(p.prob_threshold, 0.01);
        assert_eq!(p.filter_threshold, 20);
        assert!("x".parse::<BowParams>().is_err());
    }

    #[test]
    fn persists_as_json() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FeatureConfig::load(dir.path()).unwrap(), None);
        let config = FeatureConfig {
            context_size: 1,
            window_boundary: WindowBoundary::SkipFirstToken,
            ..FeatureConfig::default()
        };
        config.save(dir.path()).unwrap();
        assert_eq!(FeatureConfig::load(dir.path()).unwrap(), Some(config));
    }
}
