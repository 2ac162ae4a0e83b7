//! Classifying test instances.
//!
//! Each instance goes through the stages of [`TestStage`]: its raw context is
//! tokenised and tagged, the head word is found again among the tokens, the
//! feature vector is rebuilt with the training schema, and the classifier
//! output is written as `best` and `oof` records.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use clwsd_corpus::{Lexelt, TargetWords, TestSet, load_bags};
use clwsd_tagger::{Tagger, Tokenizer};
use clwsd_types::{Classification, ExemplarKey, LemmaKey, TaggedSentence};
use tracing::{debug, info, warn};

use crate::classifier::{ClassifierEngine, train_file};
use crate::config::{FeatureConfig, TestConfig};
use crate::error::{FocusError, TestError};
use crate::features;
use crate::label::constrain_distribution;
use crate::output::{OutOfFive, best_line};
use crate::paramsearch;
use crate::scoring::{OutputKind, output_path};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestStage {
    Init,
    Tagging,
    FocusLocate,
    FeatureBuild,
    Classify,
    Emit,
}

impl TestStage {
    pub fn as_str(self) -> &'static str {
        match self {
            TestStage::Init => "init",
            TestStage::Tagging => "tagging",
            TestStage::FocusLocate => "focus-locate",
            TestStage::FeatureBuild => "feature-build",
            TestStage::Classify => "classify",
            TestStage::Emit => "emit",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusKind {
    /// A token equals the head.
    Exact,
    /// A token contains the head and was split around it.
    Partial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FocusMatch {
    pub index: usize,
    pub kind: FocusKind,
}

/// Index among `candidates` closest to `origin`; ties go to the later index.
fn nearest(candidates: impl Iterator<Item = usize>, origin: usize) -> Option<usize> {
    candidates.fold(None, |best, i| match best {
        Some(b) if i.abs_diff(origin) > b.abs_diff(origin) => Some(b),
        _ => Some(i),
    })
}

/// Find the head word in a tagged sentence. `origin` is the number of tokens
/// in the left context, where the head started out before tokenisation.
///
/// An exact match wins. Otherwise the nearest token containing the head is
/// split into prefix, head and suffix; the pieces keep the token's POS tag
/// and the affixes take their surface form as lemma.
pub fn locate_focus(
    sentence: &mut TaggedSentence,
    head: &str,
    origin: usize,
) -> Result<FocusMatch, FocusError> {
    let fail = |sentence: &TaggedSentence| FocusError {
        head: head.to_string(),
        tokens: sentence.words.clone(),
    };
    if head.is_empty() {
        return Err(fail(sentence));
    }
    let exact = (0..sentence.len()).filter(|&i| sentence.words[i] == head);
    if let Some(index) = nearest(exact, origin) {
        return Ok(FocusMatch {
            index,
            kind: FocusKind::Exact,
        });
    }
    let partial = (0..sentence.len()).filter(|&i| sentence.words[i].contains(head));
    let Some(index) = nearest(partial, origin) else {
        return Err(fail(sentence));
    };

    let word = sentence.words[index].clone();
    let Some(at) = word.find(head) else {
        return Err(fail(sentence));
    };
    let (prefix, rest) = word.split_at(at);
    let suffix = &rest[head.len()..];
    let pos = sentence.postags[index].clone();
    let lemma = sentence.lemmas[index].clone();

    let mut words = Vec::with_capacity(3);
    let mut lemmas = Vec::with_capacity(3);
    if !prefix.is_empty() {
        words.push(prefix.to_string());
        lemmas.push(prefix.to_string());
    }
    let focus = index + words.len();
    words.push(head.to_string());
    lemmas.push(lemma);
    if !suffix.is_empty() {
        words.push(suffix.to_string());
        lemmas.push(suffix.to_string());
    }
    let postags = vec![pos; words.len()];
    sentence.words.splice(index..=index, words);
    sentence.postags.splice(index..=index, postags);
    sentence.lemmas.splice(index..=index, lemmas);
    Ok(FocusMatch {
        index: focus,
        kind: FocusKind::Partial,
    })
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestReport {
    /// Lexical elements classified, in order.
    pub lemmas: Vec<LemmaKey>,
    pub instances: usize,
    pub partial_matches: usize,
}

pub struct Tester {
    config: TestConfig,
    registry: TargetWords,
    engine: Box<dyn ClassifierEngine>,
}

impl Tester {
    pub fn new(config: TestConfig, registry: TargetWords, engine: Box<dyn ClassifierEngine>) -> Self {
        Self {
            config,
            registry,
            engine,
        }
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// `<testdir>/<lemma>.data` for every registry lemma that has one.
    pub fn load_test_sets(&self) -> Result<Vec<TestSet>, TestError> {
        let mut lemmas: Vec<&str> = self.registry.keys().map(|k| k.lemma.as_str()).collect();
        lemmas.dedup();
        let mut sets = Vec::new();
        for lemma in lemmas {
            let path = self.config.test_dir.join(format!("{lemma}.data"));
            if !path.is_file() {
                warn!("no test file for {lemma} (tried {})", path.display());
                continue;
            }
            sets.push(TestSet::load(&path)?);
        }
        Ok(sets)
    }

    /// Classify every instance of every test file.
    pub fn run(
        &self,
        tagger: &mut dyn Tagger,
        tokenizer: &dyn Tokenizer,
    ) -> Result<TestReport, TestError> {
        let sets = self.load_test_sets()?;
        let lexelts: Vec<&Lexelt> = sets.iter().flat_map(|s| &s.lexelts).collect();

        let mut configs = Vec::with_capacity(lexelts.len());
        for lexelt in &lexelts {
            configs.push(self.feature_config(&lexelt.key)?);
        }
        if self.config.variable.is_none() {
            self.check_schema()?;
        }
        let bags = if configs.iter().any(|c| c.bag) {
            load_bags(&self.config.output_dir, &self.config.target_lang)?
        } else {
            BTreeMap::new()
        };

        tagger.reset()?;
        let mut report = TestReport::default();
        for (lexelt, config) in lexelts.into_iter().zip(&configs) {
            info!("processing {} ({})", lexelt.key, config.id());
            let bag = if config.bag {
                let bag = bags.get(&lexelt.key).map(Vec::as_slice);
                if bag.is_none() {
                    info!("{} has no bag", lexelt.key);
                }
                bag
            } else {
                None
            };
            report.partial_matches += self.run_lexelt(lexelt, config, bag, tagger, tokenizer)?;
            report.instances += lexelt.instances.len();
            report.lemmas.push(lexelt.key.clone());
        }
        Ok(report)
    }

    fn feature_config(&self, key: &LemmaKey) -> Result<FeatureConfig, TestError> {
        match &self.config.variable {
            None => Ok(self.config.features.clone()),
            Some(variable) => variable
                .get(&key.lemma)
                .map(|id| self.config.features.with_id(id))
                .ok_or_else(|| TestError::MissingVariableConfiguration(key.lemma.clone())),
        }
    }

    /// Refuse to classify with a schema other than the one trained.
    fn check_schema(&self) -> Result<(), TestError> {
        let Some(trained) = FeatureConfig::load(&self.config.output_dir)? else {
            warn!(
                "no feature configuration in {}, assuming {}",
                self.config.output_dir.display(),
                self.config.features.id()
            );
            return Ok(());
        };
        if trained != self.config.features {
            return Err(TestError::SchemaMismatch {
                requested: describe(&self.config.features),
                trained: describe(&trained),
            });
        }
        Ok(())
    }

    fn options(&self, prefix: &Path) -> Result<String, TestError> {
        let mut options = self.config.classifier_options.clone();
        match paramsearch::read_options(&train_file(prefix))? {
            Some(found) => {
                info!("parameter optimisation loaded: {found}");
                options.push(' ');
                options.push_str(&found);
            }
            None => debug!("no parameter optimisation for {}", prefix.display()),
        }
        Ok(options)
    }

    /// Classify one lexical element and write its output files. Returns the
    /// number of heads found by partial match.
    fn run_lexelt(
        &self,
        lexelt: &Lexelt,
        config: &FeatureConfig,
        bag: Option<&[LemmaKey]>,
        tagger: &mut dyn Tagger,
        tokenizer: &dyn Tokenizer,
    ) -> Result<usize, TestError> {
        let key = ExemplarKey::new(lexelt.key.clone(), self.config.target_lang.as_str());
        let prefix = self.config.output_dir.join(key.file_stem());
        let options = self.options(&prefix)?;
        info!("loading classifier {key} with options: {options}");
        let classifier = self
            .engine
            .load(&prefix, &options)
            .map_err(|source| TestError::Classifier {
                key: key.clone(),
                stage: TestStage::Init.as_str(),
                source,
            })?;

        let lines: Vec<String> = lexelt.instances.iter().map(|i| i.raw_text()).collect();
        let tokenized = tokenizer.tokenize(&lines)?;

        let mut rows = Vec::with_capacity(lines.len());
        let mut heads = Vec::with_capacity(lines.len());
        let mut partial = 0;
        for (instance, tokens) in lexelt.instances.iter().zip(&tokenized) {
            let mut sentence = tagger.process(tokens)?;
            let origin = instance.left.split_whitespace().count();
            let found = locate_focus(&mut sentence, &instance.head, origin).map_err(|source| {
                TestError::Focus {
                    key: lexelt.key.clone(),
                    id: instance.id,
                    stage: TestStage::FocusLocate.as_str(),
                    source,
                }
            })?;
            if found.kind == FocusKind::Partial {
                debug!("{} @{}: head {:?} split from a token", lexelt.key, instance.id, instance.head);
                partial += 1;
            }
            let features = features::extract(&sentence, found.index, config, bag);
            debug!("{} @{}: {:?}", lexelt.key, instance.id, features);
            heads.push(sentence.words[found.index].clone());
            rows.push(features);
        }

        let results = classifier
            .classify_batch(&rows)
            .map_err(|source| TestError::Classifier {
                key: key.clone(),
                stage: TestStage::Classify.as_str(),
                source,
            })?;
        self.emit(lexelt, &key, &heads, &results)?;
        Ok(partial)
    }

    fn emit(
        &self,
        lexelt: &Lexelt,
        key: &ExemplarKey,
        heads: &[String],
        results: &[Classification],
    ) -> Result<(), TestError> {
        let out = &self.config.output_dir;
        let senses = self
            .registry
            .senses(&lexelt.key, &self.config.target_lang)
            .filter(|_| self.config.constrain_senses);

        let best_path = output_path(out, &lexelt.key, OutputKind::Best);
        let mut best = create(&best_path)?;
        let mut votes = if self.config.voter {
            Some(create(&out.join(format!("{}.votertest", lexelt.key)))?)
        } else {
            None
        };
        let mut oof = OutOfFive::new();
        for ((instance, head), result) in lexelt.instances.iter().zip(heads).zip(results) {
            let distribution = match senses {
                Some(senses) => constrain_distribution(&result.distribution, senses),
                None => result.distribution.clone(),
            };
            debug!("{} @{}: {:?}", lexelt.key, instance.id, distribution);
            let line = best_line(key, instance.id, &distribution, self.config.divergence_from_best_output);
            writeln!(best, "{line}").with_context(|| format!("write {}", best_path.display()))?;
            if let Some(votes) = votes.as_mut() {
                writeln!(votes, "{}\t{}\t{}", instance.id, head, result.label)
                    .context("write voter test file")?;
            }
            oof.push(key.clone(), instance.id, distribution);
        }
        best.flush()
            .with_context(|| format!("write {}", best_path.display()))?;

        let oof_path = output_path(out, &lexelt.key, OutputKind::OutOfFive);
        let mut oof_out = create(&oof_path)?;
        oof.write_to(&mut oof_out)?;
        oof_out
            .flush()
            .with_context(|| format!("write {}", oof_path.display()))?;
        if let Some(mut votes) = votes {
            votes.flush().context("write voter test file")?;
        }
        Ok(())
    }
}

fn create(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn describe(config: &FeatureConfig) -> String {
    format!(
        "{} ({:?}, {:?} bag scope)",
        config.id(),
        config.window_boundary,
        config.bag_scope
    )
}
