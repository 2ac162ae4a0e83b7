//! Exemplar generation and classifier training.
//!
//! With bag-of-words features the corpus is read twice: a counting pass fills
//! the co-occurrence table and the bags are selected from it, then the final
//! pass extracts exemplars. Without them only the final pass runs. Each pass
//! rewinds the taggers and reopens the corpus and, in intersection mode, both
//! GIZA streams, which are advanced in lockstep with the corpus.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clwsd_corpus::{
    AlignmentIntersection, GizaReader, LoadMode, ParallelCorpus, PhraseTable, TargetWords,
    bag_path, require_file, write_bag,
};
use clwsd_tagger::Tagger;
use clwsd_types::{ExemplarKey, LemmaKey, TaggedSentence};
use tracing::{debug, error, info, warn};

use crate::alignment::{AlignmentSource, Resolution, resolve};
use crate::bow::{CooccurrenceCounts, bag_keywords};
use crate::classifier::{ClassifierEngine, read_train_file, train_file, with_suffix};
use crate::config::{AlignmentConfig, TrainConfig};
use crate::error::TrainError;
use crate::exemplars::ExemplarAccumulator;
use crate::features;
use crate::label::{is_relevant, sense_label};
use crate::paramsearch::run_paramsearch;

/// A loaded translation resource.
pub enum TranslationResource {
    PhraseTable(PhraseTable),
    Giza {
        source_to_target: PathBuf,
        target_to_source: PathBuf,
    },
}

impl TranslationResource {
    pub fn load(config: &AlignmentConfig, mode: LoadMode) -> anyhow::Result<Self> {
        match config {
            AlignmentConfig::PhraseTable { path, format } => {
                require_file(path, "phrase table")?;
                info!("loading phrase table {}", path.display());
                let table = PhraseTable::load_with_mode(path, format.clone(), mode)?;
                info!("{} source phrases", table.len());
                Ok(TranslationResource::PhraseTable(table))
            }
            AlignmentConfig::Giza {
                source_to_target,
                target_to_source,
            } => {
                require_file(source_to_target, "GIZA source-to-target alignment")?;
                require_file(target_to_source, "GIZA target-to-source alignment")?;
                Ok(TranslationResource::Giza {
                    source_to_target: source_to_target.clone(),
                    target_to_source: target_to_source.clone(),
                })
            }
        }
    }
}

/// Everything read while generating exemplars.
pub struct TrainingInput {
    pub corpus: ParallelCorpus,
    pub resource: TranslationResource,
    pub source_tagger: Box<dyn Tagger>,
    pub target_tagger: Option<Box<dyn Tagger>>,
}

/// Per-pass view of the translation resource; GIZA streams are reopened
/// for every pass and advanced in lockstep with the corpus.
enum Aligner<'a> {
    Table(&'a PhraseTable),
    Giza(GizaReader<BufReader<File>>, GizaReader<BufReader<File>>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pass {
    Counting,
    Final,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrainReport {
    pub sentences: usize,
    pub occurrences: usize,
    pub exemplars: usize,
    pub not_found: usize,
    pub below_threshold: usize,
    pub bags: usize,
    /// Prefixes of the trained classifiers.
    pub classifiers: Vec<PathBuf>,
}

pub struct Trainer {
    config: TrainConfig,
    registry: TargetWords,
    engine: Box<dyn ClassifierEngine>,
}

impl Trainer {
    pub fn new(config: TrainConfig, registry: TargetWords, engine: Box<dyn ClassifierEngine>) -> Self {
        Self {
            config,
            registry,
            engine,
        }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Generate exemplars from the corpus, then train, run the parameter
    /// search and write voter input as configured.
    pub fn run(&self, input: &mut TrainingInput) -> Result<TrainReport, TrainError> {
        let out = &self.config.output_dir;
        fs::create_dir_all(out).with_context(|| format!("create {}", out.display()))?;

        let mut report = TrainReport::default();
        let mut counts = CooccurrenceCounts::new();
        let mut bags = BTreeMap::new();
        let mut exemplars = ExemplarAccumulator::new(out);

        if self.config.features.bag {
            info!("reading corpus and counting (first pass)");
            self.pass(Pass::Counting, input, &mut counts, &bags, &mut exemplars, &mut report)?;
            bags = self.make_bags(&counts)?;
            report.bags = bags.len();
        }
        info!("reading corpus and extracting features (final pass)");
        self.pass(Pass::Final, input, &mut counts, &bags, &mut exemplars, &mut report)?;
        info!(
            "{} sentences, {} occurrences, {} exemplars ({} unaligned, {} below threshold)",
            report.sentences,
            report.occurrences,
            report.exemplars,
            report.not_found,
            report.below_threshold
        );

        self.config.features.save(out)?;
        report.classifiers = exemplars.flush(
            self.engine.as_ref(),
            &self.config.classifier_options,
            self.config.threads,
        )?;
        self.finish(&report.classifiers)?;
        Ok(report)
    }

    /// Train on the `.train` files already in the output directory.
    pub fn retrain(&self) -> Result<Vec<PathBuf>, TrainError> {
        let prefixes = self.existing_prefixes();
        info!("training {} classifiers", prefixes.len());
        let mut failed = Vec::new();
        for (key, prefix) in &prefixes {
            if let Err(e) = self.engine.train(prefix, &self.config.classifier_options) {
                error!("{key}: {e}");
                failed.push(key.clone());
            }
        }
        if !failed.is_empty() {
            return Err(TrainError::Flush { failed });
        }
        let prefixes: Vec<PathBuf> = prefixes.into_iter().map(|(_, p)| p).collect();
        self.finish(&prefixes)?;
        Ok(prefixes)
    }

    /// Write voter input for classifiers trained earlier.
    pub fn voter_only(&self) -> Result<Vec<PathBuf>, TrainError> {
        let prefixes: Vec<PathBuf> = self.existing_prefixes().into_iter().map(|(_, p)| p).collect();
        for prefix in &prefixes {
            self.write_voter_input(prefix)?;
        }
        Ok(prefixes)
    }

    /// Registry keys with a train file in the output directory.
    fn existing_prefixes(&self) -> Vec<(ExemplarKey, PathBuf)> {
        self.registry
            .keys()
            .map(|key| ExemplarKey::new(key.clone(), self.config.target_lang.as_str()))
            .map(|key| {
                let prefix = self.config.output_dir.join(key.file_stem());
                (key, prefix)
            })
            .filter(|(_, prefix)| train_file(prefix).is_file())
            .collect()
    }

    fn finish(&self, prefixes: &[PathBuf]) -> Result<(), TrainError> {
        if let Some(program) = &self.config.paramsearch {
            info!("parameter optimisation");
            for prefix in prefixes {
                run_paramsearch(program, &train_file(prefix))?;
            }
        }
        if self.config.voter {
            info!("generating voter input by classifying the training data");
            for prefix in prefixes {
                self.write_voter_input(prefix)?;
            }
        }
        Ok(())
    }

    /// `<prefix>.votertrain`: the prediction and the gold label for every
    /// training exemplar.
    fn write_voter_input(&self, prefix: &Path) -> Result<(), TrainError> {
        let exemplars = read_train_file(&train_file(prefix))?;
        let classifier = self.engine.load(prefix, &self.config.classifier_options)?;
        let rows: Vec<Vec<String>> = exemplars.iter().map(|e| e.features.clone()).collect();
        let predictions = classifier.classify_batch(&rows)?;

        let path = with_suffix(prefix, ".votertrain");
        let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        for (prediction, exemplar) in predictions.iter().zip(&exemplars) {
            writeln!(out, "{}\t{}", prediction.label, exemplar.label)
                .with_context(|| format!("write {}", path.display()))?;
        }
        out.flush()
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    fn make_bags(
        &self,
        counts: &CooccurrenceCounts,
    ) -> Result<BTreeMap<LemmaKey, Vec<LemmaKey>>, TrainError> {
        info!("making bags of words");
        let mut bags = BTreeMap::new();
        for focus in counts.focus_words() {
            let bag = counts.select_bag(focus, &self.config.bow);
            let key = ExemplarKey::new(focus.clone(), self.config.target_lang.as_str());
            write_bag(&bag_path(&self.config.output_dir, &key), &bag)?;
            bags.insert(focus.clone(), bag_keywords(&bag));
        }
        Ok(bags)
    }

    fn pass(
        &self,
        pass: Pass,
        input: &mut TrainingInput,
        counts: &mut CooccurrenceCounts,
        bags: &BTreeMap<LemmaKey, Vec<LemmaKey>>,
        exemplars: &mut ExemplarAccumulator,
        report: &mut TrainReport,
    ) -> Result<(), TrainError> {
        input.source_tagger.reset()?;
        if let Some(tagger) = input.target_tagger.as_mut() {
            tagger.reset()?;
        }
        let mut aligner = match &input.resource {
            TranslationResource::PhraseTable(table) => Aligner::Table(table),
            TranslationResource::Giza {
                source_to_target,
                target_to_source,
            } => Aligner::Giza(
                GizaReader::open(source_to_target)?,
                GizaReader::open(target_to_source)?,
            ),
        };

        for pair in input.corpus.pairs()? {
            let pair = pair?;
            let intersection;
            let resource = match &mut aligner {
                Aligner::Table(table) => AlignmentSource::PhraseTable(*table),
                Aligner::Giza(s2t, t2s) => match (s2t.next(), t2s.next()) {
                    (Some(s2t), Some(t2s)) => {
                        intersection = AlignmentIntersection::intersect(&s2t?, &t2s?)?;
                        AlignmentSource::Intersection(&intersection)
                    }
                    _ => {
                        warn!("no more GIZA alignments at sentence {}, ending pass", pair.index + 1);
                        break;
                    }
                },
            };

            let source = input.source_tagger.process(&pair.source)?;
            let target = match input.target_tagger.as_mut() {
                Some(tagger) => Some(tagger.process(&pair.target)?),
                None => None,
            };
            let target_words = target.as_ref().map_or(&pair.target, |t| &t.words);
            if pass == Pass::Final {
                report.sentences += 1;
            }

            for (i, word, pos, lemma) in source.tokens() {
                let key = LemmaKey::new(lemma, pos);
                if pass == Pass::Counting {
                    counts.count_token(key.clone());
                }
                if !is_relevant(&self.registry, &key) {
                    continue;
                }
                let Some(label) = self.label_occurrence(
                    pass,
                    pair.index,
                    i,
                    word,
                    target_words,
                    target.as_ref(),
                    resource,
                    report,
                ) else {
                    continue;
                };
                match pass {
                    Pass::Counting => counts.count_occurrence(&key, &label, &source, i),
                    Pass::Final => {
                        self.add_exemplar(exemplars, &source, i, key, label, bags)?;
                        report.exemplars += 1;
                    }
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn label_occurrence(
        &self,
        pass: Pass,
        sentence: usize,
        index: usize,
        word: &str,
        target_words: &[String],
        target: Option<&TaggedSentence>,
        resource: AlignmentSource<'_>,
        report: &mut TrainReport,
    ) -> Option<String> {
        let tally = pass == Pass::Final;
        if tally {
            report.occurrences += 1;
        }
        match resolve(
            index,
            word,
            target_words,
            resource,
            self.config.max_divergence_from_best,
        ) {
            Resolution::Found(found) => {
                let label = sense_label(&found, target);
                debug!("@{}:{index} {word} -> {label:?}", sentence + 1);
                Some(label)
            }
            Resolution::NotFound => {
                debug!("@{}:{index} {word}: no translation option matches", sentence + 1);
                if tally {
                    report.not_found += 1;
                }
                None
            }
            Resolution::BelowThreshold { best, best_possible } => {
                debug!(
                    "@{}:{index} {word}: best match scores too low ({best} vs {best_possible})",
                    sentence + 1
                );
                if tally {
                    report.below_threshold += 1;
                }
                None
            }
        }
    }

    fn add_exemplar(
        &self,
        exemplars: &mut ExemplarAccumulator,
        source: &TaggedSentence,
        index: usize,
        focus: LemmaKey,
        label: String,
        bags: &BTreeMap<LemmaKey, Vec<LemmaKey>>,
    ) -> Result<(), TrainError> {
        let bag = bags.get(&focus).map(Vec::as_slice);
        let features = features::extract(source, index, &self.config.features, bag);
        let key = ExemplarKey::new(focus, self.config.target_lang.as_str());
        exemplars.append(&key, features, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Ib1Engine;
    use clwsd_corpus::PhraseTableFormat;
    use clwsd_tagger::Untagged;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    fn input(dir: &Path, table: &str) -> TrainingInput {
        let source = write(dir, "corpus.en", "the bank is closed\nthe bank of the river\n");
        let target = write(dir, "corpus.it", "la banca è chiusa\nla riva del fiume\n");
        let table = write(dir, "phrase-table", table);
        TrainingInput {
            corpus: ParallelCorpus::new(source, target).unwrap(),
            resource: TranslationResource::load(
                &AlignmentConfig::PhraseTable {
                    path: table,
                    format: PhraseTableFormat::default(),
                },
                LoadMode::Owned,
            )
            .unwrap(),
            source_tagger: Box::new(Untagged),
            target_tagger: None,
        }
    }

    fn registry() -> TargetWords {
        TargetWords::parse("bank\t?\n").unwrap()
    }

    #[test]
    fn labels_each_occurrence_with_its_translation() {
        let dir = tempfile::tempdir().unwrap();
        let mut input = input(
            dir.path(),
            "bank ||| banca ||| 0.9 0 0.8 0\nbank ||| riva ||| 0.3 0 0.7 0\n",
        );
        let mut config = TrainConfig::new(dir.path().join("out"), "it");
        config.features.context_size = 1;
        let trainer = Trainer::new(config, registry(), Box::new(Ib1Engine));
        let report = trainer.run(&mut input).unwrap();
        assert_eq!(report.sentences, 2);
        assert_eq!(report.occurrences, 2);
        assert_eq!(report.exemplars, 2);
        assert_eq!(report.classifiers.len(), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("out/bank.?.it.train")).unwrap(),
            "the\tbank\tis\tbanca\nthe\tbank\tof\triva\n"
        );
        assert!(dir.path().join("out/features.json").is_file());
    }

    #[test]
    fn unmatched_and_weak_options_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut input = input(
            dir.path(),
            "bank ||| banca ||| 0 0 0.9 0\nbank ||| riva ||| 0 0 0.1 0\n",
        );
        let trainer = Trainer::new(
            TrainConfig::new(dir.path().join("out"), "it"),
            registry(),
            Box::new(Ib1Engine),
        );
        let report = trainer.run(&mut input).unwrap();
        assert_eq!(report.exemplars, 1);
        assert_eq!(report.below_threshold, 1);
        assert_eq!(report.not_found, 0);
    }

    #[test]
    fn voter_input_pairs_prediction_and_gold() {
        let dir = tempfile::tempdir().unwrap();
        let mut input = input(
            dir.path(),
            "bank ||| banca ||| 0.9 0 0.8 0\nbank ||| riva ||| 0.3 0 0.7 0\n",
        );
        let mut config = TrainConfig::new(dir.path().join("out"), "it");
        config.features.context_size = 1;
        config.voter = true;
        let trainer = Trainer::new(config, registry(), Box::new(Ib1Engine));
        trainer.run(&mut input).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("out/bank.?.it.votertrain")).unwrap(),
            "banca\tbanca\nriva\triva\n"
        );

        assert_eq!(trainer.retrain().unwrap().len(), 1);
        assert_eq!(trainer.voter_only().unwrap().len(), 1);
    }

    #[test]
    fn exhausted_giza_streams_end_each_pass() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(dir.path(), "corpus.en", "the bank is closed\nthe bank of the river\n");
        let target = write(dir.path(), "corpus.it", "la banca è chiusa\nla riva del fiume\n");
        let s2t = write(
            dir.path(),
            "en-it.A3.final",
            "# Sentence pair (1)\nla banca è chiusa\n\
             NULL ({ }) the ({ 1 }) bank ({ 2 }) is ({ 3 }) closed ({ 4 })\n",
        );
        let t2s = write(
            dir.path(),
            "it-en.A3.final",
            "# Sentence pair (1)\nthe bank is closed\n\
             NULL ({ }) la ({ 1 }) banca ({ 2 }) è ({ 3 }) chiusa ({ 4 })\n",
        );
        let mut input = TrainingInput {
            corpus: ParallelCorpus::new(source, target).unwrap(),
            resource: TranslationResource::load(
                &AlignmentConfig::Giza {
                    source_to_target: s2t,
                    target_to_source: t2s,
                },
                LoadMode::Owned,
            )
            .unwrap(),
            source_tagger: Box::new(Untagged),
            target_tagger: None,
        };
        let mut config = TrainConfig::new(dir.path().join("out"), "it");
        config.features.bag = true;
        let trainer = Trainer::new(config, registry(), Box::new(Ib1Engine));
        let report = trainer.run(&mut input).unwrap();
        assert_eq!(report.sentences, 1);
        assert_eq!(report.exemplars, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("out/bank.?.it.train")).unwrap(),
            "bank\tbanca\n"
        );
    }
}
