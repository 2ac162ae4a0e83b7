//! Train on a small aligned corpus, then classify a SemEval test file with
//! the in-process engine.

use std::fs;
use std::path::{Path, PathBuf};

use clwsd::{
    AlignmentConfig, BowParams, FeatureConfig, Ib1Engine, TestConfig, TestError, Tester,
    TrainConfig, Trainer, TrainingInput, TranslationResource,
};
use clwsd_corpus::{LoadMode, ParallelCorpus, PhraseTableFormat, TargetWords, read_bag_keywords};
use clwsd_tagger::{Lexicon, LexiconTagger, SimpleTokenizer, Tagger};
use clwsd_types::LemmaKey;

const SOURCE: &str = "the bank is closed\n\
                      the bank of the river\n\
                      the bank raised rates\n\
                      we sat on the bank of the river\n";

const TARGET: &str = "la banca è chiusa\n\
                      la riva del fiume\n\
                      la banca ha alzato i tassi\n\
                      sedevamo sulla riva del fiume\n";

const PHRASE_TABLE: &str = "bank ||| banca ||| 0.9 0 0.8 0\n\
                            bank ||| riva ||| 0.3 0 0.7 0\n";

const TEST_DATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<corpus lang="english">
<lexelt item="bank.n">
<instance id="2">
<context>we sat on the <head>bank</head> of the river .</context>
</instance>
<instance id="1">
<context>the <head>bank</head> raised its rates .</context>
</instance>
</lexelt>
</corpus>
"#;

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

fn tagger() -> Box<dyn Tagger> {
    Box::new(LexiconTagger::new(Lexicon::parse("bank\tbank\tNN\n").unwrap()))
}

fn registry() -> TargetWords {
    TargetWords::parse("bank\tn\tit\tbanca;riva\n").unwrap()
}

fn phrase_table_input(dir: &Path) -> TrainingInput {
    let source = write(dir, "corpus.en", SOURCE);
    let target = write(dir, "corpus.it", TARGET);
    let table = write(dir, "phrase-table", PHRASE_TABLE);
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
        source_tagger: tagger(),
        target_tagger: None,
    }
}

fn features(bag: bool) -> FeatureConfig {
    FeatureConfig {
        context_size: 1,
        bag,
        ..FeatureConfig::default()
    }
}

fn test_dir(dir: &Path) -> PathBuf {
    let test = dir.join("test");
    fs::create_dir_all(&test).unwrap();
    write(&test, "bank.data", TEST_DATA);
    test
}

fn classify(dir: &Path, out: &Path, features: FeatureConfig) -> Result<(), TestError> {
    let mut config = TestConfig::new(test_dir(dir), out, "it");
    config.features = features;
    config.voter = true;
    let tester = Tester::new(config, registry(), Box::new(Ib1Engine));
    let mut tagger = tagger();
    let report = tester.run(tagger.as_mut(), &SimpleTokenizer)?;
    assert_eq!(report.lemmas, vec![LemmaKey::new("bank", "n")]);
    assert_eq!(report.instances, 2);
    assert_eq!(report.partial_matches, 0);
    Ok(())
}

#[test]
fn train_then_classify_with_a_phrase_table() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let mut config = TrainConfig::new(&out, "it");
    config.features = features(false);
    let trainer = Trainer::new(config, registry(), Box::new(Ib1Engine));
    let report = trainer.run(&mut phrase_table_input(dir.path())).unwrap();
    assert_eq!(report.exemplars, 4);
    assert_eq!(report.classifiers, vec![out.join("bank.n.it")]);
    assert_eq!(
        fs::read_to_string(out.join("bank.n.it.train")).unwrap(),
        "the\tbank\tis\tbanca\n\
         the\tbank\tof\triva\n\
         the\tbank\traised\tbanca\n\
         the\tbank\tof\triva\n"
    );

    classify(dir.path(), &out, features(false)).unwrap();
    assert_eq!(
        fs::read_to_string(out.join("bank.n.best")).unwrap(),
        "bank.n.it 1 :: banca;\nbank.n.it 2 :: riva;\n"
    );
    let oof = fs::read_to_string(out.join("bank.n.oof")).unwrap();
    let lines: Vec<&str> = oof.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("bank.n.it 1 ::: banca;"));
    assert!(lines[1].starts_with("bank.n.it 2 ::: riva;"));
    assert_eq!(
        fs::read_to_string(out.join("bank.n.votertest")).unwrap(),
        "1\tbank\tbanca\n2\tbank\triva\n"
    );
}

#[test]
fn bag_of_words_keywords_extend_the_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let mut config = TrainConfig::new(&out, "it");
    config.features = features(true);
    config.bow = BowParams {
        absolute_threshold: 2,
        prob_threshold: 0.0,
        filter_threshold: 1,
        adaptive: false,
    };
    let trainer = Trainer::new(config, registry(), Box::new(Ib1Engine));
    let report = trainer.run(&mut phrase_table_input(dir.path())).unwrap();
    assert_eq!(report.bags, 1);

    let keywords = read_bag_keywords(&out.join("bank.n.it.bag")).unwrap();
    assert_eq!(
        keywords,
        vec![
            LemmaKey::new("of", "?"),
            LemmaKey::new("river", "?"),
            LemmaKey::new("the", "?"),
        ]
    );
    let train = fs::read_to_string(out.join("bank.n.it.train")).unwrap();
    let rows: Vec<&str> = train.lines().collect();
    assert_eq!(rows[0], "the\tbank\tis\t0\t0\t1\tbanca");
    assert_eq!(rows[1], "the\tbank\tof\t1\t1\t1\triva");

    classify(dir.path(), &out, features(true)).unwrap();
    assert_eq!(
        fs::read_to_string(out.join("bank.n.best")).unwrap(),
        "bank.n.it 1 :: banca;\nbank.n.it 2 :: riva;\n"
    );
}

#[test]
fn testing_with_another_schema_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let mut config = TrainConfig::new(&out, "it");
    config.features = features(false);
    Trainer::new(config, registry(), Box::new(Ib1Engine))
        .run(&mut phrase_table_input(dir.path()))
        .unwrap();

    let mut wider = features(false);
    wider.context_size = 2;
    let err = classify(dir.path(), &out, wider).unwrap_err();
    assert!(matches!(err, TestError::SchemaMismatch { .. }), "{err}");
    assert!(!out.join("bank.n.best").exists());
}

#[test]
fn giza_intersection_labels_match_the_phrase_table_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = write(
        dir.path(),
        "corpus.en",
        "the bank is closed\nthe bank of the river\n",
    );
    let target = write(dir.path(), "corpus.it", "la banca è chiusa\nla riva del fiume\n");
    let s2t = write(
        dir.path(),
        "en-it.A3.final",
        "# Sentence pair (1) source length 4 target length 4 alignment score : 1.1e-06\n\
         la banca è chiusa\n\
         NULL ({ }) the ({ 1 }) bank ({ 2 }) is ({ 3 }) closed ({ 4 })\n\
         # Sentence pair (2) source length 5 target length 4 alignment score : 2.4e-05\n\
         la riva del fiume\n\
         NULL ({ }) the ({ 1 }) bank ({ 2 }) of ({ 3 }) the ({ }) river ({ 4 })\n",
    );
    let t2s = write(
        dir.path(),
        "it-en.A3.final",
        "# Sentence pair (1) source length 4 target length 4 alignment score : 1.3e-06\n\
         the bank is closed\n\
         NULL ({ }) la ({ 1 }) banca ({ 2 }) è ({ 3 }) chiusa ({ 4 })\n\
         # Sentence pair (2) source length 4 target length 5 alignment score : 3.0e-05\n\
         the bank of the river\n\
         NULL ({ }) la ({ 1 }) riva ({ 2 }) del ({ 3 }) fiume ({ 5 })\n",
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
        source_tagger: tagger(),
        target_tagger: None,
    };

    let out = dir.path().join("out");
    let mut config = TrainConfig::new(&out, "it");
    config.features = features(false);
    let report = Trainer::new(config, registry(), Box::new(Ib1Engine))
        .run(&mut input)
        .unwrap();
    assert_eq!(report.exemplars, 2);
    assert_eq!(report.not_found, 0);
    assert_eq!(
        fs::read_to_string(out.join("bank.n.it.train")).unwrap(),
        "the\tbank\tis\tbanca\nthe\tbank\tof\triva\n"
    );
}
