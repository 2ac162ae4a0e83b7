use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clwsd::config::DEFAULT_CLASSIFIER_OPTIONS;
use clwsd::scoring::{OutputKind, output_path};
use clwsd::{
    AlignmentConfig, BagScope, BowParams, ClassifierEngine, FeatureConfig, Ib1Engine, Scorer,
    TestConfig, Tester, TimblEngine, TrainConfig, TrainError, Trainer, TrainingInput,
    TranslationResource, WindowBoundary,
};
use clwsd_corpus::{LoadMode, ParallelCorpus, PhraseTableFormat, TargetWords, VariableConfiguration};
use clwsd_tagger::{SimpleTokenizer, TaggerSpec, Tokenizer, Ucto};
use clwsd_types::LemmaKey;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clwsd")]
#[command(about = "Cross-lingual word sense disambiguation with k-NN word experts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract exemplars from a parallel corpus and train word experts.
    Train(TrainArgs),
    /// Classify SemEval test files with trained word experts.
    Test(TestArgs),
    /// Score existing output and write the results report.
    Score(ScoreArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Engine {
    /// The external timbl binary.
    Timbl,
    /// In-process IB1.
    Ib1,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TokenizerKind {
    Simple,
    Ucto,
}

#[derive(Args)]
struct CommonArgs {
    /// Target language code.
    #[arg(short = 'L', long = "lang")]
    lang: String,

    /// Target-word registry.
    #[arg(short = 'w', long, env = "CLWSD_TARGETWORDS")]
    targetwords: PathBuf,

    /// Output directory for classifiers, bags and results.
    #[arg(short = 'o', long, env = "CLWSD_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Classifier options.
    #[arg(short = 'O', long, default_value = DEFAULT_CLASSIFIER_OPTIONS, allow_hyphen_values = true)]
    options: String,

    #[arg(long, value_enum, default_value_t = Engine::Timbl)]
    engine: Engine,

    /// Program run for the timbl engine.
    #[arg(long, default_value = "timbl")]
    timbl: String,
}

impl CommonArgs {
    fn engine(&self) -> Box<dyn ClassifierEngine> {
        match self.engine {
            Engine::Timbl => Box::new(TimblEngine::new(self.timbl.as_str())),
            Engine::Ib1 => Box::new(Ib1Engine),
        }
    }

    fn registry(&self) -> Result<TargetWords> {
        info!("loading target words {}", self.targetwords.display());
        let registry = TargetWords::load(&self.targetwords)?;
        info!("{} target words", registry.len());
        Ok(registry)
    }
}

#[derive(Args)]
struct FeatureArgs {
    /// Context size on either side of the focus word.
    #[arg(short = 'c', long = "context", default_value_t = 0)]
    context_size: usize,

    /// Add a POS tag channel.
    #[arg(short = 'p', long)]
    pos: bool,

    /// Add a lemma channel.
    #[arg(short = 'l', long)]
    lemma: bool,

    /// Add bag-of-words keyword indicators.
    #[arg(short = 'b', long)]
    bag: bool,

    /// Treat the first token of a sentence as outside the window.
    #[arg(long)]
    skip_first_token: bool,

    #[arg(long, value_enum, default_value_t = Scope::Sentence)]
    bag_scope: Scope,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scope {
    Sentence,
    Window,
}

impl FeatureArgs {
    fn config(&self) -> FeatureConfig {
        FeatureConfig {
            context_size: self.context_size,
            pos: self.pos,
            lemma: self.lemma,
            bag: self.bag,
            window_boundary: if self.skip_first_token {
                WindowBoundary::SkipFirstToken
            } else {
                WindowBoundary::Inclusive
            },
            bag_scope: match self.bag_scope {
                Scope::Sentence => BagScope::Sentence,
                Scope::Window => BagScope::Window,
            },
        }
    }
}

#[derive(Args)]
struct TrainArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    features: FeatureArgs,

    /// Source side of the parallel corpus.
    #[arg(short = 's', long)]
    source: Option<PathBuf>,

    /// Target side of the parallel corpus.
    #[arg(short = 't', long)]
    target: Option<PathBuf>,

    /// Moses phrase table.
    #[arg(short = 'm', long, conflicts_with = "giza")]
    phrase_table: Option<PathBuf>,

    /// GIZA++ alignments as `source-to-target:target-to-source`.
    #[arg(short = 'a', long)]
    giza: Option<String>,

    #[arg(long, value_parser = parse_load_mode, default_value = "mmap")]
    load_mode: LoadMode,

    /// Source tagger: none, lex:PATH, file:PATH, frog:PORT, freeling:CHANNEL or corenlp.
    #[arg(long, value_parser = TaggerSpec::parse)]
    stagger: Option<TaggerSpec>,

    /// Target tagger; without one, labels are target surface forms.
    #[arg(long, value_parser = TaggerSpec::parse)]
    ttagger: Option<TaggerSpec>,

    /// Bag-of-words thresholds `absolute,probability,filter`.
    #[arg(short = 'B', long, default_value = "3,0.001,20")]
    bow: BowParams,

    /// Tune the absolute threshold per word to keep bags between 6 and 499 keywords.
    #[arg(short = 'R', long)]
    adaptive: bool,

    /// Reject translations scoring below this fraction of the best option.
    #[arg(short = 'M', long, default_value_t = 0.5)]
    max_divergence: f64,

    /// Classify the training data to produce voter input.
    #[arg(short = 'V', long)]
    voter: bool,

    /// Only write voter input for classifiers trained earlier.
    #[arg(long, conflicts_with = "nogen")]
    voter_only: bool,

    /// Train on existing .train files without reading the corpus.
    #[arg(long)]
    nogen: bool,

    /// Parameter search program run on every train file.
    #[arg(long)]
    paramsearch: Option<String>,

    /// Classifier training threads (0: one per core).
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

#[derive(Args)]
struct ScoringArgs {
    /// Scorer script.
    #[arg(long, env = "CLWSD_SCORER", default_value = "ScorerTask3.pl")]
    scorer: PathBuf,

    /// Test directory with `<lemma>.data` files and `<lang>/<lemma>_gold.txt`.
    #[arg(short = 'T', long)]
    test_dir: PathBuf,
}

#[derive(Args)]
struct TestArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    features: FeatureArgs,

    #[command(flatten)]
    scoring: ScoringArgs,

    /// Source tagger, as for training.
    #[arg(long, value_parser = TaggerSpec::parse)]
    stagger: TaggerSpec,

    #[arg(long, value_enum, default_value_t = TokenizerKind::Simple)]
    tokenizer: TokenizerKind,

    /// Source language passed to the tokenizer.
    #[arg(long, default_value = "en")]
    source_lang: String,

    /// Output every sense scoring at least this fraction of the best one.
    #[arg(short = 'I', long, default_value_t = 0.9)]
    divergence_from_best: f64,

    /// Restrict output to the registry's senses.
    #[arg(short = 'S', long)]
    constrain_senses: bool,

    /// Write voter test input.
    #[arg(short = 'V', long)]
    voter: bool,

    /// Per-lemma feature configuration file.
    #[arg(short = 'v', long)]
    variable: Option<PathBuf>,

    /// Do not score after testing.
    #[arg(short = 'X', long)]
    no_score: bool,
}

#[derive(Args)]
struct ScoreArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    scoring: ScoringArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Train(args) => train(args),
        Commands::Test(args) => test(args),
        Commands::Score(args) => score(args),
    }
}

fn train(args: TrainArgs) -> Result<()> {
    let registry = args.common.registry()?;
    let mut config = TrainConfig::new(&args.common.output_dir, args.common.lang.as_str());
    config.features = args.features.config();
    config.bow = BowParams {
        adaptive: args.adaptive,
        ..args.bow
    };
    config.max_divergence_from_best = args.max_divergence;
    config.classifier_options = args.common.options.clone();
    config.threads = args.threads;
    config.voter = args.voter;
    config.paramsearch = args.paramsearch.clone();
    let trainer = Trainer::new(config, registry, args.common.engine());

    if args.voter_only {
        let prefixes = trainer.voter_only()?;
        info!("wrote voter input for {} classifiers", prefixes.len());
        return Ok(());
    }
    if args.nogen {
        let prefixes = trainer.retrain()?;
        info!("trained {} classifiers", prefixes.len());
        return Ok(());
    }

    let alignment = match (&args.phrase_table, &args.giza) {
        (Some(path), _) => AlignmentConfig::PhraseTable {
            path: path.clone(),
            format: PhraseTableFormat::default(),
        },
        (None, Some(giza)) => {
            let (s2t, t2s) = giza
                .split_once(':')
                .context("GIZA alignments must be given as source-to-target:target-to-source")?;
            AlignmentConfig::Giza {
                source_to_target: s2t.into(),
                target_to_source: t2s.into(),
            }
        }
        (None, None) => return Err(TrainError::NoAlignmentSource.into()),
    };
    let source = args.source.as_deref().context("no source file given (-s)")?;
    let target = args.target.as_deref().context("no target file given (-t)")?;
    let stagger = args.stagger.as_ref().context("no source tagger given (--stagger)")?;

    let corpus = ParallelCorpus::new(source, target)?;
    let start = Instant::now();
    let resource = TranslationResource::load(&alignment, args.load_mode)?;
    info!("translation resource loaded in {} ms", start.elapsed().as_millis());

    let target_tagger = match &args.ttagger {
        Some(spec) => Some(spec.build()?),
        None => {
            warn!("no target tagger given, labels will be surface forms");
            None
        }
    };
    let mut input = TrainingInput {
        corpus,
        resource,
        source_tagger: stagger.build()?,
        target_tagger,
    };

    let start = Instant::now();
    let report = trainer.run(&mut input)?;
    info!(
        "trained {} classifiers from {} exemplars in {} ms",
        report.classifiers.len(),
        report.exemplars,
        start.elapsed().as_millis()
    );
    Ok(())
}

fn test(args: TestArgs) -> Result<()> {
    let registry = args.common.registry()?;
    let mut config = TestConfig::new(
        &args.scoring.test_dir,
        &args.common.output_dir,
        args.common.lang.as_str(),
    );
    config.features = args.features.config();
    config.classifier_options = args.common.options.clone();
    config.divergence_from_best_output = args.divergence_from_best;
    config.constrain_senses = args.constrain_senses;
    config.voter = args.voter;
    config.variable = args
        .variable
        .as_ref()
        .map(VariableConfiguration::load)
        .transpose()?;

    let tester = Tester::new(config, registry, args.common.engine());
    let mut tagger = args.stagger.build()?;
    let tokenizer: Box<dyn Tokenizer> = match args.tokenizer {
        TokenizerKind::Simple => Box::new(SimpleTokenizer),
        TokenizerKind::Ucto => Box::new(Ucto::new(args.source_lang.as_str())),
    };

    let start = Instant::now();
    let report = tester.run(tagger.as_mut(), tokenizer.as_ref())?;
    info!(
        "classified {} instances of {} words in {} ms ({} partial head matches)",
        report.instances,
        report.lemmas.len(),
        start.elapsed().as_millis(),
        report.partial_matches
    );

    if !args.no_score {
        run_scorer(&args.common, &args.scoring, &report.lemmas)?;
    }
    Ok(())
}

fn score(args: ScoreArgs) -> Result<()> {
    let registry = args.common.registry()?;
    let keys: Vec<_> = registry
        .keys()
        .filter(|key| output_path(&args.common.output_dir, key, OutputKind::Best).is_file())
        .cloned()
        .collect();
    run_scorer(&args.common, &args.scoring, &keys)
}

fn run_scorer(
    common: &CommonArgs,
    scoring: &ScoringArgs,
    keys: &[LemmaKey],
) -> Result<()> {
    info!("scoring {} words", keys.len());
    let report = Scorer::new(&scoring.scorer).score_all(
        &common.output_dir,
        &scoring.test_dir,
        &common.lang,
        keys,
    )?;
    print!("{}", report.render());
    Ok(())
}

fn parse_load_mode(raw: &str) -> Result<LoadMode, String> {
    LoadMode::parse(raw).ok_or_else(|| format!("unknown load mode {raw:?} (mmap or owned)"))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .init();
}
