//! Run pipelines behind the `train`, `summary` and `synth` subcommands.

use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;
use indicatif::{ProgressBar, ProgressStyle};

use corpus::synthetic::{generate, SyntheticConfig};
use corpus::{NgramMatrix, NgramReader, NgramWriter, SentenceChallenge};
use lrbm::{
    perturb, split, EnergyModel, LikelihoodTracker, Lrbm, NgramModel, Orchestrator, RandomSource,
    SentenceCompletionEvaluator, TrainingCallback, TrainingTrace,
};

use crate::config::{
    build_control_config, build_lrbm_config, build_training_config, load_train_toml, CliOverrides,
    TrainToml,
};
use crate::results::{run_dir, RunSummary, TraceSummary};

/// Backend used for CLI training runs.
pub type TrainBackend = Autodiff<NdArray<f32>>;

/// Arguments for the `train` subcommand.
#[derive(Debug)]
pub struct TrainArgs {
    /// Parquet file of n-grams.
    pub ngrams: PathBuf,
    /// Sentence-completion challenge JSON.
    pub challenge: PathBuf,
    /// TOML config. Built-in defaults when `None`.
    pub config: Option<PathBuf>,
    /// Parent directory of the run directory.
    pub output_dir: PathBuf,
    pub overrides: CliOverrides,
}

/// Arguments for the `summary` subcommand.
#[derive(Debug)]
pub struct SummaryArgs {
    /// Path to a `trace.json`.
    pub input: PathBuf,
    /// Output as JSON instead of human-readable text.
    pub json: bool,
}

/// Arguments for the `synth` subcommand.
#[derive(Debug)]
pub struct SynthArgs {
    pub output_dir: PathBuf,
    pub n: usize,
    pub vocab_size: usize,
    pub sentences: usize,
    pub groups: usize,
    pub candidates: usize,
    pub seed: u64,
}

/// Advances a progress bar once per minibatch.
struct ProgressCallback {
    pb: ProgressBar,
}

impl TrainingCallback for ProgressCallback {
    fn name(&self) -> &str {
        "progress"
    }

    fn on_minibatch(
        &mut self,
        _model: &dyn EnergyModel,
        _trace: &mut TrainingTrace,
        _epoch: usize,
        _mnb: usize,
    ) -> anyhow::Result<()> {
        self.pb.inc(1);
        Ok(())
    }

    fn on_epoch(&mut self, _model: &dyn EnergyModel, trace: &mut TrainingTrace, epoch: usize) -> anyhow::Result<()> {
        if let Some(point) = trace.sentence_completion().last() {
            self.pb.set_message(format!("epoch {epoch} acc={:.3}", point.value));
        }
        Ok(())
    }
}

/// Check that every challenge candidate has the corpus order and vocabulary.
fn validate_challenge(challenge: &SentenceChallenge, n: usize) -> anyhow::Result<()> {
    for (g, group) in challenge.groups.iter().enumerate() {
        for (c, candidate) in group.iter().enumerate() {
            if !candidate.is_empty() && candidate.n() != n {
                anyhow::bail!(
                    "challenge group {g} candidate {c} has {} columns, corpus has {n}",
                    candidate.n()
                );
            }
            candidate
                .validate(challenge.vocab_size)
                .map_err(|e| anyhow::anyhow!("challenge group {g} candidate {c}: {e}"))?;
        }
    }
    Ok(())
}

/// Train an LRBM under the evaluation protocol and write `trace.json` and
/// `summary.json` into the run directory.
///
/// The trace is written even when training fails, so a partial run can
/// still be inspected.
pub fn run_train(args: TrainArgs) -> anyhow::Result<RunSummary> {
    let start = Instant::now();

    // 1. Config
    let toml = match &args.config {
        Some(path) => load_train_toml(path)?,
        None => TrainToml::default(),
    };
    let training = build_training_config(&toml.training, &args.overrides);
    training.validate()?;
    let control_config = build_control_config(&toml.control, &args.overrides);

    // 2. Data
    let ngrams = NgramReader::read_all(&args.ngrams)?;
    let challenge = SentenceChallenge::from_json(&args.challenge)?;
    let vocab_size = challenge.vocab_size;
    ngrams.validate(vocab_size)?;
    validate_challenge(&challenge, ngrams.n())?;
    tracing::info!(
        rows = ngrams.len(),
        n = ngrams.n(),
        vocab_size,
        groups = challenge.len(),
        "Loaded corpus"
    );

    // 3. Partition and control set share one random stream
    let mut rng = RandomSource::from_option(training.split_seed).rng();
    let parts = split(&ngrams, training.validation, training.test, &mut rng)?;
    let distribution = if control_config.shuffle {
        None
    } else {
        Some(NgramModel::unigram_distribution(&parts.train, vocab_size)?)
    };
    let control = perturb(
        &parts.valid,
        vocab_size,
        control_config.all_columns,
        distribution.as_ref(),
        control_config.shuffle,
        &mut rng,
    )?;

    // 4. Model
    let model_config = build_lrbm_config(ngrams.n(), vocab_size, &toml.model, &args.overrides);
    let dir = run_dir(
        &args.output_dir,
        model_config.n_hid,
        model_config.d,
        training.minibatch_size,
        training.epochs,
        training.learning_rate,
        training.alpha,
    );
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", dir.display()))?;
    tracing::info!(
        d = model_config.d,
        n_hid = model_config.n_hid,
        run_dir = %dir.display(),
        "Building LRBM"
    );
    let mut model = Lrbm::<TrainBackend>::new(model_config, Default::default())?;

    // 5. Train
    let mut tracker = LikelihoodTracker::new(
        parts.valid.clone(),
        control,
        training.log_lik_size,
        training.decimation,
    )?;
    let mut evaluator = SentenceCompletionEvaluator::new(challenge);
    let mut orchestrator = Orchestrator::new(training.clone());
    let total = (orchestrator.minibatches_per_epoch(parts.train.len()) * training.epochs) as u64;
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("=> "),
    );
    let mut progress = ProgressCallback { pb: pb.clone() };

    let mut trace = TrainingTrace::new();
    let callbacks: &mut [&mut dyn TrainingCallback] = &mut [&mut tracker, &mut evaluator, &mut progress];
    let result = orchestrator.run(&mut model, &parts.train, &parts.valid, callbacks, &mut trace);
    pb.finish_and_clear();
    trace.save_json(&dir.join("trace.json"))?;
    if let Err(e) = result {
        tracing::error!(state = %orchestrator.state(), error = %e, "Training aborted; partial trace saved");
        return Err(e.into());
    }

    // 6. Summary
    let summary = RunSummary {
        n: ngrams.n(),
        vocab_size,
        train_rows: parts.train.len(),
        valid_rows: parts.valid.len(),
        test_rows: parts.test.len(),
        challenge_groups: evaluator.challenge().len(),
        elapsed_secs: start.elapsed().as_secs_f64(),
        trace: TraceSummary::of(&trace),
    };
    summary.save_json(&dir.join("summary.json"))?;

    println!("{}", summary.trace.render());
    println!("Run directory: {}", dir.display());
    Ok(summary)
}

/// Print the final metrics of a saved trace.
pub fn run_summary(args: SummaryArgs) -> anyhow::Result<()> {
    let trace = TrainingTrace::load_json(&args.input)?;
    let summary = TraceSummary::of(&trace);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("--- {} ---", args.input.display());
        print!("{}", summary.render());
    }
    Ok(())
}

/// Write `ngrams.parquet` and `challenge.json` for a synthetic corpus.
pub fn run_synth(args: SynthArgs) -> anyhow::Result<(PathBuf, PathBuf)> {
    let config = SyntheticConfig {
        n: args.n,
        vocab_size: args.vocab_size,
        sentences: args.sentences,
        groups: args.groups,
        candidates: args.candidates,
        seed: args.seed,
        ..SyntheticConfig::default()
    };
    let corpus = generate(&config)?;
    std::fs::create_dir_all(&args.output_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", args.output_dir.display()))?;

    let ngrams_path = write_ngrams(&corpus.ngrams, &args.output_dir.join("ngrams.parquet"))?;
    let challenge_path = args.output_dir.join("challenge.json");
    corpus.challenge.to_json(&challenge_path)?;

    tracing::info!(
        rows = corpus.ngrams.len(),
        groups = corpus.challenge.len(),
        output_dir = %args.output_dir.display(),
        "Wrote synthetic corpus"
    );
    Ok((ngrams_path, challenge_path))
}

fn write_ngrams(matrix: &NgramMatrix, path: &Path) -> anyhow::Result<PathBuf> {
    let mut writer = NgramWriter::new(path.to_path_buf(), matrix.n());
    writer.record_all(matrix);
    writer.finish()
}
