use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use harness::config::CliOverrides;
use harness::pipeline::{self, SummaryArgs, SynthArgs, TrainArgs};

/// lrbm-harness: train and evaluate LRBM n-gram language models.
#[derive(Parser)]
#[command(name = "lrbm-harness", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands for training, trace inspection and synthetic data.
#[derive(Subcommand)]
enum Command {
    /// Train an LRBM with likelihood tracking and sentence-completion evaluation.
    Train {
        /// Parquet file of n-grams (columns t0..t{n-1}).
        #[arg(long)]
        ngrams: PathBuf,
        /// Sentence-completion challenge JSON.
        #[arg(long)]
        challenge: PathBuf,
        /// Path to training config TOML file. Built-in defaults when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Parent directory for the run directory.
        #[arg(long, default_value = "nnet_models")]
        output_dir: PathBuf,
        /// Override the number of epochs.
        #[arg(long)]
        epochs: Option<usize>,
        /// Override the momentum coefficient.
        #[arg(long)]
        alpha: Option<f64>,
        /// Override the learning rate.
        #[arg(long)]
        eps: Option<f64>,
        /// Override the minibatch size.
        #[arg(long)]
        minibatch_size: Option<usize>,
        /// Override the number of hidden units.
        #[arg(long)]
        n_hid: Option<usize>,
        /// Override the embedding dimension.
        #[arg(long)]
        d: Option<usize>,
        /// Build the control set by shuffling instead of resampling.
        #[arg(long)]
        shuffle_control: bool,
        /// Perturb every column of the control set.
        #[arg(long)]
        all_columns: bool,
    },
    /// Print the final metrics of a trace file.
    Summary {
        /// Path to a trace.json.
        #[arg(long)]
        input: PathBuf,
        /// Output as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
    /// Write a seeded synthetic corpus and challenge.
    Synth {
        /// Directory for ngrams.parquet and challenge.json.
        #[arg(long)]
        output_dir: PathBuf,
        /// N-gram order.
        #[arg(long, default_value_t = 4)]
        n: usize,
        #[arg(long, default_value_t = 50)]
        vocab_size: usize,
        /// Number of training sentences.
        #[arg(long, default_value_t = 500)]
        sentences: usize,
        /// Number of challenge groups.
        #[arg(long, default_value_t = 40)]
        groups: usize,
        /// Candidates per challenge group.
        #[arg(long, default_value_t = 5)]
        candidates: usize,
        #[arg(long, default_value_t = 12345)]
        seed: u64,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            ngrams,
            challenge,
            config,
            output_dir,
            epochs,
            alpha,
            eps,
            minibatch_size,
            n_hid,
            d,
            shuffle_control,
            all_columns,
        } => pipeline::run_train(TrainArgs {
            ngrams,
            challenge,
            config,
            output_dir,
            overrides: CliOverrides {
                epochs,
                alpha,
                eps,
                minibatch_size,
                n_hid,
                d,
                shuffle_control,
                all_columns,
            },
        })
        .map(|_| ()),
        Command::Summary { input, json } => pipeline::run_summary(SummaryArgs { input, json }),
        Command::Synth {
            output_dir,
            n,
            vocab_size,
            sentences,
            groups,
            candidates,
            seed,
        } => pipeline::run_synth(SynthArgs {
            output_dir,
            n,
            vocab_size,
            sentences,
            groups,
            candidates,
            seed,
        })
        .map(|_| ()),
    }
}
