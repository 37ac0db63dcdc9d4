//! CLI entrypoint for `doccrack`.
//!
//! Builds a run configuration from an optional JSON file plus command-line
//! overrides, wires Ctrl-C to the cancel token, runs the strategy sequence
//! against the target and prints a terminal summary. Exit status is 0 when
//! the credential is found, 1 when every strategy is exhausted or on error,
//! and 130 when interrupted.
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use doccrack::{
    config::{OracleKind, RunConfig},
    distributor::CancelToken,
    orchestrator::{Orchestrator, SearchOutcome, Strategy},
    progress::{BarObserver, ProgressObserver, Silent},
    report::render_outcome,
    space::Transform,
};
use log::{LevelFilter, error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "doccrack",
    version,
    about = "Resumable parallel credential search for protected documents"
)]
struct Args {
    /// Path to the protected target file
    target: PathBuf,

    /// Strategies to try, in order (comma separated)
    #[arg(short = 't', long = "strategy", value_enum, value_delimiter = ',')]
    strategies: Vec<Strategy>,

    /// Minimum candidate length for length sweeps
    #[arg(long = "min")]
    min_length: Option<usize>,

    /// Maximum candidate length for length sweeps
    #[arg(long = "max")]
    max_length: Option<usize>,

    /// Exact candidate length (overrides --min/--max)
    #[arg(short = 'l', long = "length")]
    length: Option<usize>,

    /// Number of worker threads
    #[arg(short = 'w', long = "workers")]
    workers: Option<usize>,

    /// Candidates per batch
    #[arg(short = 'b', long = "batch-size")]
    batch_size: Option<u64>,

    /// Directory for checkpoint files (default: next to the target)
    #[arg(long = "checkpoint-dir")]
    checkpoint_dir: Option<PathBuf>,

    /// Seconds between checkpoint saves
    #[arg(long = "checkpoint-interval")]
    checkpoint_interval: Option<f64>,

    /// Start fresh even if a checkpoint exists
    #[arg(long = "ignore-checkpoint")]
    ignore_checkpoint: bool,

    /// Word list for the wordlist strategy
    #[arg(long = "wordlist")]
    wordlist: Option<PathBuf>,

    /// Word list transforms (comma separated)
    #[arg(long = "transform", value_enum, value_delimiter = ',')]
    transforms: Vec<Transform>,

    /// Exclude lowercase letters from alphabetic sweeps
    #[arg(long = "no-lowercase")]
    no_lowercase: bool,

    /// Exclude uppercase letters from alphabetic sweeps
    #[arg(long = "no-uppercase")]
    no_uppercase: bool,

    /// Include ASCII punctuation in alphanumeric sweeps
    #[arg(long = "symbols")]
    symbols: bool,

    /// Maximum size of the heuristic set
    #[arg(long = "heuristic-cap")]
    heuristic_cap: Option<usize>,

    /// Seed for heuristic subsampling
    #[arg(long = "seed", conflicts_with = "random_seed")]
    seed: Option<u64>,

    /// Draw the heuristic subsampling seed from entropy
    #[arg(long = "random-seed")]
    random_seed: bool,

    /// Sweep all lengths as one combined space
    #[arg(long = "merge-lengths")]
    merge_lengths: bool,

    /// How candidates are verified
    #[arg(long = "oracle", value_enum)]
    oracle: Option<OracleKind>,

    /// Verifier command template, e.g. "qpdf --password={candidate} --check {target}"
    #[arg(long = "oracle-command")]
    oracle_command: Option<String>,

    /// Verifier exit codes meaning "wrong credential" (comma separated)
    #[arg(long = "no-match-code", value_delimiter = ',', allow_negative_numbers = true)]
    no_match_codes: Vec<i32>,

    /// Write the recovered credential to this file
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Load settings from a JSON config file
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Save the effective settings to a JSON config file
    #[arg(long = "save-config")]
    save_config: Option<PathBuf>,

    /// Append log output to this file instead of stderr
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Suppress the progress bar and summary output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

fn init_logger(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    if let Some(path) = log_file {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        builder
            .target(env_logger::Target::Pipe(Box::new(file)))
            .write_style(env_logger::WriteStyle::Never);
    }
    let _ = builder.try_init();
    Ok(())
}

/// File settings first, then every flag the user actually passed.
fn build_config(args: &Args) -> Result<RunConfig> {
    let mut cfg = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if !args.strategies.is_empty() {
        cfg.strategies = args.strategies.clone();
    }
    if let Some(v) = args.min_length {
        cfg.min_length = v;
    }
    if let Some(v) = args.max_length {
        cfg.max_length = v;
    }
    if args.length.is_some() {
        cfg.length = args.length;
    }
    if let Some(v) = args.workers {
        cfg.workers = v;
    }
    if args.batch_size.is_some() {
        cfg.batch_size = args.batch_size;
    }
    if args.checkpoint_dir.is_some() {
        cfg.checkpoint_dir = args.checkpoint_dir.clone();
    }
    if let Some(v) = args.checkpoint_interval {
        cfg.checkpoint_interval_secs = v;
    }
    cfg.ignore_checkpoint |= args.ignore_checkpoint;
    if args.wordlist.is_some() {
        cfg.wordlist = args.wordlist.clone();
    }
    if !args.transforms.is_empty() {
        cfg.transforms = args.transforms.clone();
    }
    if args.no_lowercase {
        cfg.lowercase = false;
    }
    if args.no_uppercase {
        cfg.uppercase = false;
    }
    cfg.symbols |= args.symbols;
    if let Some(v) = args.heuristic_cap {
        cfg.heuristic.cap = v;
    }
    if args.seed.is_some() {
        cfg.heuristic.seed = args.seed;
    }
    if args.random_seed {
        cfg.heuristic.seed = None;
    }
    cfg.merge_lengths |= args.merge_lengths;
    if let Some(kind) = args.oracle {
        cfg.oracle.kind = kind;
    }
    if args.oracle_command.is_some() {
        cfg.oracle.command = args.oracle_command.clone();
        if args.oracle.is_none() {
            cfg.oracle.kind = OracleKind::Command;
        }
    }
    if !args.no_match_codes.is_empty() {
        cfg.oracle.no_match_codes = args.no_match_codes.clone();
    }
    if args.output.is_some() {
        cfg.result_path = args.output.clone();
    }
    Ok(cfg)
}

fn run(args: &Args) -> Result<SearchOutcome> {
    let cfg = build_config(args)?;
    if let Some(path) = &args.save_config {
        cfg.save(path)?;
        info!("Settings saved to {}", path.display());
    }
    let oracle = cfg.oracle.build().context("configuring oracle")?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("Ctrl-C handler unavailable, interrupts will not checkpoint: {e}");
    }

    let bar = BarObserver::new();
    let observer: &dyn ProgressObserver = if args.quiet { &Silent } else { &bar };
    let orchestrator = Orchestrator::new(cfg, oracle, cancel).context("configuring search")?;
    let outcome = orchestrator
        .run(&args.target, observer)
        .with_context(|| format!("searching {}", args.target.display()))?;
    Ok(outcome)
}

fn main() {
    let args = Args::parse();
    if let Err(e) = init_logger(args.verbose, args.log_file.as_deref()) {
        let _ = init_logger(args.verbose, None);
        error!("{e:#}");
        process::exit(1);
    }
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }

    match run(&args) {
        Ok(outcome) => {
            if !args.quiet {
                println!("{}", render_outcome(&outcome));
            }
            process::exit(outcome.exit_code());
        }
        Err(e) => {
            error!("{e:#}");
            process::exit(1);
        }
    }
}
