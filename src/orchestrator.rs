//! Strategy sequencing for one target.
//!
//! Each strategy expands into one or more candidate spaces (one per length
//! for the length-parameterized ones, or a single composite with
//! `merge_lengths`). Spaces are run shortest first, each resumed from and
//! saved to its own checkpoint. The first match ends the whole search.
//!
//! ```no_run
//! use std::path::Path;
//! use doccrack::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let config = RunConfig {
//!     strategies: vec![Strategy::FixedLengthDigits],
//!     length: Some(4),
//!     ..Default::default()
//! };
//! let oracle = config.oracle.build()?;
//! let orchestrator = Orchestrator::new(config, oracle, CancelToken::new())?;
//! let outcome = orchestrator.run(Path::new("secret.sha256"), &Silent)?;
//! println!("{}", doccrack::report::render_outcome(&outcome));
//! # Ok(())
//! # }
//! ```
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{self, CheckpointBinding, CheckpointStore, SpaceKey};
use crate::config::RunConfig;
use crate::distributor::{CancelToken, Hooks, Outcome, ResumePoint, WorkDistributor};
use crate::error::Result;
use crate::export::save_result;
use crate::oracle::Oracle;
use crate::progress::ProgressObserver;
use crate::space::{
    Alphabet, CandidateSpace, CharsetSpace, CompositeSpace, DigitSpace, HeuristicSpace,
    PasswordSpace, WordListSpace,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum Strategy {
    /// Years, digit runs, dates and other common PINs
    #[value(name = "heuristic", alias = "smart")]
    #[serde(rename = "heuristic", alias = "smart")]
    HeuristicSet,
    /// Zero-padded numbers of each length
    #[value(name = "numeric", alias = "digits")]
    #[serde(rename = "numeric", alias = "digits")]
    FixedLengthDigits,
    /// Letters of each length
    #[value(name = "alphabetic")]
    #[serde(rename = "alphabetic")]
    Alphabetic,
    /// Letters and digits (optionally symbols) of each length
    #[value(name = "alphanumeric")]
    #[serde(rename = "alphanumeric")]
    Alphanumeric,
    /// Word list entries and their transforms
    #[value(name = "wordlist", alias = "dictionary")]
    #[serde(rename = "wordlist", alias = "dictionary")]
    WordList,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::HeuristicSet => "HeuristicSet",
            Strategy::FixedLengthDigits => "FixedLengthDigits",
            Strategy::Alphabetic => "Alphabetic",
            Strategy::Alphanumeric => "Alphanumeric",
            Strategy::WordList => "WordList",
        }
    }

    fn is_length_sweep(&self) -> bool {
        matches!(
            self,
            Strategy::FixedLengthDigits | Strategy::Alphabetic | Strategy::Alphanumeric
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-target search states, logged at debug level as they change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    CheckingTarget,
    ResumingOrStarting,
    Dispatching,
    Found,
    Exhausted,
    ExhaustedAll,
    Interrupted,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSummary {
    /// Candidates tried by this invocation across every space.
    pub tried: u64,
    pub elapsed: Duration,
    /// Strategies entered, in order.
    pub strategies: Vec<Strategy>,
    /// Spaces skipped because a checkpoint marked them exhausted.
    pub skipped_spaces: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found {
        candidate: String,
        strategy: Strategy,
        position: u64,
        summary: SearchSummary,
    },
    ExhaustedAll {
        summary: SearchSummary,
    },
    Interrupted {
        strategy: Strategy,
        position: u64,
        summary: SearchSummary,
    },
}

impl SearchOutcome {
    pub fn summary(&self) -> &SearchSummary {
        match self {
            SearchOutcome::Found { summary, .. }
            | SearchOutcome::ExhaustedAll { summary }
            | SearchOutcome::Interrupted { summary, .. } => summary,
        }
    }

    /// Process exit code: 0 found, 1 exhausted, 130 interrupted.
    pub fn exit_code(&self) -> i32 {
        match self {
            SearchOutcome::Found { .. } => 0,
            SearchOutcome::ExhaustedAll { .. } => 1,
            SearchOutcome::Interrupted { .. } => 130,
        }
    }
}

pub struct Orchestrator {
    config: RunConfig,
    oracle: Arc<dyn Oracle>,
    distributor: WorkDistributor,
}

impl Orchestrator {
    pub fn new(config: RunConfig, oracle: Arc<dyn Oracle>, cancel: CancelToken) -> Result<Self> {
        let distributor = WorkDistributor::new(config.distributor()?, cancel);
        Ok(Self {
            config,
            oracle,
            distributor,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Candidate spaces for `strategy`, shortest first.
    pub fn spaces_for(&self, strategy: Strategy) -> Result<Vec<PasswordSpace>> {
        let cfg = &self.config;
        let mut spaces: Vec<PasswordSpace> = Vec::new();
        match strategy {
            Strategy::HeuristicSet => {
                spaces.push(HeuristicSpace::new(cfg.heuristic.clone())?.into());
            }
            Strategy::FixedLengthDigits => {
                for l in cfg.lengths()? {
                    spaces.push(DigitSpace::new(l)?.into());
                }
            }
            Strategy::Alphabetic | Strategy::Alphanumeric => {
                let digits = strategy == Strategy::Alphanumeric;
                let symbols = digits && cfg.symbols;
                let alphabet = Alphabet::from_sets(cfg.lowercase, cfg.uppercase, digits, symbols)?;
                for l in cfg.lengths()? {
                    spaces.push(CharsetSpace::new(l, alphabet.clone())?.into());
                }
            }
            Strategy::WordList => match &cfg.wordlist {
                Some(source) => {
                    spaces.push(WordListSpace::new(source, &cfg.transforms)?.into());
                }
                None => {
                    warn!("Skipping {strategy}: no word list configured");
                }
            },
        }
        if cfg.merge_lengths && strategy.is_length_sweep() && spaces.len() > 1 {
            return Ok(vec![CompositeSpace::new(spaces)?.into()]);
        }
        Ok(spaces)
    }

    /// Run every configured strategy against `target` until one matches.
    pub fn run(&self, target: &Path, observer: &dyn ProgressObserver) -> Result<SearchOutcome> {
        let started = Instant::now();
        let mut state = SearchState::Idle;
        let mut summary = SearchSummary::default();
        let store = match &self.config.checkpoint_dir {
            Some(dir) => CheckpointStore::new(dir),
            None => CheckpointStore::beside(target),
        };

        transition(&mut state, SearchState::CheckingTarget);
        let target_id = checkpoint::target_id(target)?;
        self.oracle.prepare(target)?;

        for &strategy in &self.config.strategies {
            let spaces = self.spaces_for(strategy)?;
            if spaces.is_empty() {
                continue;
            }
            info!("Strategy {strategy}: {} space(s)", spaces.len());
            summary.strategies.push(strategy);

            for space in &spaces {
                if state != SearchState::CheckingTarget {
                    transition(&mut state, SearchState::CheckingTarget);
                    checkpoint::target_id(target)?;
                }
                transition(&mut state, SearchState::ResumingOrStarting);
                let key = SpaceKey::of(space);
                let total = space.total_count();
                let prior = self.resume_record(&store, &target_id, &key);
                let (resume, prior_tried, prior_elapsed) = match &prior {
                    Some(r) => (
                        ResumePoint {
                            position: r.position.min(total),
                            completed: r.completed.clone(),
                        },
                        r.tried_count,
                        r.elapsed_seconds,
                    ),
                    None => (ResumePoint::default(), 0, 0.0),
                };
                if resume.position >= total {
                    info!("{} already exhausted, skipping", space.describe());
                    summary.skipped_spaces += 1;
                    transition(&mut state, SearchState::Exhausted);
                    continue;
                }
                if resume.position > 0 || !resume.completed.is_empty() {
                    info!(
                        "Resuming {} at position {} of {total}",
                        space.describe(),
                        resume.position
                    );
                }

                let binding = CheckpointBinding {
                    store: &store,
                    target_id: &target_id,
                    key,
                    prior_tried,
                    prior_elapsed,
                };
                let label = space.describe();
                let hooks = Hooks {
                    label: &label,
                    checkpoint: Some(&binding),
                    observer,
                };

                transition(&mut state, SearchState::Dispatching);
                let result = self.distributor.run(
                    space,
                    target,
                    Arc::clone(&self.oracle),
                    &resume,
                    &hooks,
                )?;
                summary.tried += result.snapshot.tried;

                match result.outcome {
                    Outcome::Found {
                        candidate,
                        position,
                    } => {
                        transition(&mut state, SearchState::Found);
                        if let Err(e) = binding.delete() {
                            warn!("Could not remove checkpoint: {e}");
                        }
                        if let Some(path) = &self.config.result_path {
                            match save_result(path, &target_id, &candidate) {
                                Ok(()) => info!("Result written to {}", path.display()),
                                Err(e) => error!("Failed to write {}: {e}", path.display()),
                            }
                        }
                        summary.elapsed = started.elapsed();
                        return Ok(SearchOutcome::Found {
                            candidate,
                            strategy,
                            position,
                            summary,
                        });
                    }
                    Outcome::Exhausted => {
                        transition(&mut state, SearchState::Exhausted);
                        if let Err(e) = binding.save(&result.snapshot) {
                            warn!("Could not record exhausted space: {e}");
                        }
                        info!("{label} exhausted");
                    }
                    Outcome::Interrupted => {
                        transition(&mut state, SearchState::Interrupted);
                        if let Err(e) = binding.save(&result.snapshot) {
                            warn!("Could not save checkpoint on interrupt: {e}");
                        }
                        summary.elapsed = started.elapsed();
                        return Ok(SearchOutcome::Interrupted {
                            strategy,
                            position: result.snapshot.position,
                            summary,
                        });
                    }
                }
            }
        }

        transition(&mut state, SearchState::ExhaustedAll);
        summary.elapsed = started.elapsed();
        Ok(SearchOutcome::ExhaustedAll { summary })
    }

    fn resume_record(
        &self,
        store: &CheckpointStore,
        target_id: &str,
        key: &SpaceKey,
    ) -> Option<checkpoint::CheckpointRecord> {
        if self.config.ignore_checkpoint {
            return None;
        }
        match store.load(target_id, key) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring unreadable checkpoint, starting fresh: {e}");
                None
            }
        }
    }
}

fn transition(state: &mut SearchState, next: SearchState) {
    debug!("{state:?} -> {next:?}");
    *state = next;
}
