//! Bounded-parallel exhaustion of one candidate space.
//!
//! A single control thread owns the dispatch cursor. It carves the space into
//! contiguous batches, spawns one worker thread per batch (at most
//! `worker_count` alive) and polls two channels: exact progress deltas and
//! per-batch results. Completed batches go into a [`Ledger`]; its watermark is
//! the lowest position not yet confirmed tried, which is what checkpoints
//! record. Batches finish out of order, so the ranges completed above the
//! watermark are recorded too and skipped on resume.
//!
//! A worker that dies without reporting a result has its untried remainder
//! re-queued ahead of fresh work. On a match or an external cancel every
//! worker is signalled and joined within a grace period; stragglers are
//! detached.
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info, warn};

use crate::checkpoint::CheckpointBinding;
use crate::error::{CrackError, Result};
use crate::oracle::{Oracle, Verdict};
use crate::progress::{ProgressObserver, ProgressSnapshot, Silent};
use crate::space::CandidateSpace;

const SMALL_SPACE: u64 = 100_000;
const SMALL_BATCH: u64 = 1_000;
const LARGE_BATCH: u64 = 10_000;
const PROGRESS_EVERY: u64 = 100;
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
const OBSERVER_INTERVAL: Duration = Duration::from_millis(100);

/// Shared interrupt flag; tripped by the Ctrl-C handler in the binary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct DistributorConfig {
    pub worker_count: usize,
    /// Overrides the size-based default batch size.
    pub batch_size: Option<u64>,
    pub checkpoint_interval: Duration,
    pub grace_period: Duration,
    pub poll_interval: Duration,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            batch_size: None,
            checkpoint_interval: Duration::from_secs(5),
            grace_period: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Where to pick up a space: everything below `position` and every range in
/// `completed` is already tried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumePoint {
    pub position: u64,
    pub completed: Vec<(u64, u64)>,
}

/// Consistent view of dispatch progress for this run.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSnapshot {
    pub position: u64,
    pub completed: Vec<(u64, u64)>,
    /// Candidates tried by this run.
    pub tried: u64,
    pub elapsed: Duration,
}

impl DispatchSnapshot {
    pub fn resume_point(&self) -> ResumePoint {
        ResumePoint {
            position: self.position,
            completed: self.completed.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Found { candidate: String, position: u64 },
    Exhausted,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub outcome: Outcome,
    pub snapshot: DispatchSnapshot,
}

/// Optional collaborators of a run.
pub struct Hooks<'a> {
    pub label: &'a str,
    pub checkpoint: Option<&'a CheckpointBinding<'a>>,
    pub observer: &'a dyn ProgressObserver,
}

impl Default for Hooks<'_> {
    fn default() -> Self {
        Self {
            label: "",
            checkpoint: None,
            observer: &Silent,
        }
    }
}

/// Batch size for a space of `total` with `remaining` untried candidates.
pub fn batch_size(total: u64, remaining: u64, workers: usize, requested: Option<u64>) -> u64 {
    let base = requested.filter(|&b| b > 0).unwrap_or(if total < SMALL_SPACE {
        SMALL_BATCH
    } else {
        LARGE_BATCH
    });
    let workers = workers.max(1) as u64;
    let size = if remaining < workers.saturating_mul(base) {
        remaining.div_ceil(workers)
    } else {
        base
    };
    size.max(1)
}

/// Completed position ranges, collapsed into a watermark where contiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    watermark: u64,
    done: BTreeMap<u64, u64>,
}

impl Ledger {
    pub fn new(watermark: u64) -> Self {
        Self {
            watermark,
            done: BTreeMap::new(),
        }
    }

    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    pub fn mark(&mut self, start: u64, end: u64) {
        if end <= start || end <= self.watermark {
            return;
        }
        let (mut start, mut end) = (start, end);
        if let Some((&s, &e)) = self.done.range(..=start).next_back() {
            if e >= start {
                start = s;
                end = end.max(e);
                self.done.remove(&s);
            }
        }
        while let Some((&s, &e)) = self.done.range(start..).next() {
            if s > end {
                break;
            }
            end = end.max(e);
            self.done.remove(&s);
        }
        if start <= self.watermark {
            self.watermark = end;
        } else {
            self.done.insert(start, end);
        }
        while let Some((&s, &e)) = self.done.iter().next() {
            if s > self.watermark {
                break;
            }
            self.watermark = self.watermark.max(e);
            self.done.remove(&s);
        }
    }

    /// End of the completed range containing `pos`, if any.
    fn covering(&self, pos: u64) -> Option<u64> {
        if pos < self.watermark {
            return Some(self.watermark);
        }
        self.done
            .range(..=pos)
            .next_back()
            .filter(|&(_, &e)| e > pos)
            .map(|(_, &e)| e)
    }

    fn next_start_after(&self, pos: u64) -> Option<u64> {
        self.done.range(pos + 1..).next().map(|(&s, _)| s)
    }

    pub fn completed(&self) -> Vec<(u64, u64)> {
        self.done.iter().map(|(&s, &e)| (s, e)).collect()
    }

    /// Number of positions known tried.
    pub fn covered(&self) -> u64 {
        self.watermark + self.done.iter().map(|(s, e)| e - s).sum::<u64>()
    }
}

struct ProgressMsg {
    batch_id: u64,
    delta: u64,
}

enum BatchOutcome {
    Exhausted,
    Found { candidate: String, offset: u64 },
    Cancelled { tried: u64 },
}

struct ResultMsg {
    batch_id: u64,
    outcome: BatchOutcome,
}

struct Worker {
    batch_id: u64,
    candidates: Vec<String>,
    target: Arc<PathBuf>,
    oracle: Arc<dyn Oracle>,
    stop: Arc<AtomicBool>,
    cancel: CancelToken,
    progress: Sender<ProgressMsg>,
    results: Sender<ResultMsg>,
}

impl Worker {
    fn run(self) {
        let mut pending = 0u64;
        let mut last = Instant::now();
        for (i, candidate) in self.candidates.iter().enumerate() {
            if self.halted() {
                self.flush(pending);
                self.finish(BatchOutcome::Cancelled { tried: i as u64 });
                return;
            }
            let verdict = self.oracle.check(&self.target, candidate);
            // A check that returns after a stop may have been cut short, so
            // the candidate is left for the next run.
            if self.halted() {
                self.flush(pending);
                self.finish(BatchOutcome::Cancelled { tried: i as u64 });
                return;
            }
            match verdict {
                Verdict::Match => {
                    self.flush(pending + 1);
                    self.finish(BatchOutcome::Found {
                        candidate: candidate.clone(),
                        offset: i as u64,
                    });
                    return;
                }
                Verdict::NoMatch => {}
                Verdict::Error(reason) => {
                    warn!("Oracle error on candidate {candidate:?}: {reason}");
                }
            }
            pending += 1;
            if pending >= PROGRESS_EVERY || last.elapsed() >= PROGRESS_INTERVAL {
                self.flush(pending);
                pending = 0;
                last = Instant::now();
            }
        }
        self.flush(pending);
        self.finish(BatchOutcome::Exhausted);
    }

    fn halted(&self) -> bool {
        self.stop.load(Ordering::SeqCst) || self.cancel.is_cancelled()
    }

    fn flush(&self, delta: u64) {
        if delta > 0 {
            let _ = self.progress.send(ProgressMsg {
                batch_id: self.batch_id,
                delta,
            });
        }
    }

    fn finish(&self, outcome: BatchOutcome) {
        let _ = self.results.send(ResultMsg {
            batch_id: self.batch_id,
            outcome,
        });
    }
}

struct InFlight {
    start: u64,
    end: u64,
    tried: u64,
    handle: JoinHandle<()>,
}

pub struct WorkDistributor {
    config: DistributorConfig,
    cancel: CancelToken,
}

impl WorkDistributor {
    pub fn new(config: DistributorConfig, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &DistributorConfig {
        &self.config
    }

    /// Exhaust `space` from `resume` until a match, the end, or a cancel.
    pub fn run(
        &self,
        space: &dyn CandidateSpace,
        target: &Path,
        oracle: Arc<dyn Oracle>,
        resume: &ResumePoint,
        hooks: &Hooks<'_>,
    ) -> Result<RunResult> {
        let total = space.total_count();
        if resume.position > total {
            return Err(CrackError::Range {
                position: resume.position,
                total,
            });
        }
        let mut ledger = Ledger::new(resume.position);
        for &(s, e) in &resume.completed {
            ledger.mark(s.min(total), e.min(total));
        }
        let workers = self.config.worker_count.max(1);
        let done = ledger.covered();
        let size = batch_size(total, total - done, workers, self.config.batch_size);
        debug!(
            "Dispatching {} of {total} candidates from position {} with {workers} workers, batch size {size}",
            total - done,
            ledger.watermark()
        );

        let (progress_tx, progress_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        let mut run = Run {
            space,
            total,
            size,
            workers,
            cursor: ledger.watermark(),
            ledger,
            retry: VecDeque::new(),
            inflight: HashMap::new(),
            next_id: 0,
            tried: 0,
            initial_done: done,
            started: Instant::now(),
            stop: Arc::new(AtomicBool::new(false)),
            target: Arc::new(target.to_path_buf()),
            oracle,
            progress_tx,
            progress_rx,
            result_tx,
            result_rx,
            config: &self.config,
            cancel: &self.cancel,
            hooks,
        };
        hooks.observer.on_start(hooks.label, total, done);
        let result = run.drive();
        if result.is_err() {
            run.shutdown();
        }
        hooks.observer.on_finish(&run.progress());
        result
    }
}

struct Run<'a> {
    space: &'a dyn CandidateSpace,
    total: u64,
    size: u64,
    workers: usize,
    cursor: u64,
    ledger: Ledger,
    retry: VecDeque<(u64, u64)>,
    inflight: HashMap<u64, InFlight>,
    next_id: u64,
    tried: u64,
    initial_done: u64,
    started: Instant,
    stop: Arc<AtomicBool>,
    target: Arc<PathBuf>,
    oracle: Arc<dyn Oracle>,
    progress_tx: Sender<ProgressMsg>,
    progress_rx: Receiver<ProgressMsg>,
    result_tx: Sender<ResultMsg>,
    result_rx: Receiver<ResultMsg>,
    config: &'a DistributorConfig,
    cancel: &'a CancelToken,
    hooks: &'a Hooks<'a>,
}

impl Run<'_> {
    fn drive(&mut self) -> Result<RunResult> {
        let mut last_save = Instant::now();
        let mut last_report = Instant::now();
        loop {
            if self.cancel.is_cancelled() {
                self.drain_progress();
                let snapshot = self.snapshot();
                self.shutdown();
                info!(
                    "Interrupted at position {} ({} tried this run)",
                    snapshot.position, snapshot.tried
                );
                return Ok(RunResult {
                    outcome: Outcome::Interrupted,
                    snapshot,
                });
            }

            while self.inflight.len() < self.workers {
                let Some((start, end)) = self.next_batch() else {
                    break;
                };
                self.spawn(start, end)?;
            }
            if self.inflight.is_empty() {
                let mut snapshot = self.snapshot();
                debug_assert_eq!(snapshot.position, self.total);
                snapshot.position = self.total;
                snapshot.completed.clear();
                return Ok(RunResult {
                    outcome: Outcome::Exhausted,
                    snapshot,
                });
            }

            // Threads seen finished now have every message they sent queued.
            let finished: Vec<u64> = self
                .inflight
                .iter()
                .filter(|(_, b)| b.handle.is_finished())
                .map(|(&id, _)| id)
                .collect();
            self.drain_progress();
            if let Some(found) = self.drain_results() {
                return Ok(found);
            }
            for id in finished {
                self.requeue_crashed(id);
            }

            if let Some(binding) = self.hooks.checkpoint {
                if last_save.elapsed() >= self.config.checkpoint_interval {
                    if let Err(e) = binding.save(&self.snapshot()) {
                        warn!("Checkpoint save failed, retrying next interval: {e}");
                    }
                    last_save = Instant::now();
                }
            }
            if last_report.elapsed() >= OBSERVER_INTERVAL {
                self.hooks.observer.on_progress(&self.progress());
                last_report = Instant::now();
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    fn next_batch(&mut self) -> Option<(u64, u64)> {
        if let Some((s, e)) = self.retry.pop_front() {
            let end = e.min(s.saturating_add(self.size));
            if end < e {
                self.retry.push_front((end, e));
            }
            return Some((s, end));
        }
        while self.cursor < self.total {
            match self.ledger.covering(self.cursor) {
                Some(end) => self.cursor = end,
                None => break,
            }
        }
        if self.cursor >= self.total {
            return None;
        }
        let start = self.cursor;
        let mut end = start.saturating_add(self.size).min(self.total);
        if let Some(next) = self.ledger.next_start_after(start) {
            end = end.min(next);
        }
        self.cursor = end;
        Some((start, end))
    }

    fn spawn(&mut self, start: u64, end: u64) -> Result<()> {
        let candidates = self.space.generate_batch(start, end - start)?;
        let batch_id = self.next_id;
        self.next_id += 1;
        let worker = Worker {
            batch_id,
            candidates,
            target: Arc::clone(&self.target),
            oracle: Arc::clone(&self.oracle),
            stop: Arc::clone(&self.stop),
            cancel: self.cancel.clone(),
            progress: self.progress_tx.clone(),
            results: self.result_tx.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("doccrack-worker-{batch_id}"))
            .spawn(move || worker.run())?;
        debug!("Batch {batch_id}: [{start}, {end})");
        self.inflight.insert(
            batch_id,
            InFlight {
                start,
                end,
                tried: 0,
                handle,
            },
        );
        Ok(())
    }

    fn drain_progress(&mut self) {
        for msg in self.progress_rx.try_iter() {
            self.tried += msg.delta;
            if let Some(b) = self.inflight.get_mut(&msg.batch_id) {
                b.tried += msg.delta;
            }
        }
    }

    fn drain_results(&mut self) -> Option<RunResult> {
        let results: Vec<ResultMsg> = self.result_rx.try_iter().collect();
        for msg in results {
            let Some(batch) = self.inflight.remove(&msg.batch_id) else {
                continue;
            };
            let _ = batch.handle.join();
            match msg.outcome {
                BatchOutcome::Exhausted => self.ledger.mark(batch.start, batch.end),
                BatchOutcome::Cancelled { tried } => {
                    let cut = batch.start + tried;
                    self.ledger.mark(batch.start, cut);
                    if cut < batch.end {
                        self.retry.push_front((cut, batch.end));
                    }
                }
                BatchOutcome::Found { candidate, offset } => {
                    self.stop.store(true, Ordering::SeqCst);
                    let position = batch.start + offset;
                    self.ledger.mark(batch.start, position);
                    self.drain_progress();
                    let snapshot = self.snapshot();
                    self.shutdown();
                    info!("Match at position {position}");
                    return Some(RunResult {
                        outcome: Outcome::Found {
                            candidate,
                            position,
                        },
                        snapshot,
                    });
                }
            }
        }
        None
    }

    fn requeue_crashed(&mut self, id: u64) {
        let Some(batch) = self.inflight.remove(&id) else {
            return;
        };
        let reason = match batch.handle.join() {
            Err(panic) => panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string()),
            Ok(()) => "exited without a result".to_string(),
        };
        let cut = (batch.start + batch.tried).min(batch.end);
        warn!(
            "Worker for [{}, {}) died ({reason}); re-queueing [{cut}, {})",
            batch.start, batch.end, batch.end
        );
        self.ledger.mark(batch.start, cut);
        if cut < batch.end {
            self.retry.push_back((cut, batch.end));
        }
    }

    /// Ledger plus the tried prefixes of in-flight batches.
    fn snapshot(&self) -> DispatchSnapshot {
        let mut ledger = self.ledger.clone();
        for b in self.inflight.values() {
            ledger.mark(b.start, b.start + b.tried);
        }
        DispatchSnapshot {
            position: ledger.watermark(),
            completed: ledger.completed(),
            tried: self.tried,
            elapsed: self.started.elapsed(),
        }
    }

    fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            done: (self.initial_done + self.tried).min(self.total),
            total: self.total,
            tried: self.tried,
            elapsed: self.started.elapsed(),
        }
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + self.config.grace_period;
        let mut detached = 0usize;
        for (_, batch) in self.inflight.drain() {
            while !batch.handle.is_finished() && Instant::now() < deadline {
                thread::sleep(self.config.poll_interval);
            }
            if batch.handle.is_finished() {
                let _ = batch.handle.join();
            } else {
                detached += 1;
            }
        }
        if detached > 0 {
            warn!(
                "{detached} worker(s) still busy after {:?}; detached",
                self.config.grace_period
            );
        }
    }
}
