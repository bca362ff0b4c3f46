//! Event-loop control.
//!
//! Each requested event is attempted until the retention policy accepts
//! it. Rejected attempts are discarded together with their hits; only
//! accepted events reach the hit sink and advance the accepted counter.
//!
//! Cancellation is observed through an [`AbortHandle`] checked once per
//! requested event, never in the middle of an attempt.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info, trace, warn};
use rayon::prelude::*;
use scinsim_core::{Error, HitSink, Result, RunSummary, TransportEngine};

use crate::aggregator::{AggregatorConfig, HitAggregator};
use crate::policy::{RetentionConfig, RetentionPolicy};
use crate::progress::{ProgressConfig, ProgressReporter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Event-loop configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoopConfig {
    /// Retention flags.
    pub retention: RetentionConfig,
    /// Progress reporting.
    pub progress: ProgressConfig,
}

impl LoopConfig {
    /// Set the retention flags.
    #[must_use]
    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }

    /// Set the progress reporting.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressConfig) -> Self {
        self.progress = progress;
        self
    }
}

/// Attempted and accepted event counters, shared between workers.
///
/// Reads are relaxed and only meant for reporting.
#[derive(Debug, Default)]
pub struct RunCounters {
    attempted: AtomicU64,
    accepted: AtomicU64,
}

impl RunCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes both counters. Called at run start.
    pub fn reset(&self) {
        self.attempted.store(0, Ordering::Relaxed);
        self.accepted.store(0, Ordering::Relaxed);
    }

    fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Attempts so far, including discarded ones.
    pub fn attempted(&self) -> u64 {
        self.attempted.load(Ordering::Relaxed)
    }

    /// Retained events so far.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    fn summary(&self, requested: u64, aborted_early: bool) -> RunSummary {
        RunSummary {
            requested,
            attempted: self.attempted(),
            accepted: self.accepted(),
            aborted_early,
        }
    }
}

/// Run-abort flag, settable from any thread.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Creates a cleared flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the run stop before its next event.
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once an abort was requested.
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Controller state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopState {
    /// Between events.
    #[default]
    Idle,
    /// Transport engine simulating an attempt.
    Attempting,
    /// Last attempt retained.
    Accepted,
    /// Last attempt discarded, about to retry.
    Rejected,
    /// Run finished or aborted.
    Terminated,
}

/// Attempts one requested event until the policy accepts it.
///
/// Returns the number of attempts.
fn process_event<E, S>(
    event_id: u64,
    policy: RetentionPolicy,
    engine: &mut E,
    sink: &mut S,
    aggregator: &mut HitAggregator,
    counters: &RunCounters,
    state: &mut LoopState,
) -> Result<u64>
where
    E: TransportEngine + ?Sized,
    S: HitSink + ?Sized,
{
    let mut attempts = 0u64;
    loop {
        *state = LoopState::Attempting;
        aggregator.initialize();
        let outcome = engine.simulate_event(event_id, aggregator)?;
        attempts += 1;
        counters.record_attempt();

        if policy.accepts(&outcome) {
            break;
        }
        *state = LoopState::Rejected;
        trace!("event {event_id}: attempt {attempts} rejected ({outcome:?})");
        aggregator.discard();
    }

    *state = LoopState::Accepted;
    sink.store(event_id, aggregator.hits())?;
    counters.record_accept();
    aggregator.initialize();
    *state = LoopState::Idle;

    if attempts > 1 {
        debug!("event {event_id}: accepted after {attempts} attempts");
    }
    Ok(attempts)
}

/// Sequential event loop owning one hit aggregator.
pub struct EventLoop {
    policy: RetentionPolicy,
    reporter: ProgressReporter,
    aggregator: HitAggregator,
    counters: Arc<RunCounters>,
    abort: AbortHandle,
    state: LoopState,
}

impl EventLoop {
    /// Create a loop from its configuration.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the retention flags or the aggregator
    /// configuration are invalid. No event is simulated in that case.
    pub fn new(config: &LoopConfig, aggregator: AggregatorConfig) -> Result<Self> {
        let policy = config.retention.resolve()?;
        Ok(Self {
            policy,
            reporter: ProgressReporter::new(config.progress.clone()),
            aggregator: HitAggregator::new(aggregator)?,
            counters: Arc::new(RunCounters::new()),
            abort: AbortHandle::new(),
            state: LoopState::Idle,
        })
    }

    /// Resolved retention policy.
    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Current controller state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Handle to the run counters.
    pub fn counters(&self) -> Arc<RunCounters> {
        Arc::clone(&self.counters)
    }

    /// Handle to the abort flag.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// The aggregator fed by the transport engine.
    pub fn aggregator(&self) -> &HitAggregator {
        &self.aggregator
    }

    /// Runs `target` events.
    ///
    /// The engine's end-of-run hook is invoked exactly once, also when the
    /// run stops on the abort flag.
    ///
    /// # Errors
    /// Propagates engine and sink errors unchanged; the run stops at the
    /// first one and the end-of-run hook is skipped.
    pub fn run<E, S>(&mut self, engine: &mut E, sink: &mut S, target: u64) -> Result<RunSummary>
    where
        E: TransportEngine + ?Sized,
        S: HitSink + ?Sized,
    {
        self.counters.reset();
        self.state = LoopState::Idle;
        engine.begin_run(target)?;
        info!("starting run: {target} events, {} retention", self.policy);

        let result = self.run_events(engine, sink, target);
        // an abort only ends the run that observed it
        self.abort.clear();
        self.state = LoopState::Terminated;
        let aborted_early = result?;
        let summary = self.counters.summary(target, aborted_early);
        engine.end_run(&summary)?;
        info!(
            "run finished: {} accepted, {} attempted",
            summary.accepted, summary.attempted
        );
        Ok(summary)
    }

    /// Processes events until `target` or the abort flag. Returns true if
    /// the flag stopped the run.
    fn run_events<E, S>(&mut self, engine: &mut E, sink: &mut S, target: u64) -> Result<bool>
    where
        E: TransportEngine + ?Sized,
        S: HitSink + ?Sized,
    {
        for event_id in 0..target {
            if self.abort.is_aborted() {
                warn!("run aborted, skipping {} events", target - event_id);
                return Ok(true);
            }
            self.reporter.report(event_id, target);
            process_event(
                event_id,
                self.policy,
                engine,
                sink,
                &mut self.aggregator,
                &self.counters,
                &mut self.state,
            )?;
        }
        Ok(false)
    }
}

/// Result of a multi-worker run.
#[derive(Debug)]
pub struct ParallelOutcome<S> {
    /// Aggregate counters.
    pub summary: RunSummary,
    /// Per-worker sinks, in worker order.
    pub sinks: Vec<S>,
}

/// Event loop spread over rayon workers.
///
/// Every worker owns its transport engine, hit sink and hit aggregator.
/// Workers claim event indices from a shared cursor; the counters and the
/// abort flag are the only other shared state.
pub struct ParallelEventLoop {
    policy: RetentionPolicy,
    reporter: ProgressReporter,
    aggregator_config: AggregatorConfig,
    workers: usize,
    counters: Arc<RunCounters>,
    abort: AbortHandle,
}

impl ParallelEventLoop {
    /// Create a multi-worker loop.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for invalid retention flags, an invalid
    /// aggregator configuration, or zero workers.
    pub fn new(config: &LoopConfig, aggregator: AggregatorConfig, workers: usize) -> Result<Self> {
        let policy = config.retention.resolve()?;
        aggregator.validate()?;
        if workers == 0 {
            return Err(Error::Config("at least one worker is required".into()));
        }
        Ok(Self {
            policy,
            reporter: ProgressReporter::new(config.progress.clone()),
            aggregator_config: aggregator,
            workers,
            counters: Arc::new(RunCounters::new()),
            abort: AbortHandle::new(),
        })
    }

    /// Resolved retention policy.
    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Handle to the run counters.
    pub fn counters(&self) -> Arc<RunCounters> {
        Arc::clone(&self.counters)
    }

    /// Handle to the abort flag.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Runs `target` events across the workers.
    ///
    /// `factory` builds the engine and sink of one worker. `finish` is the
    /// end-of-run finalization: it runs exactly once, after every worker
    /// has joined.
    ///
    /// # Errors
    /// The first worker error stops the other workers before their next
    /// event and is returned after the join; `finish` is skipped.
    pub fn run<E, S, F, G>(&self, target: u64, factory: F, finish: G) -> Result<ParallelOutcome<S>>
    where
        E: TransportEngine,
        S: HitSink + Send,
        F: Fn(usize) -> Result<(E, S)> + Sync,
        G: FnOnce(&RunSummary) -> Result<()>,
    {
        self.counters.reset();
        info!(
            "starting run: {target} events on {} workers, {} retention",
            self.workers, self.policy
        );

        let cursor = AtomicU64::new(0);
        let failed = AtomicBool::new(false);

        let run_worker = |worker: usize| -> Result<S> {
            let (mut engine, mut sink) = factory(worker)?;
            let mut aggregator = HitAggregator::new(self.aggregator_config.clone())?;
            let mut state = LoopState::Idle;
            let mut processed = 0u64;
            engine.begin_run(target)?;

            while !self.abort.is_aborted() && !failed.load(Ordering::Relaxed) {
                let event_id = cursor.fetch_add(1, Ordering::Relaxed);
                if event_id >= target {
                    break;
                }
                self.reporter.report(event_id, target);
                process_event(
                    event_id,
                    self.policy,
                    &mut engine,
                    &mut sink,
                    &mut aggregator,
                    &self.counters,
                    &mut state,
                )?;
                processed += 1;
            }

            debug!("worker {worker} done after {processed} events");
            Ok(sink)
        };

        let sinks = (0..self.workers)
            .into_par_iter()
            .map(|worker| {
                let result = run_worker(worker);
                if result.is_err() {
                    failed.store(true, Ordering::Relaxed);
                }
                result
            })
            .collect::<Result<Vec<S>>>();

        let aborted_early = self.abort.is_aborted() && self.counters.accepted() < target;
        // an abort only ends the run that observed it
        self.abort.clear();
        let sinks = sinks?;
        let summary = self.counters.summary(target, aborted_early);
        finish(&summary)?;
        info!(
            "run finished: {} accepted, {} attempted",
            summary.accepted, summary.attempted
        );
        Ok(ParallelOutcome { summary, sinks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scinsim_core::{DetectorHit, EventOutcome, StepProcessor};

    struct AlwaysAborted;

    impl TransportEngine for AlwaysAborted {
        fn simulate_event(
            &mut self,
            _event_id: u64,
            _detector: &mut dyn StepProcessor,
        ) -> Result<EventOutcome> {
            Ok(EventOutcome::aborted())
        }
    }

    struct CountingSink(usize);

    impl HitSink for CountingSink {
        fn store(&mut self, _event_id: u64, _hits: &[DetectorHit]) -> Result<()> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn test_unconditional_keeps_aborted_events() {
        let mut event_loop = EventLoop::new(&LoopConfig::default(), AggregatorConfig::default())
            .unwrap();
        let mut sink = CountingSink(0);
        let summary = event_loop.run(&mut AlwaysAborted, &mut sink, 4).unwrap();

        assert_eq!(summary.accepted, 4);
        assert_eq!(summary.attempted, 4);
        assert_eq!(sink.0, 4);
        assert_eq!(event_loop.state(), LoopState::Terminated);
    }

    #[test]
    fn test_abort_before_start_skips_everything() {
        let mut event_loop = EventLoop::new(&LoopConfig::default(), AggregatorConfig::default())
            .unwrap();
        event_loop.abort_handle().abort();
        let mut sink = CountingSink(0);
        let summary = event_loop.run(&mut AlwaysAborted, &mut sink, 10).unwrap();

        assert!(summary.aborted_early);
        assert_eq!(summary.accepted, 0);
        assert_eq!(sink.0, 0);
    }

    #[test]
    fn test_abort_applies_to_one_run_only() {
        let mut event_loop = EventLoop::new(&LoopConfig::default(), AggregatorConfig::default())
            .unwrap();
        event_loop.abort_handle().abort();
        let mut sink = CountingSink(0);

        let first = event_loop.run(&mut AlwaysAborted, &mut sink, 3).unwrap();
        assert!(first.aborted_early);
        assert_eq!(first.accepted, 0);

        let second = event_loop.run(&mut AlwaysAborted, &mut sink, 3).unwrap();
        assert!(!second.aborted_early);
        assert_eq!(second.accepted, 3);
        assert_eq!(sink.0, 3);
        assert!(!event_loop.abort_handle().is_aborted());
    }

    /// Raises the abort flag and then fails the attempt.
    struct AbortThenFail(AbortHandle);

    impl TransportEngine for AbortThenFail {
        fn simulate_event(
            &mut self,
            event_id: u64,
            _detector: &mut dyn StepProcessor,
        ) -> Result<EventOutcome> {
            self.0.abort();
            Err(Error::Engine(format!("lost track in event {event_id}")))
        }
    }

    #[test]
    fn test_failed_run_clears_abort() {
        let mut event_loop = EventLoop::new(&LoopConfig::default(), AggregatorConfig::default())
            .unwrap();
        let mut engine = AbortThenFail(event_loop.abort_handle());
        let mut sink = CountingSink(0);

        let result = event_loop.run(&mut engine, &mut sink, 2);
        assert!(matches!(result, Err(Error::Engine(_))));
        assert!(!event_loop.abort_handle().is_aborted());

        let summary = event_loop.run(&mut AlwaysAborted, &mut sink, 2).unwrap();
        assert_eq!(summary.accepted, 2);
    }

    #[test]
    fn test_abort_handle_roundtrip() {
        let handle = AbortHandle::new();
        let shared = handle.clone();
        assert!(!handle.is_aborted());
        shared.abort();
        assert!(handle.is_aborted());
        handle.clear();
        assert!(!shared.is_aborted());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = ParallelEventLoop::new(&LoopConfig::default(), AggregatorConfig::default(), 0);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
