//! Traits connecting the event loop to its external collaborators.
//!
//! The transport engine produces steps and per-event outcome flags, the
//! hit sink receives the hits of every retained event. Neither is part of
//! this workspace beyond these interfaces.

use crate::{DetectorHit, ProvenanceTable, Result, StepOutcome, StepRecord};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-event flags computed by the transport engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EventOutcome {
    /// The event was aborted, e.g. a tracked particle left the world.
    pub aborted: bool,
    /// A two-gamma signature was registered.
    pub registered_2g: bool,
    /// A three-gamma signature was registered.
    pub registered_3g: bool,
}

impl EventOutcome {
    /// Outcome of a complete event with no signature registered.
    #[must_use]
    pub fn completed() -> Self {
        Self::default()
    }

    /// Outcome of an aborted event.
    #[must_use]
    pub fn aborted() -> Self {
        Self {
            aborted: true,
            ..Self::default()
        }
    }

    /// Sets the two-gamma flag.
    #[must_use]
    pub fn with_2g(mut self, registered: bool) -> Self {
        self.registered_2g = registered;
        self
    }

    /// Sets the three-gamma flag.
    #[must_use]
    pub fn with_3g(mut self, registered: bool) -> Self {
        self.registered_3g = registered;
        self
    }
}

/// Receives steps occurring inside sensitive detector elements.
pub trait StepProcessor {
    /// Processes one step. `provenance` holds the event's primary records;
    /// the processor may mutate the record of the step's own primary track.
    fn process_step(
        &mut self,
        step: &StepRecord,
        provenance: &mut ProvenanceTable,
    ) -> Result<StepOutcome>;
}

/// A particle-transport engine simulating one event per call.
pub trait TransportEngine {
    /// Called once before the first event of a run.
    fn begin_run(&mut self, _target: u64) -> Result<()> {
        Ok(())
    }

    /// Simulates one event, delivering every sensitive step to `detector`
    /// in time order. The call is synchronous and not cancellable.
    fn simulate_event(
        &mut self,
        event_id: u64,
        detector: &mut dyn StepProcessor,
    ) -> Result<EventOutcome>;

    /// Called once after the run, for sequential runs only.
    fn end_run(&mut self, _summary: &RunSummary) -> Result<()> {
        Ok(())
    }
}

/// Destination for the hits of retained events.
pub trait HitSink {
    /// Stores the hits of one accepted event.
    fn store(&mut self, event_id: u64, hits: &[DetectorHit]) -> Result<()>;
}

/// Counters describing a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunSummary {
    /// Number of events requested.
    pub requested: u64,
    /// Number of simulated attempts, including discarded ones.
    pub attempted: u64,
    /// Number of retained events.
    pub accepted: u64,
    /// The run stopped on the abort flag before reaching `requested`.
    pub aborted_early: bool,
}

impl RunSummary {
    /// Attempts that were discarded.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.attempted.saturating_sub(self.accepted)
    }

    /// Fraction of attempts that were retained.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn acceptance_ratio(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempted as f64
        }
    }
}
