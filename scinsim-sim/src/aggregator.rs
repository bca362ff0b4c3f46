//! Per-scintillator hit aggregation.
//!
//! Key characteristics:
//! - One open-hit slot per detector element, reset at every event boundary
//! - A step merges into the open hit when its entry time lies within the
//!   merge window of the step that *opened* the hit (the window never slides)
//! - O(1) work per step; element table and hit buffer are reused across events
//! - Primary provenance is copied into the opening hit and then marked as
//!   scattered; a deposit-free momentum gain on a primary clears it again

use log::trace;
use scinsim_core::{
    DetectorHit, Error, ProvenanceTable, Result, StepOutcome, StepProcessor, StepRecord,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Aggregator configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AggregatorConfig {
    /// Number of scintillators. Valid element ids are `0..=element_count`.
    pub element_count: usize,
    /// Maximum distance (ns) between a step and the opening step of a hit.
    pub time_merge_window_ns: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            element_count: 192,
            time_merge_window_ns: 5.0,
        }
    }
}

impl AggregatorConfig {
    /// Sets the number of scintillators.
    #[must_use]
    pub fn with_element_count(mut self, count: usize) -> Self {
        self.element_count = count;
        self
    }

    /// Sets the merge window.
    #[must_use]
    pub fn with_time_merge_window(mut self, window_ns: f64) -> Self {
        self.time_merge_window_ns = window_ns;
        self
    }

    /// Checks that the element count and merge window are positive and that
    /// the element table size `element_count + 1` is representable.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the offending value.
    pub fn validate(&self) -> Result<()> {
        if self.element_count == 0 {
            return Err(Error::Config("element count must be positive".into()));
        }
        if self.element_count.checked_add(1).is_none() {
            return Err(Error::Config(format!(
                "element count {} leaves no room for the trailing slot",
                self.element_count
            )));
        }
        if !self.time_merge_window_ns.is_finite() || self.time_merge_window_ns <= 0.0 {
            return Err(Error::Config(format!(
                "time merge window must be a positive duration, got {} ns",
                self.time_merge_window_ns
            )));
        }
        Ok(())
    }
}

/// Open-hit bookkeeping for one detector element.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ElementState {
    /// Index of the open hit in the event's collection, `None` if no hit
    /// is open.
    pub last_hit: Option<usize>,
    /// Entry time of the step that opened that hit.
    pub last_hit_time: f64,
}

/// Cumulative aggregation counters. Not reset between events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregatorStatistics {
    /// Steps delivered, including zero-deposit ones.
    pub steps_processed: usize,
    /// Steps with no energy deposit.
    pub zero_deposit_steps: usize,
    /// Hits opened.
    pub hits_created: usize,
    /// Steps merged into an open hit.
    pub steps_merged: usize,
    /// Primary multiplicities cleared by deposit-free momentum gains.
    pub provenance_resets: usize,
}

/// Clusters steps into scintillator hits, one event at a time.
pub struct HitAggregator {
    config: AggregatorConfig,
    elements: Vec<ElementState>,
    hits: Vec<DetectorHit>,
    stats: AggregatorStatistics,
}

impl HitAggregator {
    /// Create with custom configuration.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the configuration does not validate.
    pub fn new(config: AggregatorConfig) -> Result<Self> {
        config.validate()?;
        let elements = vec![ElementState::default(); config.element_count + 1];
        Ok(Self {
            config,
            elements,
            hits: Vec::new(),
            stats: AggregatorStatistics::default(),
        })
    }

    /// Get current configuration.
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Starts a new event: closes every open hit and clears the collection.
    ///
    /// Calling it twice in a row is harmless.
    pub fn initialize(&mut self) {
        self.elements.fill(ElementState::default());
        self.hits.clear();
    }

    /// Drops the hits of a rejected event.
    pub fn discard(&mut self) {
        trace!("discarding {} hits", self.hits.len());
        self.initialize();
    }

    /// Hits of the current event, in creation order.
    pub fn hits(&self) -> &[DetectorHit] {
        &self.hits
    }

    /// Number of hits in the current event.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if the current event has no hits.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Open-hit state of one element.
    pub fn element_state(&self, element_id: usize) -> Option<&ElementState> {
        self.elements.get(element_id)
    }

    /// Cumulative counters.
    pub fn statistics(&self) -> AggregatorStatistics {
        self.stats
    }

    /// A deposit-free step that gains momentum (Rayleigh-like) clears the
    /// primary's multiplicity, even if it was already marked as scattered.
    fn handle_zero_deposit(&mut self, step: &StepRecord, provenance: &mut ProvenanceTable) {
        self.stats.zero_deposit_steps += 1;
        if step.momentum_gain() <= 0.0 || !step.is_primary() {
            return;
        }
        if let Some(record) = provenance.get_mut(step.track_id) {
            trace!(
                "track {} gained momentum without deposit, clearing multiplicity {}",
                step.track_id,
                record.multiplicity
            );
            record.reset_multiplicity();
            self.stats.provenance_resets += 1;
        }
    }
}

impl StepProcessor for HitAggregator {
    #[allow(clippy::float_cmp)]
    fn process_step(
        &mut self,
        step: &StepRecord,
        provenance: &mut ProvenanceTable,
    ) -> Result<StepOutcome> {
        let edep = step.energy_deposit;
        if !edep.is_finite() || edep < 0.0 {
            return Err(Error::InvalidDeposit(edep));
        }
        self.stats.steps_processed += 1;

        if edep == 0.0 {
            self.handle_zero_deposit(step, provenance);
            return Ok(StepOutcome::Ignored);
        }

        let element_id = step.element_id;
        let max = self.config.element_count;
        let state = self
            .elements
            .get_mut(element_id)
            .ok_or(Error::ElementOutOfRange {
                element: element_id,
                max,
            })?;
        let time = step.time();

        if let Some(idx) = state.last_hit {
            if (state.last_hit_time - time).abs() < self.config.time_merge_window_ns {
                self.hits[idx].merge(time, &step.post.position, edep);
                self.stats.steps_merged += 1;
                return Ok(StepOutcome::Merged(idx));
            }
        }

        let hit = if step.is_primary() {
            match provenance.get_mut(step.track_id) {
                Some(record) => {
                    let hit = DetectorHit::from_step(step, Some(&*record));
                    record.mark_scattered();
                    hit
                }
                None => DetectorHit::from_step(step, None),
            }
        } else {
            DetectorHit::from_step(step, None)
        };

        let idx = self.hits.len();
        self.hits.push(hit);
        *state = ElementState {
            last_hit: Some(idx),
            last_hit_time: time,
        };
        self.stats.hits_created += 1;
        Ok(StepOutcome::Created(idx))
    }
}
