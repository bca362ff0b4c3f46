//! Step records delivered by the transport engine.
//!
//! A step is one simulated particle's traversal of a short path segment
//! inside a sensitive scintillator. The engine has already computed every
//! physical quantity; the aggregator only reads them.

use crate::ThreeVector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kinematic snapshot at one end of a step.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StepPoint {
    /// Global time (ns).
    pub time: f64,
    /// Position (mm).
    pub position: ThreeVector,
    /// Momentum (MeV/c).
    pub momentum: ThreeVector,
    /// Polarization vector.
    pub polarization: ThreeVector,
    /// Process that limited the step (meaningful on the post-step point).
    pub process_name: Option<String>,
}

impl StepPoint {
    /// Creates a step point at the given time and position.
    #[must_use]
    pub fn new(time: f64, position: ThreeVector) -> Self {
        Self {
            time,
            position,
            ..Self::default()
        }
    }

    /// Sets the momentum.
    #[must_use]
    pub fn with_momentum(mut self, momentum: ThreeVector) -> Self {
        self.momentum = momentum;
        self
    }

    /// Sets the polarization.
    #[must_use]
    pub fn with_polarization(mut self, polarization: ThreeVector) -> Self {
        self.polarization = polarization;
        self
    }

    /// Sets the limiting process name.
    #[must_use]
    pub fn with_process(mut self, name: impl Into<String>) -> Self {
        self.process_name = Some(name.into());
        self
    }
}

/// One energy-deposit step inside a detector element.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepRecord {
    /// Total energy deposited along the step (keV, non-negative).
    pub energy_deposit: f64,
    /// Scintillator copy number.
    pub element_id: usize,
    /// Entry point.
    pub pre: StepPoint,
    /// Exit point.
    pub post: StepPoint,
    /// Track identifier.
    pub track_id: i32,
    /// Particle-type code (PDG encoding).
    pub pdg_code: i32,
    /// Parent track identifier, 0 for primaries.
    pub parent_id: i32,
}

impl StepRecord {
    /// Returns true if the track was produced by the event generator.
    #[inline]
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.parent_id == 0
    }

    /// Time used for merge decisions: the global time at step entry.
    #[inline]
    #[must_use]
    pub fn time(&self) -> f64 {
        self.pre.time
    }

    /// Change in squared momentum magnitude across the step.
    #[inline]
    #[must_use]
    pub fn momentum_gain(&self) -> f64 {
        self.post.momentum.mag2() - self.pre.momentum.mag2()
    }
}

/// Result of feeding one step to a step processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Zero-deposit step, no hit touched.
    Ignored,
    /// A new hit was opened at this collection index.
    Created(usize),
    /// The step was merged into the open hit at this collection index.
    Merged(usize),
}

impl StepOutcome {
    /// Whether the step affected a hit. Transport engines use this as the
    /// sensitive-detector return value.
    #[inline]
    #[must_use]
    pub fn is_significant(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}
