//! Scintillator hit records.

use crate::{ProvenanceRecord, StepRecord, ThreeVector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One reconstructed interaction in a scintillator, built from one or
/// more steps that fall inside the merge window.
///
/// Energy, interaction count, time and position accumulate as steps are
/// merged. Everything else is fixed by the step that opened the hit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorHit {
    /// Sum of merged energy deposits.
    pub energy_deposit: f64,
    /// Number of merged steps.
    pub interactions: u32,
    /// Energy-weighted mean time (ns).
    pub time: f64,
    /// Energy-weighted mean position (mm).
    pub position: ThreeVector,
    /// Momentum at entry of the opening step.
    pub momentum_in: ThreeVector,
    /// Momentum at exit of the opening step.
    pub momentum_out: ThreeVector,
    /// Polarization at entry of the opening step.
    pub polarization_in: ThreeVector,
    /// Polarization at exit of the opening step.
    pub polarization_out: ThreeVector,
    /// Track that opened the hit.
    pub track_id: i32,
    /// PDG code of that track.
    pub pdg_code: i32,
    /// Process that limited the opening step.
    pub process_name: Option<String>,
    /// Scintillator copy number.
    pub element_id: usize,
    /// Generator multiplicity, for hits opened by a primary.
    pub gen_multiplicity: Option<i32>,
    /// Generator gamma index, for hits opened by a primary.
    pub gen_index: Option<i32>,
}

impl DetectorHit {
    /// Opens a hit from a step. Provenance is copied as seen before the
    /// caller marks the primary as scattered.
    #[must_use]
    pub fn from_step(step: &StepRecord, provenance: Option<&ProvenanceRecord>) -> Self {
        Self {
            energy_deposit: step.energy_deposit,
            interactions: 1,
            time: step.time(),
            position: step.post.position,
            momentum_in: step.pre.momentum,
            momentum_out: step.post.momentum,
            polarization_in: step.pre.polarization,
            polarization_out: step.post.polarization,
            track_id: step.track_id,
            pdg_code: step.pdg_code,
            process_name: step.post.process_name.clone(),
            element_id: step.element_id,
            gen_multiplicity: provenance.map(|p| p.multiplicity),
            gen_index: provenance.map(|p| p.index),
        }
    }

    /// Folds another deposit into the hit.
    ///
    /// `edep` must be positive; time and position become energy-weighted
    /// running averages.
    pub fn merge(&mut self, time: f64, position: &ThreeVector, edep: f64) {
        let previous = self.energy_deposit;
        let total = previous + edep;
        self.time = (self.time * previous + time * edep) / total;
        self.position = self.position.weighted_mean(previous, position, edep);
        self.energy_deposit = total;
        self.interactions += 1;
    }

    /// Returns true if the hit was opened by a generator-level primary.
    #[must_use]
    pub fn is_from_primary(&self) -> bool {
        self.gen_multiplicity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StepPoint;
    use approx::assert_relative_eq;

    fn step(time: f64, x: f64, edep: f64) -> StepRecord {
        StepRecord {
            energy_deposit: edep,
            element_id: 7,
            pre: StepPoint::new(time, ThreeVector::ZERO)
                .with_momentum(ThreeVector::new(0.0, 0.0, 0.511)),
            post: StepPoint::new(time + 0.01, ThreeVector::new(x, 0.0, 0.0))
                .with_momentum(ThreeVector::new(0.0, 0.1, 0.3))
                .with_process("compt"),
            track_id: 2,
            pdg_code: 22,
            parent_id: 0,
        }
    }

    #[test]
    fn test_from_step() {
        let record = ProvenanceRecord::new(2, 1);
        let hit = DetectorHit::from_step(&step(4.0, 10.0, 0.2), Some(&record));
        assert_eq!(hit.interactions, 1);
        assert_eq!(hit.element_id, 7);
        assert_eq!(hit.process_name.as_deref(), Some("compt"));
        assert_relative_eq!(hit.time, 4.0);
        assert_relative_eq!(hit.position.x, 10.0);
        assert_relative_eq!(hit.momentum_in.z, 0.511);
        assert_relative_eq!(hit.momentum_out.y, 0.1);
        assert_eq!(hit.gen_multiplicity, Some(2));
        assert_eq!(hit.gen_index, Some(1));
        assert!(hit.is_from_primary());
    }

    #[test]
    fn test_merge_weights_by_energy() {
        let mut hit = DetectorHit::from_step(&step(0.0, 0.0, 1.0), None);
        hit.merge(3.0, &ThreeVector::new(6.0, 0.0, 0.0), 2.0);

        assert_relative_eq!(hit.energy_deposit, 3.0);
        assert_eq!(hit.interactions, 2);
        assert_relative_eq!(hit.time, 2.0);
        assert_relative_eq!(hit.position.x, 4.0);
        // opening-step fields are untouched
        assert_relative_eq!(hit.momentum_in.z, 0.511);
        assert!(!hit.is_from_primary());
    }
}
