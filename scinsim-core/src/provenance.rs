//! Primary-gamma provenance.
//!
//! The event generator attaches a provenance record to every primary gamma
//! it emits. During step processing the hit aggregator is the only writer:
//! it copies the record into the first hit of each primary interaction and
//! then marks the record as scattered.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Offset added to a primary's multiplicity once it has interacted.
pub const SCATTER_OFFSET: i32 = 100;

/// Generator-level information carried by a primary track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProvenanceRecord {
    /// Gamma multiplicity of the decay (2, 3, ...), plus
    /// [`SCATTER_OFFSET`] for every recorded interaction.
    pub multiplicity: i32,
    /// Which gamma of the decay this track is.
    pub index: i32,
}

impl ProvenanceRecord {
    /// Creates a record for an unscattered primary.
    #[must_use]
    pub fn new(multiplicity: i32, index: i32) -> Self {
        Self {
            multiplicity,
            index,
        }
    }

    /// Marks the primary as having interacted.
    pub fn mark_scattered(&mut self) {
        self.multiplicity += SCATTER_OFFSET;
    }

    /// Clears the multiplicity after a deposit-free momentum change.
    pub fn reset_multiplicity(&mut self) {
        self.multiplicity = 0;
    }
}

/// Provenance records of one event, keyed by primary track id.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ProvenanceTable {
    records: HashMap<i32, ProvenanceRecord>,
}

impl ProvenanceTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a record to a primary track, replacing any previous one.
    pub fn insert(&mut self, track_id: i32, record: ProvenanceRecord) {
        self.records.insert(track_id, record);
    }

    /// Record attached to a track, if any.
    #[must_use]
    pub fn get(&self, track_id: i32) -> Option<&ProvenanceRecord> {
        self.records.get(&track_id)
    }

    /// Mutable record attached to a track, if any.
    pub fn get_mut(&mut self, track_id: i32) -> Option<&mut ProvenanceRecord> {
        self.records.get_mut(&track_id)
    }

    /// Number of attached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Removes all records.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl FromIterator<(i32, ProvenanceRecord)> for ProvenanceTable {
    fn from_iter<I: IntoIterator<Item = (i32, ProvenanceRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
