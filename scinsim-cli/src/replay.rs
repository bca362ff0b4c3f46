//! Replay of recorded transport output.
//!
//! A recording is a JSON array of attempts, each holding the sensitive
//! steps of one simulated event, the provenance records of its primaries
//! and the outcome flags the transport engine reported. The replay engine
//! cycles through the recording in order, one attempt per call.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use log::debug;
use scinsim_core::{
    DetectorHit, Error as CoreError, EventOutcome, HitSink, ProvenanceTable, StepProcessor,
    StepRecord, TransportEngine,
};
use serde::{Deserialize, Serialize};

/// One recorded attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordedEvent {
    pub provenance: ProvenanceTable,
    pub steps: Vec<StepRecord>,
    pub outcome: EventOutcome,
}

/// Loads a recording from a JSON file.
pub fn load_recording(path: &Path) -> crate::Result<Vec<RecordedEvent>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Transport engine replaying a recording.
pub struct ReplayEngine {
    events: Arc<Vec<RecordedEvent>>,
    cursor: usize,
}

impl ReplayEngine {
    /// Starts replaying at `offset` (wrapped to the recording length).
    pub fn new(events: Arc<Vec<RecordedEvent>>, offset: usize) -> Self {
        Self {
            events,
            cursor: offset,
        }
    }
}

impl TransportEngine for ReplayEngine {
    fn begin_run(&mut self, target: u64) -> scinsim_core::Result<()> {
        if self.events.is_empty() && target > 0 {
            return Err(CoreError::Engine("recording contains no events".into()));
        }
        Ok(())
    }

    fn simulate_event(
        &mut self,
        event_id: u64,
        detector: &mut dyn StepProcessor,
    ) -> scinsim_core::Result<EventOutcome> {
        let Some(recorded) = self.events.get(self.cursor % self.events.len().max(1)) else {
            return Err(CoreError::Engine("recording contains no events".into()));
        };
        self.cursor += 1;

        let mut provenance = recorded.provenance.clone();
        let mut significant = 0usize;
        for step in &recorded.steps {
            if detector.process_step(step, &mut provenance)?.is_significant() {
                significant += 1;
            }
        }
        debug!(
            "event {event_id}: replayed {} steps ({significant} with deposit)",
            recorded.steps.len()
        );
        Ok(recorded.outcome)
    }
}

/// Hits of one accepted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: u64,
    pub hits: Vec<DetectorHit>,
}

/// Keeps accepted events in memory until the run is over.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub events: Vec<StoredEvent>,
}

impl HitSink for CollectingSink {
    fn store(&mut self, event_id: u64, hits: &[DetectorHit]) -> scinsim_core::Result<()> {
        self.events.push(StoredEvent {
            event_id,
            hits: hits.to_vec(),
        });
        Ok(())
    }
}

/// Total hits and hits opened by generator-level primaries.
pub fn count_hits(events: &[StoredEvent]) -> (usize, usize) {
    events
        .iter()
        .flat_map(|event| &event.hits)
        .fold((0, 0), |(total, primary), hit| {
            (total + 1, primary + usize::from(hit.is_from_primary()))
        })
}

/// Writes accepted events as a JSON array, ordered by event id.
pub fn write_events(path: &Path, mut events: Vec<StoredEvent>) -> crate::Result<usize> {
    events.sort_by_key(|event| event.event_id);
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &events)?;
    writer.flush()?;
    Ok(events.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scinsim_sim::{AggregatorConfig, EventLoop, LoopConfig, RetentionConfig};

    const RECORDING: &str = r#"[
        {
            "provenance": { "1": { "multiplicity": 2, "index": 0 } },
            "steps": [
                {
                    "energy_deposit": 0.2,
                    "element_id": 3,
                    "pre": { "time": 1.0, "position": { "x": 0.0, "y": 0.0, "z": 0.0 } },
                    "post": {
                        "time": 1.1,
                        "position": { "x": 1.0, "y": 0.0, "z": 0.0 },
                        "process_name": "compt"
                    },
                    "track_id": 1,
                    "pdg_code": 22,
                    "parent_id": 0
                }
            ],
            "outcome": { "aborted": true }
        },
        {
            "provenance": { "1": { "multiplicity": 3, "index": 2 } },
            "steps": [
                {
                    "energy_deposit": 0.3,
                    "element_id": 5,
                    "pre": { "time": 2.0 },
                    "post": { "time": 2.1, "process_name": "compt" },
                    "track_id": 1,
                    "pdg_code": 22,
                    "parent_id": 0
                },
                {
                    "energy_deposit": 0.1,
                    "element_id": 5,
                    "pre": { "time": 3.0 },
                    "post": { "time": 3.1 },
                    "track_id": 4,
                    "pdg_code": 11,
                    "parent_id": 1
                }
            ]
        }
    ]"#;

    fn recording_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RECORDING.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_and_replay_with_escape_filter() {
        let file = recording_file();
        let events = Arc::new(load_recording(file.path()).unwrap());
        assert_eq!(events.len(), 2);
        assert!(events[0].outcome.aborted);
        assert!(!events[1].outcome.aborted);

        let config = LoopConfig::default()
            .with_retention(RetentionConfig::default().with_kill_escaping(true));
        let mut event_loop =
            EventLoop::new(&config, AggregatorConfig::default().with_element_count(8)).unwrap();
        let mut engine = ReplayEngine::new(Arc::clone(&events), 0);
        let mut sink = CollectingSink::default();
        let summary = event_loop.run(&mut engine, &mut sink, 2).unwrap();

        // each accepted event needs one aborted and one clean attempt
        assert_eq!(summary.attempted, 4);
        assert_eq!(sink.events.len(), 2);
        let hits = &sink.events[0].hits;
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].energy_deposit, 0.4);
        assert_eq!(hits[0].interactions, 2);
        assert_eq!(hits[0].gen_multiplicity, Some(3));
        assert_eq!(hits[0].gen_index, Some(2));
        assert_eq!(count_hits(&sink.events), (2, 2));
    }

    #[test]
    fn test_count_hits_separates_secondaries() {
        let secondary = StepRecord {
            energy_deposit: 0.2,
            track_id: 7,
            parent_id: 1,
            ..Default::default()
        };
        let primary = StepRecord {
            energy_deposit: 0.3,
            track_id: 1,
            ..Default::default()
        };
        let record = scinsim_core::ProvenanceRecord::new(2, 0);
        let events = vec![
            StoredEvent {
                event_id: 0,
                hits: vec![DetectorHit::from_step(&secondary, None)],
            },
            StoredEvent {
                event_id: 1,
                hits: vec![
                    DetectorHit::from_step(&primary, Some(&record)),
                    DetectorHit::from_step(&secondary, None),
                ],
            },
        ];
        assert_eq!(count_hits(&events), (3, 1));
        assert_eq!(count_hits(&[]), (0, 0));
    }

    #[test]
    fn test_write_events_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.json");
        let events = vec![
            StoredEvent {
                event_id: 4,
                hits: Vec::new(),
            },
            StoredEvent {
                event_id: 1,
                hits: Vec::new(),
            },
        ];
        assert_eq!(write_events(&path, events).unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let back: Vec<StoredEvent> = serde_json::from_str(&text).unwrap();
        assert_eq!(back[0].event_id, 1);
        assert_eq!(back[1].event_id, 4);
    }

    #[test]
    fn test_empty_recording_is_an_engine_error() {
        let mut engine = ReplayEngine::new(Arc::new(Vec::new()), 0);
        assert!(matches!(
            engine.begin_run(1),
            Err(CoreError::Engine(_))
        ));
    }
}
