//! scinsim-core: Core types and traits for scintillator hit simulation.
//!
//! This crate provides the step and hit data model, primary-gamma
//! provenance bookkeeping, and the traits through which a transport engine
//! and a hit store plug into the event loop.
//!

pub mod engine;
pub mod error;
pub mod hit;
pub mod provenance;
pub mod step;
pub mod vector;

pub use engine::{EventOutcome, HitSink, RunSummary, StepProcessor, TransportEngine};
pub use error::{Error, Result};
pub use hit::DetectorHit;
pub use provenance::{ProvenanceRecord, ProvenanceTable, SCATTER_OFFSET};
pub use step::{StepOutcome, StepPoint, StepRecord};
pub use vector::ThreeVector;
