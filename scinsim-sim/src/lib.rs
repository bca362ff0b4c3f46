//! scinsim-sim: Hit aggregation and event-loop control.
//!
//! This crate provides:
//! - **`HitAggregator`** - per-scintillator time clustering of steps into hits
//! - **`RetentionPolicy`** - acceptance predicates for simulated events
//! - **`EventLoop`** - sequential discard-and-retry controller
//! - **`ParallelEventLoop`** - the same controller spread over rayon workers
//!
#![warn(missing_docs)]

mod aggregator;
mod policy;
mod progress;
mod run;

pub use aggregator::{AggregatorConfig, AggregatorStatistics, ElementState, HitAggregator};
pub use policy::{RetentionConfig, RetentionPolicy, Signature};
pub use progress::{ProgressConfig, ProgressReporter};
pub use run::{
    AbortHandle, EventLoop, LoopConfig, LoopState, ParallelEventLoop, ParallelOutcome,
    RunCounters,
};

// Re-export the core collaborator traits
pub use scinsim_core::engine::{EventOutcome, HitSink, RunSummary, StepProcessor, TransportEngine};
