//! Error types for scinsim-core.

use thiserror::Error;

/// Result type alias for scinsim operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for scinsim operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or contradictory configuration. Fatal, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Step recorded in a detector element outside the allocated table.
    #[error("detector element {element} out of range (max {max})")]
    ElementOutOfRange { element: usize, max: usize },

    /// Negative or non-finite energy deposit.
    #[error("invalid energy deposit: {0}")]
    InvalidDeposit(f64),

    /// Failure reported by the transport engine.
    #[error("transport engine error: {0}")]
    Engine(String),

    /// Failure reported by the hit store.
    #[error("hit sink error: {0}")]
    Sink(String),
}
