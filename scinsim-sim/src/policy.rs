//! Event retention policies.
//!
//! Operators select a policy with a set of flags; [`RetentionConfig::resolve`]
//! turns them into a single [`RetentionPolicy`] whose [`accepts`] predicate
//! the event loop applies after every attempt.
//!
//! [`accepts`]: RetentionPolicy::accepts

use std::fmt;

use log::warn;
use scinsim_core::{Error, EventOutcome, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Multiplicity signature required by selective retention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signature {
    /// Two-gamma annihilation registered.
    TwoGamma,
    /// Three-gamma annihilation registered.
    ThreeGamma,
}

impl Signature {
    fn is_registered(self, outcome: &EventOutcome) -> bool {
        match self {
            Self::TwoGamma => outcome.registered_2g,
            Self::ThreeGamma => outcome.registered_3g,
        }
    }
}

/// Acceptance predicate applied to each simulated attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Every attempt is kept.
    #[default]
    Unconditional,
    /// Aborted attempts (escaping particles) are discarded and retried.
    EscapeFilter,
    /// Attempts without the required signature are discarded and retried.
    Selective(Signature),
}

impl RetentionPolicy {
    /// Returns true if an attempt with this outcome is retained.
    #[must_use]
    pub fn accepts(&self, outcome: &EventOutcome) -> bool {
        match self {
            Self::Unconditional => true,
            Self::EscapeFilter => !outcome.aborted,
            Self::Selective(signature) => signature.is_registered(outcome),
        }
    }

    /// Returns true if the policy can ever discard an attempt.
    #[must_use]
    pub fn may_retry(&self) -> bool {
        !matches!(self, Self::Unconditional)
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconditional => write!(f, "unconditional"),
            Self::EscapeFilter => write!(f, "escape filter"),
            Self::Selective(Signature::TwoGamma) => write!(f, "selective (2g)"),
            Self::Selective(Signature::ThreeGamma) => write!(f, "selective (3g)"),
        }
    }
}

/// Retention flags as set by the operator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[allow(clippy::struct_excessive_bools)]
pub struct RetentionConfig {
    /// Discard events aborted by particles escaping the world.
    pub kill_escaping: bool,
    /// Keep only events with a registered multiplicity signature.
    pub save_selected: bool,
    /// Signature for selective retention: two gammas.
    pub save_2g: bool,
    /// Signature for selective retention: three gammas.
    pub save_3g: bool,
}

impl RetentionConfig {
    /// Enable the escape filter.
    #[must_use]
    pub fn with_kill_escaping(mut self, enabled: bool) -> Self {
        self.kill_escaping = enabled;
        self
    }

    /// Enable selective retention.
    #[must_use]
    pub fn with_save_selected(mut self, enabled: bool) -> Self {
        self.save_selected = enabled;
        self
    }

    /// Select the two-gamma signature.
    #[must_use]
    pub fn with_save_2g(mut self, enabled: bool) -> Self {
        self.save_2g = enabled;
        self
    }

    /// Select the three-gamma signature.
    #[must_use]
    pub fn with_save_3g(mut self, enabled: bool) -> Self {
        self.save_3g = enabled;
        self
    }

    /// Resolves the flags into a single policy.
    ///
    /// The escape filter takes precedence over selective retention, and the
    /// two-gamma signature over the three-gamma one.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if selective retention is enabled without a
    /// signature. The condition is fatal and must not be retried.
    pub fn resolve(&self) -> Result<RetentionPolicy> {
        if self.kill_escaping {
            if self.save_selected {
                warn!("escape filter enabled, ignoring selective retention");
            }
            return Ok(RetentionPolicy::EscapeFilter);
        }
        if !self.save_selected {
            return Ok(RetentionPolicy::Unconditional);
        }
        match (self.save_2g, self.save_3g) {
            (true, also_3g) => {
                if also_3g {
                    warn!("both 2g and 3g selection requested, keeping 2g events");
                }
                Ok(RetentionPolicy::Selective(Signature::TwoGamma))
            }
            (false, true) => Ok(RetentionPolicy::Selective(Signature::ThreeGamma)),
            (false, false) => Err(Error::Config(
                "selective retention requires the 2g or 3g signature".into(),
            )),
        }
    }
}
