//! Advisory progress reporting for the event loop.

use log::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Progress reporting configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProgressConfig {
    /// Report the number of processed events every `10^power` events.
    pub print_statistics: bool,
    /// Reporting cadence exponent.
    pub power: u32,
    /// Report the completed percentage before every event.
    pub show_progress: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            print_statistics: true,
            power: 3,
            show_progress: false,
        }
    }
}

impl ProgressConfig {
    /// Set the reporting cadence exponent.
    #[must_use]
    pub fn with_power(mut self, power: u32) -> Self {
        self.power = power;
        self
    }

    /// Enable or disable the processed-events line.
    #[must_use]
    pub fn with_print_statistics(mut self, enabled: bool) -> Self {
        self.print_statistics = enabled;
        self
    }

    /// Enable or disable the percentage line.
    #[must_use]
    pub fn with_show_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }
}

/// Emits progress lines through `log`. Never affects control flow.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    config: ProgressConfig,
    interval: u64,
}

impl ProgressReporter {
    /// Creates a reporter.
    #[must_use]
    pub fn new(config: ProgressConfig) -> Self {
        let interval = 10u64.saturating_pow(config.power);
        Self { config, interval }
    }

    /// Number of events between statistics lines.
    #[must_use]
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Reports before event `index` of `target`. Returns true if a
    /// statistics line was emitted.
    #[allow(clippy::cast_precision_loss)]
    pub fn report(&self, index: u64, target: u64) -> bool {
        let due = self.config.print_statistics && index % self.interval == 0;
        if due {
            info!("=== Processed {index} events");
        }
        if self.config.show_progress && target > 0 {
            debug!(
                "=== Progress {:4.2} ===",
                100.0 * index as f64 / target as f64
            );
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence() {
        let reporter = ProgressReporter::new(ProgressConfig::default().with_power(2));
        assert_eq!(reporter.interval(), 100);
        assert!(reporter.report(0, 1000));
        assert!(!reporter.report(99, 1000));
        assert!(reporter.report(200, 1000));
    }

    #[test]
    fn test_disabled_and_saturated() {
        let quiet = ProgressReporter::new(ProgressConfig::default().with_print_statistics(false));
        assert!(!quiet.report(0, 10));

        let huge = ProgressReporter::new(ProgressConfig::default().with_power(40));
        assert_eq!(huge.interval(), u64::MAX);
        assert!(huge.report(0, 10));
        assert!(!huge.report(1, 10));
    }
}
