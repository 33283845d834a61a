//! Per-sensor health model.
//!
//! The polling loops retry failed reads forever with a fixed interval, so a
//! permanently dead sensor never escalates to a terminal state. The health
//! value is what makes that fault visible: drivers publish it on a watch
//! channel, and a consumer can tell a healthy-but-quiet sensor apart from
//! one that has been failing for the last hour.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse health classification for one sensor instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    /// The most recent read transaction succeeded.
    #[default]
    Healthy,

    /// The most recent read transaction failed; the driver is retrying.
    Degraded,
}

/// Last-known health of one sensor instance.
///
/// Updated by the driver after every read transaction: a success resets the
/// failure counter, a failure records the error text and timestamp and
/// increments the counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorHealth {
    /// Current classification.
    pub state: HealthState,

    /// Number of consecutive failed read transactions.
    pub consecutive_failures: u32,

    /// Display text of the most recent error, kept across recovery so the
    /// last fault stays inspectable.
    pub last_error: Option<String>,

    /// When the most recent error was observed.
    pub last_error_at: Option<DateTime<Utc>>,
}

impl SensorHealth {
    /// Record a successful read transaction.
    pub fn record_success(&mut self) {
        self.state = HealthState::Healthy;
        self.consecutive_failures = 0;
    }

    /// Record a failed read transaction.
    pub fn record_failure(&mut self, error: impl std::fmt::Display) {
        self.state = HealthState::Degraded;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.to_string());
        self.last_error_at = Some(Utc::now());
    }

    /// True while the driver is in its retry loop.
    pub fn is_degraded(&self) -> bool {
        self.state == HealthState::Degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_health_is_healthy() {
        let health = SensorHealth::default();
        assert_eq!(health.state, HealthState::Healthy);
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.last_error.is_none());
    }

    #[test]
    fn test_failures_accumulate() {
        let mut health = SensorHealth::default();
        health.record_failure("read timed out");
        health.record_failure("read timed out");

        assert!(health.is_degraded());
        assert_eq!(health.consecutive_failures, 2);
        assert_eq!(health.last_error.as_deref(), Some("read timed out"));
        assert!(health.last_error_at.is_some());
    }

    #[test]
    fn test_success_resets_counter_but_keeps_last_error() {
        let mut health = SensorHealth::default();
        health.record_failure("invalid response format");
        health.record_success();

        assert_eq!(health.state, HealthState::Healthy);
        assert_eq!(health.consecutive_failures, 0);
        // The last fault stays inspectable after recovery.
        assert_eq!(
            health.last_error.as_deref(),
            Some("invalid response format")
        );
    }
}
