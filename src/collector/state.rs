use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::error::CollectorError;

/// A single usage value from one successful refresh cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReading {
    /// Usage in kWh
    pub value: f64,
    /// When the cycle that produced this reading completed
    pub observed_at: DateTime<Utc>,
}

impl UsageReading {
    /// Create a reading observed now
    pub fn new(value: f64) -> Self {
        Self {
            value,
            observed_at: Utc::now(),
        }
    }
}

/// Snapshot of a collector's cached result and refresh status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectorState {
    /// Latest successful reading, kept across failed cycles
    pub last_reading: Option<UsageReading>,
    /// Whether the latest completed cycle succeeded
    pub last_success: bool,
    /// Error of the latest completed cycle, if it failed
    pub last_error: Option<CollectorError>,
    /// Whether a cycle is running right now
    pub in_flight: bool,
    /// When the latest completed cycle finished
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl CollectorState {
    /// Latest known value, even if stale
    pub fn value(&self) -> Option<f64> {
        self.last_reading.as_ref().map(|r| r.value)
    }

    pub fn is_fresh(&self) -> bool {
        self.last_success
    }

    /// True when no reading exists or the latest one is older than `interval`
    pub fn is_stale(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        let Some(reading) = &self.last_reading else {
            return true;
        };

        match chrono::Duration::from_std(interval) {
            Ok(interval) => now - reading.observed_at > interval,
            Err(_) => false,
        }
    }

    pub(crate) fn record_success(&mut self, reading: UsageReading) {
        let newer = self
            .last_reading
            .as_ref()
            .is_none_or(|prev| reading.observed_at >= prev.observed_at);
        if newer {
            self.last_reading = Some(reading);
        }
        self.last_success = true;
        self.last_error = None;
        self.in_flight = false;
        self.last_attempt_at = Some(Utc::now());
    }

    pub(crate) fn record_failure(&mut self, error: CollectorError) {
        self.last_success = false;
        self.last_error = Some(error);
        self.in_flight = false;
        self.last_attempt_at = Some(Utc::now());
    }
}
