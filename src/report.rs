//! Outbound sensor view of a collector's state
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::collector::CollectorState;

/// Display name of the usage sensor
pub const SENSOR_NAME: &str = "Electric Usage";

/// Stable identifier of the usage sensor
pub const SENSOR_UNIQUE_ID: &str = "electric_usage";

/// Unit of the usage value
pub const SENSOR_UNIT: &str = "kWh";

/// What an entity layer needs to display the latest usage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub name: String,
    pub unique_id: &'static str,
    pub unit: &'static str,
    /// Last known value, present even when `fresh` is false
    pub value: Option<f64>,
    pub fresh: bool,
    pub error: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl UsageReport {
    pub fn from_state(name: impl Into<String>, state: &CollectorState) -> Self {
        Self {
            name: name.into(),
            unique_id: SENSOR_UNIQUE_ID,
            unit: SENSOR_UNIT,
            value: state.value(),
            fresh: state.is_fresh(),
            error: state.last_error.as_ref().map(|e| e.to_string()),
            observed_at: state.last_reading.as_ref().map(|r| r.observed_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::UsageReading;
    use crate::error::{AuthError, CollectorError};

    #[test]
    fn test_empty_state_report() {
        let report = UsageReport::from_state(SENSOR_NAME, &CollectorState::default());

        assert_eq!(report.value, None);
        assert!(!report.fresh);
        assert_eq!(report.error, None);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["unique_id"], "electric_usage");
        assert_eq!(json["unit"], "kWh");
        assert!(json["value"].is_null());
    }

    #[test]
    fn test_stale_report_keeps_value() {
        let reading = UsageReading::new(42.5);
        let state = CollectorState {
            last_reading: Some(reading.clone()),
            last_success: false,
            last_error: Some(CollectorError::Auth(AuthError::Rejected { status: 403 })),
            ..Default::default()
        };

        let report = UsageReport::from_state("Meter", &state);
        assert_eq!(report.name, "Meter");
        assert_eq!(report.value, Some(42.5));
        assert!(!report.fresh);
        assert_eq!(
            report.error.as_deref(),
            Some("authentication failed: login rejected with status 403")
        );
        assert_eq!(report.observed_at, Some(reading.observed_at));
    }
}
