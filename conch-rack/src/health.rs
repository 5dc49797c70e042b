/**
 * DEVICE HEALTH - Classification of a slot occupant for the rack view
 *
 * ROLE: Maps the raw validation state the backend reports for a device to
 * the category drawn next to each slot, and decides whether a device is
 * still reporting in.
 *
 * Both functions are total: any device shape yields a category, never an error.
 */

use crate::models::{DeviceSummary, Health};
use serde::Serialize;
use time::{Duration, OffsetDateTime};

/// Window inside which a device counts as reporting, unless configured otherwise.
pub const DEFAULT_ACTIVE_WINDOW: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthCategory {
    Validated,
    Pass,
    Fail,
    Unknown,
}

impl HealthCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthCategory::Validated => "VALIDATED",
            HealthCategory::Pass => "PASS",
            HealthCategory::Fail => "FAIL",
            HealthCategory::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for HealthCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// No report -> UNKNOWN, FAIL wins over any marker, PASS + validated -> VALIDATED.
pub fn classify(device: &DeviceSummary) -> HealthCategory {
    match device.health {
        None | Some(Health::Unknown) => HealthCategory::Unknown,
        Some(Health::Fail) => HealthCategory::Fail,
        Some(Health::Pass) if device.is_validated() => HealthCategory::Validated,
        Some(Health::Pass) => HealthCategory::Pass,
    }
}

/// A device is reporting if it was last seen inside `window` before `now`.
pub fn is_reporting(device: &DeviceSummary, now: OffsetDateTime, window: Duration) -> bool {
    match device.last_seen {
        Some(last_seen) => now - window < last_seen,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn device(health: Option<Health>, validated: bool) -> DeviceSummary {
        DeviceSummary {
            health,
            validated,
            ..DeviceSummary::new("dev")
        }
    }

    #[test]
    fn test_missing_report_is_unknown() {
        assert_eq!(classify(&device(None, false)), HealthCategory::Unknown);
        assert_eq!(classify(&device(None, true)), HealthCategory::Unknown);
        assert_eq!(classify(&device(Some(Health::Unknown), true)), HealthCategory::Unknown);
    }

    #[test]
    fn test_fail_beats_validated_marker() {
        assert_eq!(classify(&device(Some(Health::Fail), false)), HealthCategory::Fail);
        assert_eq!(classify(&device(Some(Health::Fail), true)), HealthCategory::Fail);
    }

    #[test]
    fn test_pass_with_and_without_marker() {
        assert_eq!(classify(&device(Some(Health::Pass), true)), HealthCategory::Validated);
        assert_eq!(classify(&device(Some(Health::Pass), false)), HealthCategory::Pass);

        let graduated = DeviceSummary {
            graduated: true,
            ..device(Some(Health::Pass), false)
        };
        assert_eq!(classify(&graduated), HealthCategory::Validated);
    }

    #[test]
    fn test_reporting_window() {
        let now = datetime!(2024-05-01 12:00 UTC);
        let mut d = DeviceSummary::new("dev");
        assert!(!is_reporting(&d, now, DEFAULT_ACTIVE_WINDOW));

        d.last_seen = Some(datetime!(2024-05-01 11:57 UTC));
        assert!(is_reporting(&d, now, DEFAULT_ACTIVE_WINDOW));

        d.last_seen = Some(datetime!(2024-05-01 11:54 UTC));
        assert!(!is_reporting(&d, now, DEFAULT_ACTIVE_WINDOW));
    }
}
