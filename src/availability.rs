//! Deterministic availability evaluation.
//!
//! Pure function over a tenant's operating config and a snapshot of the
//! day's bookings. Checks run in a fixed order — weekday, hours, capacity —
//! and the first failure wins, so the reason a guest sees is predictable.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Operating constraints embedded in a tenant.
///
/// Absent fields impose no constraint; a tenant with no config at all
/// accepts everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityConfig {
    /// Total covers accepted per calendar date. Zero means unlimited.
    pub max_seats_per_day: i32,
    /// Opening time, `HH:MM`.
    pub open_time: Option<String>,
    /// Closing time, `HH:MM`.
    pub close_time: Option<String>,
    /// Weekday names the restaurant is open. Empty means every day.
    pub open_weekdays: Vec<String>,
}

/// Outcome of an availability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Availability {
    pub fn open() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn closed(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decide whether a request for `date` (`YYYY-MM-DD`) at `time` (`HH:MM`)
/// for `party_size` guests can be admitted.
///
/// `booked` is a point-in-time snapshot of the party sizes of the tenant's
/// existing non-cancelled reservations for that date. A date that does not
/// parse fails closed: a false "available" risks a double booking, a false
/// "full" only costs the model one clarifying question.
pub fn check_availability(
    config: Option<&AvailabilityConfig>,
    booked: &[i32],
    date: &str,
    time: &str,
    party_size: i32,
) -> Availability {
    let Some(config) = config else {
        return Availability::open();
    };

    let Ok(parsed) = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") else {
        return Availability::closed("Unable to verify availability for that date");
    };

    // Day check
    let weekday = parsed.format("%A").to_string();
    if !config.open_weekdays.is_empty()
        && !config
            .open_weekdays
            .iter()
            .any(|d| d.eq_ignore_ascii_case(&weekday))
    {
        return Availability::closed(format!("Closed on {weekday}s"));
    }

    // Hours check: inclusive window, lexicographic HH:MM comparison
    if let (Some(open), Some(close)) = (&config.open_time, &config.close_time) {
        let requested = time.trim();
        if requested < open.as_str() || requested > close.as_str() {
            return Availability::closed(format!(
                "Requested time {requested} is outside opening hours ({open}-{close})"
            ));
        }
    }

    // Capacity check
    if config.max_seats_per_day > 0 {
        let taken: i32 = booked.iter().sum();
        if taken + party_size > config.max_seats_per_day {
            return Availability::closed("Restaurant is full for this date");
        }
    }

    Availability::open()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn friday_dinner_config() -> AvailabilityConfig {
        AvailabilityConfig {
            max_seats_per_day: 4,
            open_time: Some("18:00".to_string()),
            close_time: Some("23:00".to_string()),
            open_weekdays: vec!["Friday".to_string()],
        }
    }

    #[test]
    fn test_no_config_is_permissive() {
        let result = check_availability(None, &[], "not a date", "99:99", 500);
        assert!(result.available);
    }

    #[test]
    fn test_open_friday_within_hours() {
        // 2025-01-03 is a Friday
        let config = friday_dinner_config();
        let result = check_availability(Some(&config), &[], "2025-01-03", "19:00", 2);
        assert_eq!(result, Availability::open());
    }

    #[test]
    fn test_closed_on_saturday() {
        let config = friday_dinner_config();
        let result = check_availability(Some(&config), &[], "2025-01-04", "19:00", 2);
        assert_eq!(result.reason.as_deref(), Some("Closed on Saturdays"));
    }

    #[test]
    fn test_day_check_precedes_hours_and_capacity() {
        // Saturday at a bad time with an overfull party: day reason wins.
        let config = friday_dinner_config();
        let result = check_availability(Some(&config), &[4], "2025-01-04", "03:00", 99);
        assert_eq!(result.reason.as_deref(), Some("Closed on Saturdays"));
    }

    #[test]
    fn test_outside_opening_hours() {
        let config = friday_dinner_config();
        let result = check_availability(Some(&config), &[], "2025-01-03", "17:59", 2);
        assert!(!result.available);
        assert!(result.reason.unwrap().contains("17:59"));
    }

    #[test]
    fn test_window_is_inclusive() {
        let config = friday_dinner_config();
        assert!(check_availability(Some(&config), &[], "2025-01-03", "18:00", 2).available);
        assert!(check_availability(Some(&config), &[], "2025-01-03", "23:00", 2).available);
    }

    #[test]
    fn test_capacity_admits_up_to_limit() {
        let config = AvailabilityConfig {
            max_seats_per_day: 4,
            ..Default::default()
        };
        assert!(check_availability(Some(&config), &[], "2025-01-03", "19:00", 4).available);
        let over = check_availability(Some(&config), &[], "2025-01-03", "19:00", 5);
        assert_eq!(
            over.reason.as_deref(),
            Some("Restaurant is full for this date")
        );
    }

    #[test]
    fn test_capacity_counts_existing_bookings() {
        let config = AvailabilityConfig {
            max_seats_per_day: 10,
            ..Default::default()
        };
        let result = check_availability(Some(&config), &[4, 4], "2025-01-03", "19:00", 3);
        assert!(!result.available);
        let fits = check_availability(Some(&config), &[4, 4], "2025-01-03", "19:00", 2);
        assert!(fits.available);
    }

    #[test]
    fn test_zero_max_seats_means_unlimited() {
        let config = AvailabilityConfig::default();
        assert!(check_availability(Some(&config), &[100], "2025-01-03", "19:00", 50).available);
    }

    #[test]
    fn test_unparseable_date_fails_closed() {
        let config = AvailabilityConfig::default();
        let result = check_availability(Some(&config), &[], "tomorrow", "19:00", 2);
        assert!(!result.available);
    }

    #[test]
    fn test_weekday_match_is_case_insensitive() {
        let config = AvailabilityConfig {
            open_weekdays: vec!["friday".to_string()],
            ..Default::default()
        };
        assert!(check_availability(Some(&config), &[], "2025-01-03", "19:00", 2).available);
    }
}
