//! Relative time phrases
//!
//! Turns the distance between two instants into English such as
//! "in 3 hours", "2 minutes ago" or "yesterday".

use chrono::{DateTime, Utc};

const MINUTE_MS: f64 = 60.0 * 1000.0;
const HOUR_MS: f64 = 60.0 * MINUTE_MS;
const DAY_MS: f64 = 24.0 * HOUR_MS;
const YEAR_MS: f64 = 365.0 * DAY_MS;
const MONTH_MS: f64 = YEAR_MS / 12.0;

/// Phrase used when the distance rounds to less than a minute
pub const LESS_THAN_A_MINUTE: &str = "less than a minute ago";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
}

impl Unit {
    /// Largest first
    const ALL: [Unit; 5] = [Unit::Year, Unit::Month, Unit::Day, Unit::Hour, Unit::Minute];

    fn millis(self) -> f64 {
        match self {
            Unit::Year => YEAR_MS,
            Unit::Month => MONTH_MS,
            Unit::Day => DAY_MS,
            Unit::Hour => HOUR_MS,
            Unit::Minute => MINUTE_MS,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Unit::Year => "year",
            Unit::Month => "month",
            Unit::Day => "day",
            Unit::Hour => "hour",
            Unit::Minute => "minute",
        }
    }

    /// Word forms for a count of -1 or +1, where English has them
    fn adjacent_word(self, count: i64) -> Option<&'static str> {
        match (self, count) {
            (Unit::Year, -1) => Some("last year"),
            (Unit::Year, 1) => Some("next year"),
            (Unit::Month, -1) => Some("last month"),
            (Unit::Month, 1) => Some("next month"),
            (Unit::Day, -1) => Some("yesterday"),
            (Unit::Day, 1) => Some("tomorrow"),
            _ => None,
        }
    }
}

/// Describe `target` relative to `reference`
///
/// Returns `None` when there is no target so callers can render their own
/// placeholder.
pub fn format_relative(
    target: Option<DateTime<Utc>>,
    reference: DateTime<Utc>,
) -> Option<String> {
    let target = target?;
    let elapsed = (target - reference).num_milliseconds() as f64;

    let unit = Unit::ALL
        .into_iter()
        .find(|u| elapsed.abs() > u.millis())
        .unwrap_or(Unit::Minute);

    let count = round_half_up(elapsed / unit.millis());

    // Past instants that round to a whole minute keep their numeric form
    if unit == Unit::Minute && count >= 0 && elapsed < MINUTE_MS {
        return Some(LESS_THAN_A_MINUTE.to_string());
    }

    Some(phrase(count, unit))
}

/// [`format_relative`] against the current time
pub fn format_relative_now(target: Option<DateTime<Utc>>) -> Option<String> {
    format_relative(target, Utc::now())
}

/// Rounds halves towards positive infinity, so -2.5 becomes -2
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn phrase(count: i64, unit: Unit) -> String {
    if let Some(word) = unit.adjacent_word(count) {
        return word.to_string();
    }

    let magnitude = count.unsigned_abs();
    let plural = if magnitude == 1 { "" } else { "s" };

    if count < 0 {
        format!("{} {}{} ago", magnitude, unit.name(), plural)
    } else {
        format!("in {} {}{}", magnitude, unit.name(), plural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn rel(offset: Duration) -> String {
        format_relative(Some(reference() + offset), reference()).unwrap()
    }

    #[test]
    fn test_absent_target() {
        assert_eq!(format_relative(None, reference()), None);
        assert_eq!(format_relative_now(None), None);
    }

    #[test]
    fn test_under_a_minute() {
        assert_eq!(rel(Duration::seconds(30)), LESS_THAN_A_MINUTE);
        assert_eq!(rel(Duration::seconds(-20)), LESS_THAN_A_MINUTE);
        assert_eq!(rel(Duration::seconds(-30)), LESS_THAN_A_MINUTE);
        assert_eq!(rel(Duration::seconds(59)), LESS_THAN_A_MINUTE);
        assert_eq!(rel(Duration::zero()), LESS_THAN_A_MINUTE);
    }

    #[test]
    fn test_past_seconds_round_to_a_minute() {
        assert_eq!(rel(Duration::seconds(-31)), "1 minute ago");
        assert_eq!(rel(Duration::seconds(-45)), "1 minute ago");
        assert_eq!(rel(Duration::seconds(-59)), "1 minute ago");
    }

    #[test]
    fn test_minutes() {
        assert_eq!(rel(Duration::minutes(1)), "in 1 minute");
        assert_eq!(rel(Duration::minutes(-2)), "2 minutes ago");
        assert_eq!(rel(Duration::minutes(30)), "in 30 minutes");
        assert_eq!(rel(Duration::minutes(60)), "in 60 minutes");
    }

    #[test]
    fn test_hours() {
        assert_eq!(rel(Duration::hours(-2)), "2 hours ago");
        assert_eq!(rel(Duration::hours(3)), "in 3 hours");
        assert_eq!(rel(Duration::minutes(90)), "in 2 hours");
        assert_eq!(rel(Duration::minutes(-61)), "1 hour ago");
    }

    #[test]
    fn test_days() {
        assert_eq!(rel(Duration::hours(-50)), "2 days ago");
        assert_eq!(rel(Duration::hours(-36)), "yesterday");
        assert_eq!(rel(Duration::hours(-25)), "yesterday");
        assert_eq!(rel(Duration::hours(25)), "tomorrow");
        assert_eq!(rel(Duration::days(3)), "in 3 days");
    }

    #[test]
    fn test_months_and_years() {
        assert_eq!(rel(Duration::days(-70)), "2 months ago");
        assert_eq!(rel(Duration::days(40)), "next month");
        assert_eq!(rel(Duration::days(400)), "next year");
        assert_eq!(rel(Duration::days(-800)), "2 years ago");
    }

    #[test]
    fn test_half_rounds_towards_future() {
        // -2.5 hours rounds to -2, +2.5 hours to +3
        assert_eq!(rel(Duration::minutes(-150)), "2 hours ago");
        assert_eq!(rel(Duration::minutes(150)), "in 3 hours");
    }

    #[test]
    fn test_deterministic() {
        let target = Some(reference() + Duration::hours(5));
        assert_eq!(
            format_relative(target, reference()),
            format_relative(target, reference())
        );
    }
}
