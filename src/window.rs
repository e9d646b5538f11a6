//! Query time-window calculation from `interval` / `unit` request parameters.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::{ChartError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Minutes,
    Hours,
}

impl IntervalUnit {
    pub fn seconds(&self) -> u64 {
        match self {
            IntervalUnit::Minutes => 60,
            IntervalUnit::Hours => 3600,
        }
    }

    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw {
            None | Some("") => Ok(IntervalUnit::Hours),
            Some("minutes") => Ok(IntervalUnit::Minutes),
            Some("hours") => Ok(IntervalUnit::Hours),
            Some(other) => Err(ChartError::InvalidUnit(other.to_string())),
        }
    }
}

/// The UTC window `[from, to]` a chart request queries over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl QueryWindow {
    pub fn ending_now(duration: Duration) -> Self {
        let to = Utc::now();
        // A duration beyond chrono's range saturates to the widest window
        // rather than collapsing to an empty one.
        let span = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        let from = to.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC);
        QueryWindow { from, to }
    }
}

/// `duration = unit_seconds * interval`. Interval defaults to 1, unit to
/// hours; a non-positive interval or unknown unit is a caller error.
pub fn compute_duration(interval: Option<&str>, unit: Option<&str>) -> Result<Duration> {
    let unit = IntervalUnit::parse(unit)?;

    let value: i64 = match interval {
        None | Some("") => 1,
        Some(raw) => raw
            .parse()
            .map_err(|_| ChartError::InvalidInterval(raw.to_string()))?,
    };

    if value <= 0 {
        return Err(ChartError::InvalidInterval(value.to_string()));
    }

    let seconds = unit
        .seconds()
        .checked_mul(value as u64)
        .ok_or_else(|| ChartError::InvalidInterval(value.to_string()))?;
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_to_one_hour() {
        assert_eq!(
            compute_duration(None, None).unwrap(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn multiplies_unit_by_interval() {
        assert_eq!(
            compute_duration(Some("2"), Some("hours")).unwrap(),
            Duration::from_secs(7200)
        );
        assert_eq!(
            compute_duration(Some("45"), Some("minutes")).unwrap(),
            Duration::from_secs(45 * 60)
        );
    }

    #[test]
    fn rejects_non_positive_interval() {
        assert!(matches!(
            compute_duration(Some("0"), None),
            Err(ChartError::InvalidInterval(_))
        ));
        assert!(matches!(
            compute_duration(Some("-3"), Some("hours")),
            Err(ChartError::InvalidInterval(_))
        ));
    }

    #[test]
    fn rejects_unparseable_interval() {
        assert!(matches!(
            compute_duration(Some("soon"), None),
            Err(ChartError::InvalidInterval(_))
        ));
    }

    #[test]
    fn oversized_interval_is_an_input_error_not_a_panic() {
        let err = compute_duration(Some(&i64::MAX.to_string()), Some("hours")).unwrap_err();
        assert!(matches!(err, ChartError::InvalidInterval(_)));
    }

    #[test]
    fn oversized_duration_still_spans_a_window() {
        let window = QueryWindow::ending_now(Duration::from_secs(u64::MAX));
        assert!(window.from < window.to);
    }

    #[test]
    fn rejects_unknown_unit() {
        let err = compute_duration(Some("1"), Some("fortnights")).unwrap_err();
        match err {
            ChartError::InvalidUnit(unit) => assert_eq!(unit, "fortnights"),
            other => panic!("expected InvalidUnit, got {:?}", other),
        }
    }

    #[test]
    fn window_spans_requested_duration() {
        let window = QueryWindow::ending_now(Duration::from_secs(7200));
        assert_eq!(window.to - window.from, chrono::Duration::hours(2));
    }
}
