// src/domain/lifecycle.rs

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Derived status of an assignment. Never stored, always computed from the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentState {
    Pending,
    Active,
    Overdue,
}

impl fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignmentState::Pending => "pending",
            AssignmentState::Active => "active",
            AssignmentState::Overdue => "overdue",
        };
        f.write_str(s)
    }
}

/// Evaluates the lifecycle state of the window `[start, end]` at `now`.
///
/// Both bounds are inclusive: exactly `start` and exactly `end` are `Active`.
pub fn evaluate(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> AssignmentState {
    if now < start {
        AssignmentState::Pending
    } else if now > end {
        AssignmentState::Overdue
    } else {
        AssignmentState::Active
    }
}

/// Rejects anything but an active window.
///
/// `now` must come from the server clock; client timestamps are never consulted.
pub fn ensure_open(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    match evaluate(start, end, now) {
        AssignmentState::Active => Ok(()),
        state => Err(DomainError::WindowClosed(state)),
    }
}

/// Time left until the window closes, or `None` unless the assignment is active.
pub fn time_remaining(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<Duration> {
    match evaluate(start, end, now) {
        AssignmentState::Active => Some(end - now),
        _ => None,
    }
}

/// Rejects windows whose end is not strictly after their start.
pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), DomainError> {
    if end <= start {
        return Err(DomainError::Validation(vec![super::error::FieldError::new(
            "endDate",
            "End date and time must be after start date and time",
        )]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        (start, start + Duration::hours(2))
    }

    #[test]
    fn test_before_start_is_pending() {
        let (start, end) = window();
        let now = start - Duration::minutes(1);
        assert_eq!(evaluate(start, end, now), AssignmentState::Pending);
        assert_eq!(
            ensure_open(start, end, now),
            Err(DomainError::WindowClosed(AssignmentState::Pending))
        );
    }

    #[test]
    fn test_boundaries_are_active() {
        let (start, end) = window();
        assert_eq!(evaluate(start, end, start), AssignmentState::Active);
        assert_eq!(evaluate(start, end, end), AssignmentState::Active);
        assert_eq!(
            evaluate(start, end, start + Duration::hours(1)),
            AssignmentState::Active
        );
    }

    #[test]
    fn test_one_tick_past_end_is_overdue() {
        let (start, end) = window();
        let now = end + Duration::nanoseconds(1);
        assert_eq!(evaluate(start, end, now), AssignmentState::Overdue);
        assert_eq!(
            ensure_open(start, end, start + Duration::hours(3)),
            Err(DomainError::WindowClosed(AssignmentState::Overdue))
        );
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let (start, end) = window();
        let now = start + Duration::minutes(30);
        let first = evaluate(start, end, now);
        for _ in 0..10 {
            assert_eq!(evaluate(start, end, now), first);
        }
    }

    #[test]
    fn test_time_remaining_only_while_active() {
        let (start, end) = window();
        assert_eq!(
            time_remaining(start, end, start + Duration::minutes(30)),
            Some(Duration::minutes(90))
        );
        assert_eq!(time_remaining(start, end, start - Duration::seconds(1)), None);
        assert_eq!(time_remaining(start, end, end + Duration::seconds(1)), None);
        assert_eq!(time_remaining(start, end, end), Some(Duration::zero()));
    }

    #[test]
    fn test_window_must_end_after_start() {
        let (start, end) = window();
        assert!(validate_window(start, end).is_ok());
        assert!(validate_window(start, start).is_err());
        assert!(matches!(
            validate_window(end, start),
            Err(DomainError::Validation(fields)) if fields[0].field == "endDate"
        ));
    }
}
