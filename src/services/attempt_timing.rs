use time::{Duration, OffsetDateTime};

/// Deadline of a timed attempt; `None` when the quiz has no duration or the
/// start time is unknown (e.g. a resumed attempt whose start the roster omits).
pub fn attempt_deadline(
    started_at: Option<OffsetDateTime>,
    duration_minutes: Option<u32>,
) -> Option<OffsetDateTime> {
    let started_at = started_at?;
    let duration = duration_minutes.filter(|minutes| *minutes > 0)?;
    Some(started_at + Duration::minutes(i64::from(duration)))
}

/// Seconds left before the deadline, floored at zero.
pub fn remaining_seconds(deadline: OffsetDateTime, now: OffsetDateTime) -> i64 {
    let remaining = (deadline - now).whole_seconds();
    if remaining < 0 {
        0
    } else {
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn deadline_adds_duration() {
        let started = datetime!(2025-03-01 12:00 UTC);
        assert_eq!(attempt_deadline(Some(started), Some(30)), Some(datetime!(2025-03-01 12:30 UTC)));
    }

    #[test]
    fn untimed_or_unknown_start_has_no_deadline() {
        let started = datetime!(2025-03-01 12:00 UTC);
        assert_eq!(attempt_deadline(Some(started), None), None);
        assert_eq!(attempt_deadline(Some(started), Some(0)), None);
        assert_eq!(attempt_deadline(None, Some(30)), None);
    }

    #[test]
    fn remaining_is_floored_at_zero() {
        let deadline = datetime!(2025-03-01 12:30 UTC);
        assert_eq!(remaining_seconds(deadline, datetime!(2025-03-01 12:29 UTC)), 60);
        assert_eq!(remaining_seconds(deadline, datetime!(2025-03-01 13:00 UTC)), 0);
    }
}
