use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// RFC 3339 rendering for log fields; `-` when the backend omitted the value.
pub(crate) fn format_timestamp(value: Option<OffsetDateTime>) -> String {
    match value {
        Some(value) => value.format(&Rfc3339).unwrap_or_else(|_| value.to_string()),
        None => "-".to_string(),
    }
}

/// Countdown label for a timed attempt, `mm:ss` or `h:mm:ss`.
pub(crate) fn format_countdown(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (hours, minutes, secs) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}
