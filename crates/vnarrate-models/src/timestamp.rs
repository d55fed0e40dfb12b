//! Timestamp parsing and subtitle formatting.
//!
//! Parses user-supplied offsets (`HH:MM:SS`, `HH:MM:SS.mmm`, `MM:SS`, `SS`)
//! and renders cue timestamps for SRT (`HH:MM:SS,mmm`) and WebVTT
//! (`HH:MM:SS.mmm`).

use thiserror::Error;

/// Parse a timestamp string to total seconds.
///
/// # Examples
/// ```
/// use vnarrate_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    let names: &[&'static str] = match parts.len() {
        1 => &["seconds"],
        2 => &["minutes", "seconds"],
        3 => &["hours", "minutes", "seconds"],
        _ => return Err(TimestampError::InvalidFormat(ts.to_string())),
    };

    let mut total = 0.0;
    for (part, name) in parts.iter().zip(names) {
        let value: f64 = part
            .parse()
            .map_err(|_| TimestampError::InvalidValue(*name, part.to_string()))?;
        if !value.is_finite() {
            return Err(TimestampError::InvalidValue(*name, part.to_string()));
        }
        if value < 0.0 {
            return Err(TimestampError::Negative);
        }
        total = total * 60.0 + value;
    }

    Ok(total)
}

/// Split seconds into `(hours, minutes, seconds, millis)`.
///
/// Milliseconds are rounded from the total so a value like 1.9996 becomes
/// `00:00:02,000` rather than `00:00:01,1000`.
fn split_millis(total_secs: f64) -> (u64, u64, u64, u64) {
    let total_ms = (total_secs.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    (total_s / 3600, (total_s / 60) % 60, total_s % 60, ms)
}

/// Format seconds as an SRT cue timestamp, `HH:MM:SS,mmm`.
pub fn format_srt_timestamp(total_secs: f64) -> String {
    let (h, m, s, ms) = split_millis(total_secs);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// Format seconds as a WebVTT cue timestamp, `HH:MM:SS.mmm`.
pub fn format_vtt_timestamp(total_secs: f64) -> String {
    let (h, m, s, ms) = split_millis(total_secs);
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Timestamp cannot be negative")]
    Negative,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS, HH:MM:SS.mmm, MM:SS, or SS")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_hh_mm_ss() {
        assert_eq!(parse_timestamp("00:00:00").unwrap(), 0.0);
        assert_eq!(parse_timestamp("01:30:45").unwrap(), 5445.0);
    }

    #[test]
    fn test_parse_timestamp_short_forms() {
        assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
        assert_eq!(parse_timestamp("90").unwrap(), 90.0);
        assert!((parse_timestamp("00:00:30.500").unwrap() - 30.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_timestamp_errors() {
        assert!(matches!(parse_timestamp(""), Err(TimestampError::Empty)));
        assert!(matches!(parse_timestamp("abc"), Err(TimestampError::InvalidValue(_, _))));
        assert!(matches!(parse_timestamp("1:2:3:4"), Err(TimestampError::InvalidFormat(_))));
        assert!(matches!(parse_timestamp("-5"), Err(TimestampError::Negative)));
    }

    #[test]
    fn test_format_srt_timestamp() {
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_srt_timestamp(2.5), "00:00:02,500");
        assert_eq!(format_srt_timestamp(3661.042), "01:01:01,042");
    }

    #[test]
    fn test_format_rounds_into_next_second() {
        assert_eq!(format_srt_timestamp(1.9996), "00:00:02,000");
        assert_eq!(format_vtt_timestamp(59.9999), "00:01:00.000");
    }

    #[test]
    fn test_format_vtt_timestamp() {
        assert_eq!(format_vtt_timestamp(75.25), "00:01:15.250");
    }
}
