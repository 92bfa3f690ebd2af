//! Time code parsing for clip boundaries.
//!
//! User supplied clip boundaries come in as `SS`, `MM:SS` or `HH:MM:SS`.
//! Every segment is a whole, non-negative number; the rightmost segment is
//! always seconds.

use thiserror::Error;

/// Time code parsing error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimecodeError {
    /// The input does not match `SS`, `MM:SS` or `HH:MM:SS`.
    #[error("Invalid time format '{0}'. Use SS, MM:SS or HH:MM:SS")]
    InvalidTimeFormat(String),
}

/// Parse a time code into total seconds.
///
/// Supports formats:
/// - `HH:MM:SS`
/// - `MM:SS`
/// - `SS`
///
/// # Examples
/// ```
/// use clipfetch_models::timecode::parse_timecode;
/// assert_eq!(parse_timecode("1:02:03").unwrap(), 3723);
/// assert_eq!(parse_timecode("02:05").unwrap(), 125);
/// assert_eq!(parse_timecode("90").unwrap(), 90);
/// ```
pub fn parse_timecode(input: &str) -> Result<u64, TimecodeError> {
    let trimmed = input.trim();
    let invalid = || TimecodeError::InvalidTimeFormat(trimmed.to_string());

    if trimmed.is_empty() {
        return Err(invalid());
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return Err(invalid());
    }

    // Rightmost segment is seconds, then minutes, then hours.
    let mut total: u64 = 0;
    for (part, multiplier) in parts.iter().rev().zip([1u64, 60, 3600]) {
        let value = parse_segment(part).ok_or_else(invalid)?;
        total = value
            .checked_mul(multiplier)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
    }

    Ok(total)
}

/// Parse an optional time code.
///
/// Absent or blank input means "unspecified" and yields `Ok(None)`.
pub fn parse_optional_timecode(input: Option<&str>) -> Result<Option<u64>, TimecodeError> {
    match input.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_timecode(s).map(Some),
    }
}

fn parse_segment(segment: &str) -> Option<u64> {
    // `u64::from_str` accepts a leading '+', which is not a valid time code.
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Render seconds as `h:mm:ss`, or `mm:ss` when under an hour.
pub fn format_duration_label(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}
