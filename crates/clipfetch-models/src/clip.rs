//! Clip ranges and their validation against a source duration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grace allowed past the reported duration for the end bound.
///
/// Reported durations are rounded, so an end time one second past the
/// duration still refers to the last frame.
pub const END_GRACE_SECS: u64 = 1;

/// A time-bounded sub-range of a source.
///
/// At least one bound is present. The ordering invariant `end > start` only
/// applies when both are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClipRange {
    /// Start offset in seconds; `None` when only an end was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_seconds: Option<u64>,
    /// End offset in seconds; `None` means "to the end of the source"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_seconds: Option<u64>,
}

impl ClipRange {
    /// Create a range from a start and an optional end.
    pub fn new(start_seconds: u64, end_seconds: Option<u64>) -> Self {
        Self {
            start_seconds: Some(start_seconds),
            end_seconds,
        }
    }

    /// Build a range from optional user bounds.
    ///
    /// Returns `None` when neither bound is given (full-source request).
    pub fn from_bounds(start: Option<u64>, end: Option<u64>) -> Option<Self> {
        match (start, end) {
            (None, None) => None,
            (start_seconds, end_seconds) => Some(Self {
                start_seconds,
                end_seconds,
            }),
        }
    }

    /// Effective start offset; the beginning of the source when unset.
    pub fn start(&self) -> u64 {
        self.start_seconds.unwrap_or(0)
    }

    /// Argument for the tool's `--download-sections` option.
    ///
    /// Open-ended ranges use `inf` as the end. An end-only range ending at
    /// zero selects no section, so the whole source is fetched.
    pub fn section_arg(&self) -> Option<String> {
        match (self.start_seconds, self.end_seconds) {
            (None, Some(0)) => None,
            (_, Some(end)) => Some(format!("*{}-{}", self.start(), end)),
            (_, None) => Some(format!("*{}-inf", self.start())),
        }
    }

    /// Check that a range with both bounds ends after it starts.
    ///
    /// Needs no source metadata, so it can run before any remote query.
    pub fn check_order(&self) -> Result<(), ClipRangeError> {
        match (self.start_seconds, self.end_seconds) {
            (Some(start), Some(end)) if end <= start => {
                Err(ClipRangeError::RangeNotIncreasing { start, end })
            }
            _ => Ok(()),
        }
    }
}

/// Reasons a clip range is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClipRangeError {
    #[error("End time must be greater than start time ({start}s >= {end}s)")]
    RangeNotIncreasing { start: u64, end: u64 },

    #[error("Start time exceeds video duration ({duration} seconds)")]
    StartExceedsDuration { start: u64, duration: u64 },

    #[error("End time exceeds video duration ({duration} seconds)")]
    EndExceedsDuration { end: u64, duration: u64 },
}

/// Validate an optional clip range against the source duration.
///
/// Ordering is checked first and does not depend on the duration. The end
/// bound gets [`END_GRACE_SECS`] of slack.
pub fn validate_clip_range(
    range: Option<&ClipRange>,
    duration_secs: u64,
) -> Result<(), ClipRangeError> {
    let Some(range) = range else {
        return Ok(());
    };

    range.check_order()?;

    if let Some(start) = range.start_seconds {
        if start > duration_secs {
            return Err(ClipRangeError::StartExceedsDuration {
                start,
                duration: duration_secs,
            });
        }
    }

    if let Some(end) = range.end_seconds {
        if end > duration_secs.saturating_add(END_GRACE_SECS) {
            return Err(ClipRangeError::EndExceedsDuration {
                end,
                duration: duration_secs,
            });
        }
    }

    Ok(())
}
