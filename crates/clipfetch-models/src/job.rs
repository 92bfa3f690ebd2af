//! Clip job definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::clip::ClipRange;
use crate::encoding::BEST_FORMAT_ID;

/// Unique identifier for a clip job.
///
/// Also the file name prefix of the job's artifact, so it must never contain
/// path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single download/clip request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClipJob {
    /// Correlation key between the tool process and its artifact
    pub id: JobId,
    /// Source URL
    pub source_url: String,
    /// Selected format id, or "best"
    pub format_id: String,
    /// Requested range; `None` fetches the full source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<ClipRange>,
}

impl ClipJob {
    /// Create a job with the given id.
    ///
    /// A blank format id falls back to "best".
    pub fn new(
        id: JobId,
        source_url: impl Into<String>,
        format_id: impl Into<String>,
        range: Option<ClipRange>,
    ) -> Self {
        let format_id = format_id.into();
        let format_id = if format_id.trim().is_empty() {
            BEST_FORMAT_ID.to_string()
        } else {
            format_id
        };

        Self {
            id,
            source_url: source_url.into(),
            format_id,
            range,
        }
    }

    /// Whether only a section of the source is requested.
    pub fn is_clip(&self) -> bool {
        self.range.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_ids_are_unique() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
        assert!(!a.as_str().contains('/'));
    }

    #[test]
    fn test_blank_format_defaults_to_best() {
        let job = ClipJob::new(JobId::new(), "https://example.com/v", "  ", None);
        assert_eq!(job.format_id, BEST_FORMAT_ID);
        assert!(!job.is_clip());

        let job = ClipJob::new(
            JobId::new(),
            "https://example.com/v",
            "22",
            Some(ClipRange::new(0, Some(5))),
        );
        assert_eq!(job.format_id, "22");
        assert!(job.is_clip());
    }
}
