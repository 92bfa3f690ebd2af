//! Error types for media operations.

use thiserror::Error;

use clipfetch_models::{ClipRangeError, TimecodeError};

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while resolving formats or fetching clips.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0}")]
    InvalidTimeFormat(#[from] TimecodeError),

    #[error("{0}")]
    InvalidRange(#[from] ClipRangeError),

    /// Metadata query exited non-zero. Carries the tool's stderr verbatim.
    #[error("{stderr}")]
    RemoteQuery {
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("Failed to parse metadata from yt-dlp: {0}")]
    MetadataParse(String),

    /// Download exited non-zero. Carries the tool's stderr verbatim.
    #[error("{stderr}")]
    ExternalToolFailure {
        stderr: String,
        exit_code: Option<i32>,
    },

    /// The tool could not be started at all.
    #[error("Failed to run yt-dlp: {0}")]
    Invocation(String),

    #[error("Download failed, file not found for job {0}")]
    ArtifactNotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a remote query failure, substituting a message for empty stderr.
    pub fn remote_query(stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        let stderr = stderr.into();
        let stderr = if stderr.trim().is_empty() {
            "Unknown error fetching formats".to_string()
        } else {
            stderr
        };
        Self::RemoteQuery { stderr, exit_code }
    }

    /// Create an external tool failure.
    pub fn tool_failed(stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::ExternalToolFailure {
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Create an invocation error.
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::Invocation(message.into())
    }

    /// Whether the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidTimeFormat(_) | Self::InvalidRange(_))
    }

    /// Short machine-readable reason, used as a metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidTimeFormat(_) => "invalid_time_format",
            Self::InvalidRange(ClipRangeError::RangeNotIncreasing { .. }) => "range_not_increasing",
            Self::InvalidRange(ClipRangeError::StartExceedsDuration { .. }) => "start_exceeds_duration",
            Self::InvalidRange(ClipRangeError::EndExceedsDuration { .. }) => "end_exceeds_duration",
            Self::RemoteQuery { .. } => "remote_query",
            Self::MetadataParse(_) => "metadata_parse",
            Self::ExternalToolFailure { .. } => "external_tool_failure",
            Self::Invocation(_) => "invocation",
            Self::ArtifactNotFound(_) => "artifact_not_found",
            Self::Cancelled => "cancelled",
            Self::Timeout(_) => "timeout",
            Self::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for MediaError {
    fn from(e: serde_json::Error) -> Self {
        Self::MetadataParse(e.to_string())
    }
}
