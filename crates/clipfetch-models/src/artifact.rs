//! Produced media files awaiting handoff.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A media file produced by a successful clip job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Absolute or output-dir-relative path on disk
    pub path: PathBuf,
    /// File name within the output directory
    pub file_name: String,
    /// When the artifact was claimed
    pub created_at: DateTime<Utc>,
    /// Size on disk in bytes
    pub size_bytes: u64,
}

impl Artifact {
    /// File extension, if any.
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }

    /// MIME type guessed from the file extension.
    pub fn content_type(&self) -> &'static str {
        match self
            .extension()
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("mp4") | Some("m4v") => "video/mp4",
            Some("webm") => "video/webm",
            Some("mkv") => "video/x-matroska",
            Some("mov") => "video/quicktime",
            Some("flv") => "video/x-flv",
            Some("3gp") => "video/3gpp",
            Some("m4a") => "audio/mp4",
            Some("mp3") => "audio/mpeg",
            Some("opus") | Some("ogg") => "audio/ogg",
            _ => "application/octet-stream",
        }
    }
}
