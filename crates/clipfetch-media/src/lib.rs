//! yt-dlp wrapper for format discovery and clip downloads.
//!
//! This crate provides:
//! - Type-safe yt-dlp command building
//! - Line-streaming process runner with cancellation and timeout
//! - Format catalog resolution from `-J` metadata
//! - Clip downloads with `--download-sections`
//! - Progress parsing from `--newline` output
//! - Artifact discovery and deferred cleanup

pub mod artifacts;
pub mod catalog;
pub mod command;
pub mod config;
pub mod download;
pub mod error;
pub mod progress;

pub use artifacts::{ArtifactStore, CleanupMode};
pub use catalog::{parse_metadata, FormatCatalog};
pub use command::{check_ytdlp, ToolOutput, ToolRunner, YtDlpCommand};
pub use config::{OutputNaming, ToolConfig, DEFAULT_OUTPUT_DIR, DEFAULT_TOOL};
pub use download::{FetchInvoker, FetchOutput};
pub use error::{MediaError, MediaResult};
pub use progress::{parse_progress_line, DownloadProgress};
