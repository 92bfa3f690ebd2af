//! Shared data models for the ClipFetch service.
//!
//! This crate provides Serde-serializable types for:
//! - Encoding options and source metadata
//! - Clip ranges, time codes and range validation
//! - Clip jobs and produced artifacts
//! - WebSocket message schemas

pub mod artifact;
pub mod clip;
pub mod encoding;
pub mod job;
pub mod metadata;
pub mod timecode;
pub mod ws;

// Re-export common types
pub use artifact::Artifact;
pub use clip::{validate_clip_range, ClipRange, ClipRangeError, END_GRACE_SECS};
pub use encoding::{format_size, EncodingOption, BEST_FORMAT_ID, BEST_FORMAT_LABEL};
pub use job::{ClipJob, JobId};
pub use metadata::{MediaMetadata, FALLBACK_DURATION_SECS, UNKNOWN_TITLE};
pub use timecode::{format_duration_label, parse_optional_timecode, parse_timecode, TimecodeError};
pub use ws::{WsMessage, WsMessageType};
