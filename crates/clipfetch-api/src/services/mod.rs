//! Business logic services.

pub mod artifact_janitor;
pub mod clip_service;

pub use artifact_janitor::ArtifactJanitor;
pub use clip_service::{download_url_for, ClipOutcome, ClipService, DownloadRequest};
