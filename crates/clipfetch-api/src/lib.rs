//! Axum HTTP/WS API server.
//!
//! This crate provides:
//! - Format listing and clip downloads backed by yt-dlp
//! - Artifact delivery with deferred cleanup
//! - Live download output over WebSocket
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{ArtifactJanitor, ClipService};
pub use state::AppState;
