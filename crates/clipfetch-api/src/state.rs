//! Application state.

use std::sync::Arc;

use clipfetch_media::{ArtifactStore, FetchInvoker, FormatCatalog};

use crate::config::ApiConfig;
use crate::services::ClipService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub artifacts: ArtifactStore,
    pub clips: ClipService,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig) -> Self {
        let tool = Arc::new(config.tool.clone());
        let artifacts = ArtifactStore::new(&tool.output_dir);

        let clips = ClipService::new(
            FormatCatalog::new(Arc::clone(&tool)),
            FetchInvoker::new(tool),
            artifacts.clone(),
        );

        Self {
            config,
            artifacts,
            clips,
        }
    }
}
