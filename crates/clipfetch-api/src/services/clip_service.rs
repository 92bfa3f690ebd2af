//! Format lookup and clip download flow shared by the HTTP and WebSocket
//! surfaces.

use std::time::Instant;

use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use validator::Validate;

use clipfetch_media::{ArtifactStore, FetchInvoker, FormatCatalog, MediaResult};
use clipfetch_models::{
    parse_optional_timecode, validate_clip_range, Artifact, ClipJob, ClipRange, JobId, MediaMetadata,
};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::validate_source_url;

/// Route prefix under which artifacts are served.
pub const ARTIFACT_ROUTE_PREFIX: &str = "/api/artifacts";

/// Body of a download request.
///
/// Accepts camelCase fields and their snake_case spellings.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "URL is required"))]
    pub url: String,
    #[serde(default, alias = "format_id")]
    pub format_id: Option<String>,
    #[serde(default, alias = "start_time")]
    pub start_time: Option<String>,
    #[serde(default, alias = "end_time")]
    pub end_time: Option<String>,
}

/// A finished download.
#[derive(Debug, Clone)]
pub struct ClipOutcome {
    pub job_id: JobId,
    pub artifact: Artifact,
    pub download_url: String,
}

/// URL under which `artifact` can be fetched.
pub fn download_url_for(artifact: &Artifact) -> String {
    format!("{}/{}", ARTIFACT_ROUTE_PREFIX, artifact.file_name)
}

/// Orchestrates catalog queries, range validation, the tool run and the
/// artifact handoff.
#[derive(Clone)]
pub struct ClipService {
    catalog: FormatCatalog,
    invoker: FetchInvoker,
    artifacts: ArtifactStore,
}

impl ClipService {
    pub fn new(catalog: FormatCatalog, invoker: FetchInvoker, artifacts: ArtifactStore) -> Self {
        Self {
            catalog,
            invoker,
            artifacts,
        }
    }

    /// Resolve the encodings available for `url`.
    pub async fn resolve_formats(&self, url: &str) -> ApiResult<MediaMetadata> {
        let url = checked_url(url)?;
        let start = Instant::now();

        let result = self.catalog.resolve(&url).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.reason(),
        };
        metrics::record_format_query(outcome, start.elapsed().as_secs_f64());

        result.map_err(ApiError::from)
    }

    /// Validate `request` and build the job it describes.
    ///
    /// Time parsing and ordering are checked before any remote query. The
    /// duration bounds need metadata, so a clip request costs one catalog
    /// lookup; full downloads skip it.
    pub async fn prepare(&self, request: &DownloadRequest) -> ApiResult<ClipJob> {
        request.validate()?;
        let url = checked_url(&request.url)?;

        let start = parse_optional_timecode(request.start_time.as_deref())?;
        let end = parse_optional_timecode(request.end_time.as_deref())?;
        let range = ClipRange::from_bounds(start, end);

        if let Some(range) = &range {
            range.check_order()?;

            let metadata = self.catalog.resolve(&url).await?;
            validate_clip_range(Some(range), metadata.duration_seconds)?;
            debug!(
                duration_secs = metadata.duration_seconds,
                section = ?range.section_arg(),
                "Clip range accepted"
            );
        }

        Ok(ClipJob::new(
            self.artifacts.allocate(),
            url,
            request.format_id.clone().unwrap_or_default(),
            range,
        ))
    }

    /// Run a download request end to end.
    ///
    /// Every stdout line of the tool is handed to `on_line` as it arrives.
    pub async fn download<F>(
        &self,
        request: &DownloadRequest,
        cancel: Option<watch::Receiver<bool>>,
        on_line: F,
    ) -> ApiResult<ClipOutcome>
    where
        F: FnMut(&str) + Send + 'static,
    {
        let job = self.prepare(request).await?;
        let started = Instant::now();

        let result: MediaResult<Artifact> = async {
            let output = self.invoker.run_with_progress(&job, cancel, on_line).await?;
            self.artifacts
                .claim(&job.id, output.reported_path.as_deref())
                .await
        }
        .await;

        let artifact = match result {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(job_id = %job.id, reason = e.reason(), "Clip job failed");
                metrics::record_download_failed(e.reason());
                return Err(ApiError::from(e));
            }
        };

        metrics::record_download_completed(job.is_clip(), started.elapsed().as_secs_f64());
        info!(
            job_id = %job.id,
            file = %artifact.file_name,
            size_bytes = artifact.size_bytes,
            "Clip job completed"
        );

        Ok(ClipOutcome {
            download_url: download_url_for(&artifact),
            job_id: job.id,
            artifact,
        })
    }
}

fn checked_url(url: &str) -> ApiResult<String> {
    if url.trim().is_empty() {
        return Err(ApiError::Validation("URL is required".to_string()));
    }
    validate_source_url(url)
        .into_result()
        .map_err(ApiError::Validation)
}
