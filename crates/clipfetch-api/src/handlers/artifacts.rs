//! Artifact delivery handler.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::is_valid_artifact_name;
use crate::state::AppState;

/// Stream a produced file as an attachment and schedule its deletion.
pub async fn serve_artifact(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    if !is_valid_artifact_name(&filename) {
        warn!(file = %filename, "Rejected artifact name");
        return Err(ApiError::not_found("File not found"));
    }

    let artifact = state
        .artifacts
        .locate(&filename)
        .await
        .map_err(|_| ApiError::not_found("File not found"))?;

    let file = tokio::fs::File::open(&artifact.path)
        .await
        .map_err(|_| ApiError::not_found("File not found"))?;

    state
        .artifacts
        .schedule_cleanup(&artifact, state.config.artifact_cleanup_delay)
        .await;
    metrics::record_artifact_served();
    debug!(file = %artifact.file_name, size_bytes = artifact.size_bytes, "Serving artifact");

    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.content_type().to_string()),
            (header::CONTENT_LENGTH, artifact.size_bytes.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.file_name),
            ),
        ],
        body,
    )
        .into_response())
}
