//! Clip download handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::debug;

use crate::error::ApiResult;
use crate::handlers::json_body;
use crate::services::DownloadRequest;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub job_id: String,
    pub download_url: String,
}

/// Download a source or a clip of it, answering once the file is ready.
///
/// The tool process is killed if the client goes away before it finishes.
pub async fn start_download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<Json<DownloadResponse>> {
    let request = json_body(payload)?;

    let outcome = state
        .clips
        .download(&request, None, |line| debug!(target: "clipfetch::tool", "{}", line))
        .await?;

    Ok(Json(DownloadResponse {
        job_id: outcome.job_id.to_string(),
        download_url: outcome.download_url,
    }))
}
