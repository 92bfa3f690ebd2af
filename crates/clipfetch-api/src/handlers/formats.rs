//! Format catalog handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use clipfetch_models::{EncodingOption, MediaMetadata};

use crate::error::ApiResult;
use crate::handlers::json_body;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct FormatsRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "URL is required"))]
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatsResponse {
    pub title: String,
    pub duration_seconds: u64,
    pub duration_label: String,
    pub options: Vec<FormatOption>,
}

#[derive(Debug, Serialize)]
pub struct FormatOption {
    pub id: String,
    pub display: String,
}

impl From<EncodingOption> for FormatOption {
    fn from(option: EncodingOption) -> Self {
        Self {
            id: option.id,
            display: option.display_label,
        }
    }
}

impl From<MediaMetadata> for FormatsResponse {
    fn from(metadata: MediaMetadata) -> Self {
        Self {
            title: metadata.title,
            duration_seconds: metadata.duration_seconds,
            duration_label: metadata.duration_label,
            options: metadata.options.into_iter().map(FormatOption::from).collect(),
        }
    }
}

/// List the selectable encodings of a source.
pub async fn list_formats(
    State(state): State<AppState>,
    payload: Result<Json<FormatsRequest>, JsonRejection>,
) -> ApiResult<Json<FormatsResponse>> {
    let request = json_body(payload)?;
    request.validate()?;

    let metadata = state.clips.resolve_formats(&request.url).await?;
    Ok(Json(metadata.into()))
}
