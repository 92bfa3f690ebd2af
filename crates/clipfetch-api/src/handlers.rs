//! Request handlers.

pub mod artifacts;
pub mod download;
pub mod formats;
pub mod health;

pub use artifacts::*;
pub use download::*;
pub use formats::*;
pub use health::*;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::{ApiError, ApiResult};

/// Unwrap a JSON body, turning extractor rejections into `{"error": ...}`.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}
