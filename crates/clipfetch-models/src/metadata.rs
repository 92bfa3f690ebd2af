//! Source media metadata returned by a catalog query.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::encoding::EncodingOption;

/// Duration assumed when the source does not report one.
///
/// One hour minus a one-second margin. This is a policy for "unknown but
/// probably bounded" sources, not a measurement.
pub const FALLBACK_DURATION_SECS: u64 = 3599;

/// Title used when the source does not report one.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Metadata for a single source URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    /// Source title
    pub title: String,
    /// Duration in whole seconds (fallback applied when unknown)
    pub duration_seconds: u64,
    /// Human readable duration ("mm:ss" or "h:mm:ss")
    pub duration_label: String,
    /// Selectable options, best-quality sentinel first
    pub options: Vec<EncodingOption>,
}
