//! Encoding options offered for a source.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Format id that lets the external tool pick the best quality itself.
pub const BEST_FORMAT_ID: &str = "best";

/// Display label of the synthetic best-quality entry.
pub const BEST_FORMAT_LABEL: &str = "Best Quality (Default)";

/// Label used when the size of an option is not known.
pub const UNKNOWN_SIZE_LABEL: &str = "N/A";

/// One concrete audio/video encoding variant of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EncodingOption {
    /// Format id understood by the external tool
    pub id: String,
    /// Human readable label shown to the user
    pub display_label: String,
    /// Resolution label (e.g. "1280x720")
    pub resolution_label: String,
    /// Container / file extension (e.g. "mp4")
    pub container: String,
    /// Free-form note from the tool (e.g. "720p")
    pub note: String,
    /// Size in bytes, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl EncodingOption {
    /// Build an option, composing the display label from its parts.
    pub fn new(
        id: impl Into<String>,
        resolution_label: impl Into<String>,
        container: impl Into<String>,
        note: impl Into<String>,
        size_bytes: Option<u64>,
    ) -> Self {
        let resolution_label = resolution_label.into();
        let container = container.into();
        let note = note.into();
        let display_label = format!(
            "{} ({}) - {} [{}]",
            resolution_label,
            container,
            note,
            format_size(size_bytes)
        );

        Self {
            id: id.into(),
            display_label,
            resolution_label,
            container,
            note,
            size_bytes,
        }
    }

    /// The synthetic entry that defers quality selection to the tool.
    pub fn best() -> Self {
        Self {
            id: BEST_FORMAT_ID.to_string(),
            display_label: BEST_FORMAT_LABEL.to_string(),
            resolution_label: BEST_FORMAT_ID.to_string(),
            container: String::new(),
            note: String::new(),
            size_bytes: None,
        }
    }

    /// Whether this is the best-quality sentinel.
    pub fn is_best(&self) -> bool {
        self.id == BEST_FORMAT_ID
    }
}

/// Render a byte count in mebibytes with two decimals, or "N/A".
pub fn format_size(size_bytes: Option<u64>) -> String {
    match size_bytes {
        Some(bytes) if bytes > 0 => format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0)),
        _ => UNKNOWN_SIZE_LABEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_label() {
        let option = EncodingOption::new("22", "1280x720", "mp4", "720p", Some(10 * 1024 * 1024));
        assert_eq!(option.display_label, "1280x720 (mp4) - 720p [10.00 MB]");

        let unknown = EncodingOption::new("sd", "sd", "mp4", "", None);
        assert_eq!(unknown.display_label, "sd (mp4) -  [N/A]");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(None), "N/A");
        assert_eq!(format_size(Some(0)), "N/A");
        assert_eq!(format_size(Some(1_572_864)), "1.50 MB");
    }

    #[test]
    fn test_best_sentinel() {
        let best = EncodingOption::best();
        assert!(best.is_best());
        assert_eq!(best.display_label, BEST_FORMAT_LABEL);
        assert!(!EncodingOption::new("18", "640x360", "mp4", "", None).is_best());
    }
}
