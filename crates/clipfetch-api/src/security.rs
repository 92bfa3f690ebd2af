//! Security utilities for input validation.
//!
//! This module provides:
//! - Source URL validation (SSRF protection)
//! - Artifact file name validation

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::Url;

/// Maximum URL length to prevent DoS attacks.
pub const MAX_URL_LENGTH: usize = 2048;

/// Maximum artifact file name length.
const MAX_FILE_NAME_LENGTH: usize = 256;

/// Blocked URL patterns (internal hosts and metadata endpoints).
static BLOCKED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^https?://127\.",
        r"^https?://localhost",
        r"^https?://0\.0\.0\.0",
        r"^https?://10\.",
        r"^https?://172\.(1[6-9]|2[0-9]|3[0-1])\.",
        r"^https?://192\.168\.",
        r"^https?://169\.254\.",
        r"^https?://\[::1\]",
        r"^https?://\[fd",
        r"^https?://\[fe80",
        r"^https?://metadata\.",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Result of URL validation.
#[derive(Debug)]
pub enum UrlValidationResult {
    /// URL is valid and allowed.
    Valid(String),
    /// URL is malformed or uses an unsupported protocol.
    Invalid(String),
    /// URL matches a blocked pattern (e.g., internal IPs).
    Blocked(String),
    /// URL exceeds maximum length.
    TooLong,
}

impl UrlValidationResult {
    /// Convert to Result for easy error handling.
    pub fn into_result(self) -> Result<String, String> {
        match self {
            Self::Valid(url) => Ok(url),
            Self::Invalid(msg) | Self::Blocked(msg) => Err(msg),
            Self::TooLong => Err(format!(
                "URL exceeds maximum length of {} characters",
                MAX_URL_LENGTH
            )),
        }
    }
}

/// Validate a source URL before handing it to the external tool.
///
/// Any public http(s) host is accepted; the tool decides whether it can
/// extract media from it.
pub fn validate_source_url(url: &str) -> UrlValidationResult {
    if url.len() > MAX_URL_LENGTH {
        return UrlValidationResult::TooLong;
    }

    let url = url.trim();
    if url.is_empty() {
        return UrlValidationResult::Invalid("URL is required".to_string());
    }

    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(e) => return UrlValidationResult::Invalid(format!("Invalid URL format: {}", e)),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return UrlValidationResult::Invalid(format!(
                "Invalid protocol '{}'. Only HTTP and HTTPS are allowed.",
                scheme
            ))
        }
    }

    if parsed.host_str().is_none() {
        return UrlValidationResult::Invalid("URL must have a valid host".to_string());
    }

    let lowered = url.to_lowercase();
    if BLOCKED_PATTERNS.iter().any(|p| p.is_match(&lowered)) {
        warn!(url = %url, "Blocked URL pattern detected");
        return UrlValidationResult::Blocked(
            "URL appears to target an internal or restricted endpoint".to_string(),
        );
    }

    UrlValidationResult::Valid(url.to_string())
}

/// Validate an artifact file name from a request path.
///
/// Allows alphanumerics, hyphens, underscores and dots. No path traversal.
pub fn is_valid_artifact_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_FILE_NAME_LENGTH || name.starts_with('.') {
        return false;
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_urls_are_valid() {
        assert!(matches!(
            validate_source_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            UrlValidationResult::Valid(_)
        ));
        assert!(matches!(
            validate_source_url("  https://vimeo.com/123456789 "),
            UrlValidationResult::Valid(u) if u == "https://vimeo.com/123456789"
        ));
        assert!(matches!(
            validate_source_url("https://example.org/some/page"),
            UrlValidationResult::Valid(_)
        ));
    }

    #[test]
    fn test_blocked_internal_hosts() {
        for url in [
            "http://127.0.0.1/video.mp4",
            "http://localhost:8080/video.mp4",
            "http://192.168.1.1/video.mp4",
            "http://169.254.169.254/latest/meta-data/",
            "http://[::1]/x",
        ] {
            assert!(
                matches!(validate_source_url(url), UrlValidationResult::Blocked(_)),
                "{} should be blocked",
                url
            );
        }
    }

    #[test]
    fn test_invalid_urls() {
        assert!(matches!(validate_source_url(""), UrlValidationResult::Invalid(_)));
        assert!(matches!(
            validate_source_url("ftp://example.com/video"),
            UrlValidationResult::Invalid(_)
        ));
        assert!(matches!(
            validate_source_url("javascript:alert(1)"),
            UrlValidationResult::Invalid(_)
        ));
        assert!(matches!(
            validate_source_url(&format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH))),
            UrlValidationResult::TooLong
        ));
    }

    #[test]
    fn test_artifact_name_validation() {
        assert!(is_valid_artifact_name("3f2b1c9e-1d2a-4c3b-9a8f-0e1d2c3b4a5f.mp4"));
        assert!(is_valid_artifact_name("abc_My_Video_10-20_1700000000.webm"));
        assert!(!is_valid_artifact_name("../etc/passwd"));
        assert!(!is_valid_artifact_name("path/to/file.mp4"));
        assert!(!is_valid_artifact_name(".hidden"));
        assert!(!is_valid_artifact_name(""));
    }
}
