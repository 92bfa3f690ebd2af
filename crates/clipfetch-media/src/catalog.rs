//! Format catalog built from a yt-dlp metadata query.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use clipfetch_models::{
    format_duration_label, EncodingOption, MediaMetadata, FALLBACK_DURATION_SECS, UNKNOWN_TITLE,
};

use crate::command::{ToolRunner, YtDlpCommand};
use crate::config::ToolConfig;
use crate::error::{MediaError, MediaResult};

/// Codec marker yt-dlp uses for a missing stream.
const ABSENT_CODEC: &str = "none";

/// yt-dlp `-J` output, reduced to the fields we read.
#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    duration: Option<f64>,
    duration_string: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    resolution: Option<String>,
    width: Option<f64>,
    height: Option<f64>,
    ext: Option<String>,
    format_note: Option<String>,
    filesize: Option<f64>,
}

impl RawFormat {
    /// Whether audio or video is explicitly marked as missing.
    ///
    /// Unknown markers count as present so ambiguous formats stay visible.
    fn lacks_a_stream(&self) -> bool {
        self.vcodec.as_deref() == Some(ABSENT_CODEC) || self.acodec.as_deref() == Some(ABSENT_CODEC)
    }

    fn resolution_label(&self, id: &str) -> String {
        match self.resolution.as_deref().map(str::trim) {
            Some(res) if !res.is_empty() && res != "unknown" => res.to_string(),
            _ => match (positive(self.width), positive(self.height)) {
                (Some(w), Some(h)) => format!("{}x{}", w, h),
                _ => id.to_string(),
            },
        }
    }

    fn into_option(self) -> Option<EncodingOption> {
        let id = self.format_id.clone().filter(|id| !id.trim().is_empty())?;
        let resolution = self.resolution_label(&id);

        Some(EncodingOption::new(
            id,
            resolution,
            self.ext.unwrap_or_default(),
            self.format_note.unwrap_or_default(),
            positive(self.filesize),
        ))
    }
}

fn positive(value: Option<f64>) -> Option<u64> {
    value.filter(|v| v.is_finite() && *v >= 1.0).map(|v| v as u64)
}

/// Resolves the encodings available for a URL.
#[derive(Debug, Clone)]
pub struct FormatCatalog {
    config: Arc<ToolConfig>,
}

impl FormatCatalog {
    /// Create a catalog using the given tool configuration.
    pub fn new(config: Arc<ToolConfig>) -> Self {
        Self { config }
    }

    /// Query the tool for `url` and build its catalog.
    ///
    /// # Errors
    ///
    /// - [`MediaError::RemoteQuery`] when the tool exits non-zero (stderr verbatim)
    /// - [`MediaError::MetadataParse`] when stdout is not valid metadata JSON
    /// - [`MediaError::Invocation`] when the tool cannot be started
    pub async fn resolve(&self, url: &str) -> MediaResult<MediaMetadata> {
        let cmd = YtDlpCommand::from_config(&self.config).dump_json().url(url);

        info!(url = %url, "Querying available formats");

        let output = ToolRunner::new().run(&cmd).await?;

        if !output.status.success() {
            warn!(
                url = %url,
                exit_code = ?output.status.code(),
                "Metadata query failed"
            );
            debug!("yt-dlp stderr: {}", output.stderr);
            return Err(MediaError::remote_query(output.stderr, output.status.code()));
        }

        let metadata = parse_metadata(&output.stdout())?;

        info!(
            url = %url,
            title = %metadata.title,
            duration_secs = metadata.duration_seconds,
            options = metadata.options.len(),
            "Resolved formats"
        );

        Ok(metadata)
    }
}

/// Build a catalog from yt-dlp `-J` JSON.
///
/// Drops formats missing audio or video, ranks the rest by size (largest
/// first, unknown last, otherwise in source order) and prepends the
/// best-quality sentinel.
pub fn parse_metadata(json: &str) -> MediaResult<MediaMetadata> {
    let raw: RawInfo = serde_json::from_str(json)?;

    let total = raw.formats.len();
    let mut options: Vec<EncodingOption> = raw
        .formats
        .into_iter()
        .filter(|f| !f.lacks_a_stream())
        .filter_map(RawFormat::into_option)
        .collect();

    debug!("Kept {} of {} formats", options.len(), total);

    // Stable sort keeps source order among equal and unknown sizes
    options.sort_by(|a, b| b.size_bytes.unwrap_or(0).cmp(&a.size_bytes.unwrap_or(0)));
    options.insert(0, EncodingOption::best());

    // Sub-second durations truncate to zero, so they count as unknown too
    let duration_seconds = match raw.duration {
        Some(d) if d.is_finite() && d >= 1.0 => d as u64,
        _ => FALLBACK_DURATION_SECS,
    };

    let duration_label = raw
        .duration_string
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format_duration_label(duration_seconds));

    let title = raw
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    Ok(MediaMetadata {
        title,
        duration_seconds,
        duration_label,
        options,
    })
}
