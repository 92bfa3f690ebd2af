//! yt-dlp progress line parsing.

use serde::{Deserialize, Serialize};

/// Progress information from a yt-dlp `[download]` line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Percentage complete (0-100)
    pub percent: f64,
    /// Total size as reported (e.g. "10.52MiB", may be an estimate)
    pub total: Option<String>,
    /// Current speed (e.g. "1.23MiB/s")
    pub speed: Option<String>,
    /// Remaining time (e.g. "00:05")
    pub eta: Option<String>,
}

impl DownloadProgress {
    /// Percentage rounded to a whole number, clamped to 0-100.
    pub fn percent_u8(&self) -> u8 {
        self.percent.clamp(0.0, 100.0).round() as u8
    }
}

/// Parse a progress line printed with `--newline`.
///
/// Expected shape:
/// `[download]  42.3% of ~  10.52MiB at    1.23MiB/s ETA 00:05 (frag 3/10)`
///
/// Returns `None` for every other line.
pub fn parse_progress_line(line: &str) -> Option<DownloadProgress> {
    let rest = line.trim().strip_prefix("[download]")?.trim_start();
    let (percent_str, rest) = rest.split_once('%')?;
    let percent: f64 = percent_str.trim().parse().ok()?;

    let mut progress = DownloadProgress {
        percent,
        ..Default::default()
    };

    let mut tokens = rest.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        match token {
            "of" => {
                // Estimated totals are prefixed with '~'
                if tokens.peek() == Some(&"~") {
                    tokens.next();
                }
                progress.total = tokens.next().map(|s| s.trim_start_matches('~').to_string());
            }
            "at" => progress.speed = tokens.next().map(str::to_string),
            "ETA" => progress.eta = tokens.next().map(str::to_string),
            _ => {}
        }
    }

    Some(progress)
}
