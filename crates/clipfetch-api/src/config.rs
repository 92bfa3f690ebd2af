//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

use clipfetch_media::{OutputNaming, ToolConfig, DEFAULT_OUTPUT_DIR, DEFAULT_TOOL};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Expose Prometheus metrics at /metrics
    pub metrics_enabled: bool,
    /// External tool settings
    pub tool: ToolConfig,
    /// Delay between serving an artifact and deleting it
    pub artifact_cleanup_delay: Duration,
    /// Files older than this are removed by the janitor
    pub stale_artifact_max_age: Duration,
    /// Interval between janitor sweeps
    pub janitor_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 64 * 1024,
            metrics_enabled: true,
            tool: ToolConfig::new(format!("./{}", DEFAULT_OUTPUT_DIR)),
            artifact_cleanup_delay: Duration::from_secs(60),
            stale_artifact_max_age: Duration::from_secs(3600),
            janitor_interval: Duration::from_secs(300),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut tool = ToolConfig::new(
            std::env::var("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.tool.output_dir),
        )
        .with_program(std::env::var("YTDLP_PATH").unwrap_or_else(|_| DEFAULT_TOOL.to_string()));

        if let Ok(extra) = std::env::var("YTDLP_EXTRA_ARGS") {
            tool = tool.with_extra_args(extra.split_whitespace());
        }
        if env_flag("DESCRIPTIVE_FILENAMES", false) {
            tool = tool.with_naming(OutputNaming::Descriptive);
        }
        if let Some(secs) = env_parse::<u64>("DOWNLOAD_TIMEOUT_SECS").filter(|s| *s > 0) {
            tool = tool.with_download_timeout(Duration::from_secs(secs));
        }

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT")
                .or_else(|| env_parse("PORT"))
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            metrics_enabled: env_flag("METRICS_ENABLED", defaults.metrics_enabled),
            tool,
            artifact_cleanup_delay: env_parse("ARTIFACT_CLEANUP_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.artifact_cleanup_delay),
            stale_artifact_max_age: env_parse("STALE_ARTIFACT_MAX_AGE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_artifact_max_age),
            janitor_interval: env_parse("JANITOR_INTERVAL_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.janitor_interval),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
