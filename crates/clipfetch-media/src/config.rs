//! External tool configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default program name of the external media tool.
pub const DEFAULT_TOOL: &str = "yt-dlp";

/// Default directory for produced artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// How output files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputNaming {
    /// `{job_id}.{ext}`. Short-lived server artifacts.
    #[default]
    JobId,
    /// `{job_id}_{title}_{section_start}-{section_end}_{epoch}.{ext}` with
    /// restricted file names. For callers that keep the files.
    Descriptive,
}

/// Configuration shared by the catalog, the invoker and the artifact store.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Program to execute (name on PATH or absolute path)
    pub program: PathBuf,
    /// Arguments inserted before every invocation's own arguments
    pub extra_args: Vec<String>,
    /// Directory the tool writes artifacts into
    pub output_dir: PathBuf,
    /// File naming scheme
    pub naming: OutputNaming,
    /// Kill the download if it runs longer than this
    pub download_timeout: Option<Duration>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_TOOL),
            extra_args: Vec::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            naming: OutputNaming::JobId,
            download_timeout: None,
        }
    }
}

impl ToolConfig {
    /// Create a config writing into `output_dir`.
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Set the program to execute.
    pub fn with_program(mut self, program: impl AsRef<Path>) -> Self {
        self.program = program.as_ref().to_path_buf();
        self
    }

    /// Set arguments inserted before every invocation.
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the file naming scheme.
    pub fn with_naming(mut self, naming: OutputNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Set the download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    /// Program name for log messages.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Resolve the program, failing when it is missing or not executable.
    pub fn resolve_program(&self) -> Result<PathBuf, which::Error> {
        which::which(&self.program)
    }
}
