//! Clip download using yt-dlp.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use clipfetch_models::{ClipJob, ClipRange, JobId};

use crate::command::{ToolRunner, YtDlpCommand};
use crate::config::{OutputNaming, ToolConfig};
use crate::error::{MediaError, MediaResult};

/// Result of a successful tool run.
#[derive(Debug, Clone)]
pub struct FetchOutput {
    /// Job the output belongs to
    pub job_id: JobId,
    /// Last file path the tool reported writing, if it carries the job prefix
    pub reported_path: Option<PathBuf>,
    /// Every stdout line, in order
    pub stdout_lines: Vec<String>,
}

/// Runs the external tool for a clip job.
#[derive(Debug, Clone)]
pub struct FetchInvoker {
    config: Arc<ToolConfig>,
}

impl FetchInvoker {
    /// Create an invoker using the given tool configuration.
    pub fn new(config: Arc<ToolConfig>) -> Self {
        Self { config }
    }

    /// Output path template for `job`.
    pub fn output_template(&self, job: &ClipJob) -> String {
        let name = match self.config.naming {
            OutputNaming::JobId => format!("{}.%(ext)s", job.id),
            OutputNaming::Descriptive => format!(
                "{}_%(title)s_%(section_start)s-%(section_end)s_%(epoch)s.%(ext)s",
                job.id
            ),
        };

        self.config.output_dir.join(name).to_string_lossy().into_owned()
    }

    /// Build the tool command for `job`.
    pub fn build_command(&self, job: &ClipJob) -> YtDlpCommand {
        let mut cmd = YtDlpCommand::from_config(&self.config)
            .format(&job.format_id)
            .output_template(self.output_template(job))
            .force_keyframes_at_cuts()
            .newline();

        if self.config.naming == OutputNaming::Descriptive {
            cmd = cmd.restrict_filenames();
        }

        if let Some(section) = job.range.as_ref().and_then(ClipRange::section_arg) {
            cmd = cmd.download_sections(section);
        }

        cmd.url(&job.source_url)
    }

    /// Run `job` to completion.
    pub async fn run(&self, job: &ClipJob) -> MediaResult<FetchOutput> {
        self.run_with_progress(job, None, |_| {}).await
    }

    /// Run `job`, handing every stdout line to `on_line` as it arrives.
    ///
    /// The process is killed when `cancel` flips to `true`, when the
    /// configured timeout elapses, or when the returned future is dropped.
    ///
    /// # Errors
    ///
    /// - [`MediaError::ExternalToolFailure`] on a non-zero exit, with stderr
    /// - [`MediaError::Invocation`] when the tool cannot be started
    /// - [`MediaError::Cancelled`] / [`MediaError::Timeout`]
    pub async fn run_with_progress<F>(
        &self,
        job: &ClipJob,
        cancel: Option<watch::Receiver<bool>>,
        on_line: F,
    ) -> MediaResult<FetchOutput>
    where
        F: FnMut(&str) + Send + 'static,
    {
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let cmd = self.build_command(job);

        info!(
            job_id = %job.id,
            url = %job.source_url,
            format = %job.format_id,
            section = ?job.range.as_ref().and_then(ClipRange::section_arg),
            "Starting download"
        );

        let mut runner = ToolRunner::new().with_timeout(self.config.download_timeout);
        if let Some(rx) = cancel {
            runner = runner.with_cancel(rx);
        }

        let output = runner.run_with_lines(&cmd, on_line).await?;

        if !output.status.success() {
            warn!(
                job_id = %job.id,
                exit_code = ?output.status.code(),
                "Download failed"
            );
            return Err(MediaError::tool_failed(output.stderr, output.status.code()));
        }

        let reported_path = output
            .stdout_lines
            .iter()
            .filter_map(|line| reported_path(line))
            .filter(|path| has_job_prefix(path, &job.id))
            .last();

        debug!(job_id = %job.id, reported = ?reported_path, "Download finished");

        Ok(FetchOutput {
            job_id: job.id.clone(),
            reported_path,
            stdout_lines: output.stdout_lines,
        })
    }
}

/// Extract a file path the tool announces writing.
fn reported_path(line: &str) -> Option<PathBuf> {
    let line = line.trim();

    if let Some((_, rest)) = line.split_once("Destination: ") {
        return non_empty(rest);
    }

    if let Some((_, rest)) = line.split_once("Merging formats into ") {
        return non_empty(rest.trim_matches('"'));
    }

    if let Some(rest) = line.strip_prefix("[download] ") {
        if let Some(path) = rest.strip_suffix(" has already been downloaded") {
            return non_empty(path);
        }
    }

    None
}

fn non_empty(path: &str) -> Option<PathBuf> {
    let path = path.trim();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

fn has_job_prefix(path: &Path, job_id: &JobId) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(job_id.as_str()))
}
