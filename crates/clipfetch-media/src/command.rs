//! yt-dlp command builder and runner.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ToolConfig;
use crate::error::{MediaError, MediaResult};

/// Builder for yt-dlp commands.
#[derive(Debug, Clone)]
pub struct YtDlpCommand {
    /// Program to execute
    program: PathBuf,
    /// Arguments from configuration, placed first
    base_args: Vec<String>,
    /// Arguments for this invocation
    args: Vec<String>,
    /// Source URL, always placed last after `--`
    url: Option<String>,
}

impl YtDlpCommand {
    /// Create a new command for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            base_args: Vec::new(),
            args: Vec::new(),
            url: None,
        }
    }

    /// Create a command from tool configuration.
    pub fn from_config(config: &ToolConfig) -> Self {
        let mut cmd = Self::new(&config.program);
        cmd.base_args = config.extra_args.clone();
        cmd
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Dump metadata as a single JSON document instead of downloading.
    pub fn dump_json(self) -> Self {
        self.arg("-J")
    }

    /// Select a format id.
    pub fn format(self, format_id: impl Into<String>) -> Self {
        self.arg("-f").arg(format_id)
    }

    /// Set the output path template.
    pub fn output_template(self, template: impl Into<String>) -> Self {
        self.arg("-o").arg(template)
    }

    /// Download only the given section (`*start-end`).
    pub fn download_sections(self, section: impl Into<String>) -> Self {
        self.arg("--download-sections").arg(section)
    }

    /// Re-encode around cut points so clips start on a keyframe.
    pub fn force_keyframes_at_cuts(self) -> Self {
        self.arg("--force-keyframes-at-cuts")
    }

    /// Restrict file names to ASCII without spaces.
    pub fn restrict_filenames(self) -> Self {
        self.arg("--restrict-filenames")
    }

    /// Print progress on separate lines.
    pub fn newline(self) -> Self {
        self.arg("--newline")
    }

    /// Set the source URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Program to execute.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend(self.args.iter().cloned());

        // `--` keeps a URL starting with '-' from being read as an option
        if let Some(url) = &self.url {
            args.push("--".to_string());
            args.push(url.clone());
        }

        args
    }
}

/// Captured result of a finished tool process.
#[derive(Debug)]
pub struct ToolOutput {
    /// Exit status
    pub status: ExitStatus,
    /// Every stdout line, in order, without line terminators
    pub stdout_lines: Vec<String>,
    /// Complete stderr
    pub stderr: String,
}

impl ToolOutput {
    /// Stdout joined back into one string.
    pub fn stdout(&self) -> String {
        self.stdout_lines.join("\n")
    }
}

/// Runner for yt-dlp commands with line streaming, cancellation and timeout.
pub struct ToolRunner {
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Timeout
    timeout: Option<Duration>,
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self {
            cancel_rx: None,
            timeout: None,
        }
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a command to completion, collecting its output.
    pub async fn run(&self, cmd: &YtDlpCommand) -> MediaResult<ToolOutput> {
        self.run_with_lines(cmd, |_| {}).await
    }

    /// Run a command, handing every stdout line to `on_line` as it arrives.
    ///
    /// A non-zero exit is not an error here; callers classify the status.
    /// Spawn failures map to [`MediaError::Invocation`].
    pub async fn run_with_lines<F>(&self, cmd: &YtDlpCommand, mut on_line: F) -> MediaResult<ToolOutput>
    where
        F: FnMut(&str) + Send + 'static,
    {
        let program = which::which(cmd.program()).map_err(|e| {
            MediaError::invocation(format!("{} not found: {}", cmd.program().display(), e))
        })?;

        let args = cmd.build_args();
        debug!("Running: {} {}", program.display(), args.join(" "));

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::invocation(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::invocation("stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::invocation("stderr not captured"))?;

        let stdout_handle = tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut collected = Vec::new();
            let mut buf = Vec::new();

            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let raw = String::from_utf8_lossy(&buf);
                        let line = raw.trim_end_matches(['\r', '\n']);
                        on_line(line);
                        collected.push(line.to_string());
                    }
                }
            }

            collected
        });

        let stderr_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        });

        let status = match self.wait_for_completion(&mut child).await {
            Ok(status) => status,
            Err(e) => {
                stdout_handle.abort();
                stderr_handle.abort();
                return Err(e);
            }
        };

        let stdout_lines = stdout_handle.await.unwrap_or_default();
        let stderr = stderr_handle.await.unwrap_or_default();

        Ok(ToolOutput {
            status,
            stdout_lines,
            stderr,
        })
    }

    /// Wait for child process with cancellation and timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<ExitStatus> {
        let cancel_rx = self.cancel_rx.clone();
        let cancelled = async move {
            match cancel_rx {
                Some(mut rx) => {
                    // A dropped sender can never cancel
                    if rx.wait_for(|cancel| *cancel).await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        let timeout = self.timeout;
        let timed_out = async move {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            status = child.wait() => status.map_err(|e| MediaError::invocation(e.to_string())),
            _ = cancelled => {
                info!("yt-dlp cancelled, killing process");
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
            _ = timed_out => {
                let secs = timeout.map(|d| d.as_secs()).unwrap_or_default();
                warn!("yt-dlp timed out after {} seconds, killing process", secs);
                let _ = child.kill().await;
                Err(MediaError::Timeout(secs))
            }
        }
    }
}

/// Check if yt-dlp is available.
pub fn check_ytdlp(config: &ToolConfig) -> MediaResult<PathBuf> {
    config
        .resolve_program()
        .map_err(|e| MediaError::invocation(format!("{} not found: {}", config.program_name(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = YtDlpCommand::new("yt-dlp")
            .format("22")
            .output_template("/tmp/abc.%(ext)s")
            .download_sections("*10-20")
            .force_keyframes_at_cuts()
            .url("https://example.com/watch?v=1");

        let args = cmd.build_args();
        assert_eq!(
            args,
            vec![
                "-f",
                "22",
                "-o",
                "/tmp/abc.%(ext)s",
                "--download-sections",
                "*10-20",
                "--force-keyframes-at-cuts",
                "--",
                "https://example.com/watch?v=1",
            ]
        );
    }

    #[test]
    fn test_config_args_come_first() {
        let config = ToolConfig::new("/tmp").with_extra_args(["--proxy", "socks5://127.0.0.1:1080"]);
        let args = YtDlpCommand::from_config(&config)
            .dump_json()
            .url("-not-an-option")
            .build_args();

        assert_eq!(args[0], "--proxy");
        assert_eq!(args[2], "-J");
        assert_eq!(&args[3..], ["--", "-not-an-option"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_streams_lines_and_stderr() {
        use std::sync::{Arc, Mutex};

        let cmd = YtDlpCommand::new("sh").args(["-c", "echo one; echo two; echo oops >&2; exit 3"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let output = ToolRunner::new()
            .run_with_lines(&cmd, move |line| sink.lock().unwrap().push(line.to_string()))
            .await
            .unwrap();

        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stdout_lines, vec!["one", "two"]);
        assert_eq!(output.stderr.trim(), "oops");
        assert_eq!(*seen.lock().unwrap(), vec!["one".to_string(), "two".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_timeout_kills_process() {
        let cmd = YtDlpCommand::new("sh").args(["-c", "sleep 5"]);
        let result = ToolRunner::new()
            .with_timeout(Some(Duration::from_millis(100)))
            .run(&cmd)
            .await;

        assert!(matches!(result, Err(MediaError::Timeout(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_cancel_kills_process() {
        let (tx, rx) = watch::channel(false);
        let cmd = YtDlpCommand::new("sh").args(["-c", "sleep 5"]);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = tx.send(true);
        });

        let result = ToolRunner::new().with_cancel(rx).run(&cmd).await;
        assert!(matches!(result, Err(MediaError::Cancelled)));
    }

    #[tokio::test]
    async fn test_missing_program_is_invocation_error() {
        let cmd = YtDlpCommand::new("/nonexistent/clipfetch-tool").dump_json();
        let result = ToolRunner::new().run(&cmd).await;
        assert!(matches!(result, Err(MediaError::Invocation(_))));
    }
}
