//! Builder for executing external tool commands.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use vidpress_common::{Error, Result};

/// Lines of captured stderr quoted in a failure message.
const STDERR_TAIL_LINES: usize = 5;

/// Where a tool's stdout and stderr go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Stream straight to the operator's terminal.
    #[default]
    Inherit,
    /// Capture for logging and error messages. Each stderr line is logged
    /// at info under the `ffmpeg` target while the process runs.
    Capture,
}

/// Output from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8). Empty in [`OutputMode::Inherit`].
    pub stdout: String,
    /// Captured standard error (lossy UTF-8). Empty in [`OutputMode::Inherit`].
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// The child is killed if the future returned by [`ToolCommand::execute`] is
/// dropped, so timeouts and cancellation never leave stray processes.
///
/// # Example
///
/// ```no_run
/// use vidpress_av::{OutputMode, ToolCommand};
/// use std::path::PathBuf;
///
/// # async fn example() -> vidpress_common::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-version")
///     .output_mode(OutputMode::Capture)
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
    output_mode: OutputMode,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: None,
            output_mode: OutputMode::default(),
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time. No limit by default.
    pub fn timeout(&mut self, d: Option<Duration>) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Choose whether output is streamed or captured.
    pub fn output_mode(&mut self, mode: OutputMode) -> &mut Self {
        self.output_mode = mode;
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command and wait for it to exit.
    ///
    /// # Errors
    ///
    /// - Returns [`Error::Tool`] if spawning the process fails.
    /// - Returns [`Error::Tool`] if the process exits with a non-zero status
    ///   (message includes the tail of stderr when captured).
    /// - Returns [`Error::Tool`] if the process times out.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match self.output_mode {
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }

        tracing::debug!("Running {} {:?}", self.program.display(), self.args);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(forward_stderr(program_name.clone(), stderr)));

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| Error::tool(&program_name, format!("timed out after {:?}", limit)))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| Error::tool(&program_name, format!("I/O error waiting for process: {e}")))?;

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
        };

        if !output.status.success() {
            let tail = stderr_tail(&tool_output.stderr);
            let message = if tail.is_empty() {
                format!("exited with {}", output.status)
            } else {
                format!("exited with {}: {}", output.status, tail)
            };
            return Err(Error::tool(program_name, message));
        }

        Ok(tool_output)
    }
}

/// Log each stderr line under the `ffmpeg` target as it arrives, and return
/// everything read.
async fn forward_stderr(program_name: String, stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut collected = String::new();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !line.trim().is_empty() {
                    tracing::info!(target: "ffmpeg", "[{}] {}", program_name, line);
                }
                collected.push_str(&line);
                collected.push('\n');
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read {} stderr: {}", program_name, e);
                break;
            }
        }
    }

    collected
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
