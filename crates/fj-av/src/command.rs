//! Builder for short-lived tool invocations with captured output.
//!
//! Long-running encodes go through [`crate::supervisor`]; this runner is for
//! quick calls such as `ffprobe -show_format` or `ffmpeg -version` where the
//! whole output is wanted at once.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use fj_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> fj_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json", "-show_format"])
///     .arg("/path/to/audio.flac")
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
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
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

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`fj_core::Error::BinaryNotFound`] if the program does not exist.
    /// - [`fj_core::Error::Timeout`] if the process outlives the timeout; the
    ///   child is killed.
    /// - [`fj_core::Error::Execution`] if the process exits non-zero (output
    ///   is stderr) or cannot be spawned or awaited (exit code `-1`).
    pub async fn execute(&self) -> fj_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("running {} {}", program_name, self.args.join(" "));

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => fj_core::Error::binary_not_found(&program_name),
            _ => fj_core::Error::execution(-1, format!("failed to spawn {program_name}: {e}")),
        })?;

        // On expiry the `wait_with_output` future is dropped together with
        // the child, and `kill_on_drop` terminates the process.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(fj_core::Error::execution(
                        output.status.code().unwrap_or(-1),
                        tool_output.stderr.trim(),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(fj_core::Error::execution(
                -1,
                format!("I/O error waiting for {program_name}: {e}"),
            )),
            Err(_elapsed) => {
                tracing::warn!("{program_name} timed out after {:?}", self.timeout);
                Err(fj_core::Error::timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn execute_echo() {
        // `echo` should be universally available.
        let output = ToolCommand::new(PathBuf::from("echo"))
            .arg("hello")
            .execute()
            .await;

        match output {
            Ok(out) => {
                assert!(out.status.success());
                assert!(out.stdout.trim().contains("hello"));
            }
            Err(_) => {
                // On some minimal environments echo may not exist; skip.
            }
        }
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await;
        assert_matches!(
            result,
            Err(fj_core::Error::BinaryNotFound { tool }) if tool == "nonexistent_tool_xyz_12345"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let result = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo boom >&2; exit 3"])
            .execute()
            .await;
        assert_matches!(
            result,
            Err(fj_core::Error::Execution { exit_code: 3, output }) if output == "boom"
        );
    }

    #[tokio::test]
    async fn timeout_fires() {
        // `sleep 10` should be killed well before 10 seconds.
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("timed out"), "unexpected error: {err}");
    }
}
