//! Supervised execution of a compiled ffmpeg command.
//!
//! The child's stdout and stderr are each read by a forwarding task that
//! splits on `\n` and `\r` (ffmpeg rewrites its stats line with carriage
//! returns) and sends every line into one channel. A single drain task owns
//! the receiving end: it parses progress, invokes the observers in line
//! order, and appends to the diagnostic buffer.
//!
//! Lines keep their order within each stream. Between stdout and stderr the
//! order is whatever the two readers observe, which is why progress and
//! diagnostics are read from stderr, where ffmpeg writes both.
//!
//! The buffer lives outside the drain task, so when a drain misses its grace
//! period (a grandchild still holding the pipe open) the lines read so far
//! are still reported and the readers are stopped with it.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fj_core::config::SupervisorConfig;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::job::{CompiledCommand, EncodingResult, OutputTarget};
use crate::progress::{parse_progress_line, Observers};

/// Runs one child process per call and turns its exit into an outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSupervisor {
    config: SupervisorConfig,
}

enum WaitOutcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    /// Run `command` to completion.
    ///
    /// A zero `timeout` waits indefinitely. Observers are invoked from the
    /// drain task, one line at a time, in the order the child printed them.
    pub async fn run(
        &self,
        command: &CompiledCommand,
        observers: &Observers,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> fj_core::Result<EncodingResult> {
        let start = Instant::now();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("spawning: {command}");
        let mut child = cmd.spawn().map_err(|e| spawn_error(&command.program, e))?;

        let mut drain = OutputDrain::start(&mut child, observers.clone());

        let deadline = async {
            if timeout.is_zero() {
                std::future::pending::<()>().await
            } else {
                tokio::time::sleep(timeout).await
            }
        };

        let waited = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = deadline => WaitOutcome::TimedOut,
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
        };

        let status = match waited {
            WaitOutcome::Exited(status) => status,
            WaitOutcome::TimedOut => {
                self.terminate(&mut child, &mut drain).await;
                tracing::warn!("ffmpeg timed out after {timeout:?}, process killed");
                return Err(fj_core::Error::timeout(timeout));
            }
            WaitOutcome::Cancelled => {
                self.terminate(&mut child, &mut drain).await;
                tracing::info!("job cancelled, process killed");
                return Err(fj_core::Error::Cancelled);
            }
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                drain.stop();
                return Err(fj_core::Error::execution(
                    -1,
                    format!("I/O error waiting for ffmpeg: {e}"),
                ));
            }
        };

        let output = drain.finish(self.config.exit_drain_grace()).await;

        if !status.success() {
            // A signal-terminated process has no exit code.
            let exit_code = status.code().unwrap_or(-1);
            tracing::warn!("ffmpeg exited with code {exit_code}");
            return Err(fj_core::Error::execution(exit_code, output));
        }

        let (output_path, file_size) = match &command.output {
            OutputTarget::Stream(_) => (None, 0),
            OutputTarget::File(path) => {
                let size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
                (Some(path.clone()), size)
            }
        };

        let result = EncodingResult {
            output_path,
            time_taken_ms: start.elapsed().as_millis() as u64,
            file_size,
        };
        tracing::info!(
            "ffmpeg finished in {} ms ({} bytes)",
            result.time_taken_ms,
            result.file_size
        );
        Ok(result)
    }

    /// Kill the child and let the drain flush what it already read.
    async fn terminate(&self, child: &mut Child, drain: &mut OutputDrain) {
        if let Err(e) = child.kill().await {
            tracing::warn!("failed to kill ffmpeg: {e}");
        }
        let output = drain.finish(self.config.timeout_drain_grace()).await;
        tracing::debug!("output before termination:\n{output}");
    }
}

fn spawn_error(program: &Path, e: std::io::Error) -> fj_core::Error {
    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string_lossy().to_string());
    match e.kind() {
        std::io::ErrorKind::NotFound => fj_core::Error::binary_not_found(name),
        _ => fj_core::Error::execution(-1, format!("failed to spawn {name}: {e}")),
    }
}

/// The reader and drain tasks of one child, plus the buffer they fill.
struct OutputDrain {
    readers: Vec<JoinHandle<()>>,
    drain: JoinHandle<()>,
    buffer: Arc<Mutex<String>>,
}

impl OutputDrain {
    fn start(child: &mut Child, observers: Observers) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(stderr, tx.clone())));
        }
        drop(tx);

        let buffer = Arc::new(Mutex::new(String::new()));
        let drain = tokio::spawn(drain_output(rx, observers, Arc::clone(&buffer)));
        Self {
            readers,
            drain,
            buffer,
        }
    }

    /// Wait for the drain for at most `grace`, then return everything it
    /// collected. Tasks still running at the deadline are aborted.
    async fn finish(&mut self, grace: Duration) -> String {
        match tokio::time::timeout(grace, &mut self.drain).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("output drain task failed: {e}"),
            Err(_) => {
                tracing::warn!("output drain did not finish within {grace:?}");
                self.stop();
            }
        }
        self.take_buffer()
    }

    fn stop(&self) {
        for reader in &self.readers {
            reader.abort();
        }
        self.drain.abort();
    }

    fn take_buffer(&self) -> String {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *buffer)
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        let (consumed, complete) = {
            let buf = match reader.fill_buf().await {
                Ok(buf) => buf,
                Err(e) => {
                    tracing::debug!("stopped reading ffmpeg output: {e}");
                    break;
                }
            };
            if buf.is_empty() {
                break;
            }
            match buf.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(i) => {
                    line.extend_from_slice(&buf[..i]);
                    (i + 1, true)
                }
                None => {
                    line.extend_from_slice(buf);
                    (buf.len(), false)
                }
            }
        };
        reader.consume(consumed);

        if complete && !line.is_empty() {
            let text = String::from_utf8_lossy(&line).into_owned();
            line.clear();
            if tx.send(text).is_err() {
                return;
            }
        }
    }

    if !line.is_empty() {
        let _ = tx.send(String::from_utf8_lossy(&line).into_owned());
    }
}

async fn drain_output(
    mut rx: mpsc::UnboundedReceiver<String>,
    observers: Observers,
    buffer: Arc<Mutex<String>>,
) {
    let observed = !observers.is_empty();
    while let Some(line) = rx.recv().await {
        tracing::trace!("ffmpeg: {line}");
        if observed {
            if let Some(event) = parse_progress_line(&line) {
                observers.notify(&event);
            }
        }
        let mut out = buffer.lock().unwrap_or_else(|e| e.into_inner());
        out.push_str(&line);
        out.push('\n');
    }
}
