use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use rigger_application::{ProcessOutput, ProcessRunner, ToolCommand};
use rigger_core::{AppError, AppResult};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default cap on captured bytes per output stream.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1024 * 1024;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Time allowed for the output readers to reach end of stream once the
/// process group has been signalled.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs external tools as child processes of the service.
///
/// Each child leads its own process group. The group is killed once the run
/// ends, whether the child exited, timed out or was cancelled, so stragglers
/// holding the output pipes never outlive the run.
#[derive(Debug, Clone)]
pub struct TokioProcessRunner {
    output_limit: usize,
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_LIMIT_BYTES)
    }
}

enum WaitOutcome {
    Exited(ExitStatus),
    WaitFailed(std::io::Error),
    TimedOut(Duration),
    Cancelled,
}

impl TokioProcessRunner {
    /// Creates a runner keeping at most `output_limit` bytes per stream.
    #[must_use]
    pub fn new(output_limit: usize) -> Self {
        Self { output_limit }
    }

    fn command(tool: &ToolCommand) -> Command {
        let mut command = Command::new(&tool.program);
        command
            .args(&tool.args)
            .current_dir(&tool.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        command
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        tool: &ToolCommand,
        cancel: &CancellationToken,
    ) -> AppResult<ProcessOutput> {
        let display_name = tool.display_name();
        debug!(
            command = %display_name,
            working_dir = %tool.working_dir.display(),
            "spawning external tool"
        );

        let mut child = Self::command(tool)
            .spawn()
            .map_err(|error| AppError::Spawn(format!("{}: {error}", tool.program)))?;

        let process_group = child.id();
        let stdout_task = capture(child.stdout.take(), self.output_limit);
        let stderr_task = capture(child.stderr.take(), self.output_limit);

        let outcome = tokio::select! {
            () = cancel.cancelled() => WaitOutcome::Cancelled,
            waited = wait_with_deadline(&mut child, tool.timeout) => match waited {
                Some(Ok(status)) => WaitOutcome::Exited(status),
                Some(Err(error)) => WaitOutcome::WaitFailed(error),
                None => WaitOutcome::TimedOut(tool.timeout.unwrap_or_default()),
            },
        };

        kill_process_group(process_group);
        if !matches!(outcome, WaitOutcome::Exited(_))
            && let Err(error) = child.kill().await
        {
            debug!(error = %error, "child kill failed");
        }

        let stdout = drain(stdout_task).await;
        let stderr = drain(stderr_task).await;

        match outcome {
            WaitOutcome::Exited(status) => {
                let exit_code = status.code().unwrap_or(-1);
                debug!(command = %display_name, exit_code, "external tool exited");
                Ok(ProcessOutput {
                    exit_code,
                    stdout,
                    stderr,
                })
            }
            WaitOutcome::WaitFailed(error) => Err(AppError::Internal(format!(
                "failed to wait for {display_name}: {error}"
            ))),
            WaitOutcome::TimedOut(limit) => {
                warn!(
                    command = %display_name,
                    limit_seconds = limit.as_secs(),
                    "external tool timed out"
                );
                Err(AppError::Timeout {
                    command: display_name,
                    limit,
                    output: join_streams(stdout, stderr),
                })
            }
            WaitOutcome::Cancelled => {
                info!(command = %display_name, "external tool cancelled");
                Err(AppError::Cancelled {
                    command: display_name,
                    output: join_streams(stdout, stderr),
                })
            }
        }
    }
}

async fn wait_with_deadline(
    child: &mut Child,
    deadline: Option<Duration>,
) -> Option<std::io::Result<ExitStatus>> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
        None => Some(child.wait().await),
    }
}

fn capture<R>(stream: Option<R>, limit: usize) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut stream) = stream else {
            return String::new();
        };

        let mut captured = Vec::new();
        let mut dropped = 0_usize;
        let mut read_error = None;
        let mut chunk = vec![0_u8; READ_CHUNK_BYTES];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Err(error) => {
                    read_error = Some(error);
                    break;
                }
                Ok(read) => {
                    let room = limit.saturating_sub(captured.len());
                    let kept = read.min(room);
                    captured.extend_from_slice(&chunk[..kept]);
                    dropped += read - kept;
                }
            }
        }

        let mut text = String::from_utf8_lossy(&captured).into_owned();
        if dropped > 0 {
            text.push_str(&format!("\n[output truncated: {dropped} bytes dropped]"));
        }
        if let Some(error) = read_error {
            text.push_str(&format!("\n[output read failed: {error}]"));
        }
        text
    })
}

async fn drain(mut task: JoinHandle<String>) -> String {
    match tokio::time::timeout(DRAIN_GRACE, &mut task).await {
        Ok(captured) => captured.unwrap_or_default(),
        Err(_) => {
            task.abort();
            warn!("output stream still open after the process group was killed");
            "[output capture abandoned: stream still open]".to_owned()
        }
    }
}

fn join_streams(stdout: String, stderr: String) -> String {
    if stderr.is_empty() {
        stdout
    } else {
        format!("{stdout}\n{stderr}")
    }
}

#[cfg(unix)]
fn kill_process_group(process_group: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = process_group.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(error) => debug!(pid, error = %error, "process group kill failed"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_process_group: Option<u32>) {}
