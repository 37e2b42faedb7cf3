use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use rigger_core::AppResult;
use tokio_util::sync::CancellationToken;

/// One external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Directory the process is rooted at.
    pub working_dir: PathBuf,
    /// Deadline after which the process tree is killed.
    pub timeout: Option<Duration>,
}

impl ToolCommand {
    /// Returns `program subcommand` for logs and error messages.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.args.first() {
            Some(subcommand) => format!("{} {subcommand}", self.program),
            None => self.program.clone(),
        }
    }

    /// Returns the first argument, which selects the tool sub-command.
    #[must_use]
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// Captured standard output, including a truncation note when bounded.
    pub stdout: String,
    /// Captured standard error, including a truncation note when bounded.
    pub stderr: String,
}

impl ProcessOutput {
    /// Returns whether the process exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns stdout followed by stderr.
    #[must_use]
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Port executing external processes.
///
/// Exit codes are returned verbatim. A missing or unspawnable executable
/// yields `AppError::Spawn`; an elapsed deadline yields `AppError::Timeout`
/// and cancellation yields `AppError::Cancelled`, both after the whole
/// process tree has been killed.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs one command to completion.
    async fn run(
        &self,
        command: &ToolCommand,
        cancel: &CancellationToken,
    ) -> AppResult<ProcessOutput>;
}
