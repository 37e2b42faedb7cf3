//! Shared primitives for all Rust crates in Rigger.

#![forbid(unsafe_code)]

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across Rigger crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Workspace directory or file could not be written.
    #[error("workspace io failure: {0}")]
    Io(String),

    /// External executable is missing or could not be started.
    #[error("failed to spawn external tool: {0}")]
    Spawn(String),

    /// External tool exited with a non-zero status.
    #[error("{command} exited with status {exit_code}")]
    ExternalTool {
        /// Sub-command that failed, e.g. `terraform apply`.
        command: String,
        /// Exit code reported by the process, `-1` when killed by a signal.
        exit_code: i32,
        /// Combined output captured up to and including the failing step.
        output: String,
    },

    /// External tool exceeded its deadline and was killed.
    #[error("timeout: {command} exceeded {limit:?}")]
    Timeout {
        /// Sub-command that was killed.
        command: String,
        /// Deadline that elapsed.
        limit: Duration,
        /// Output captured before the process was killed.
        output: String,
    },

    /// External tool was cancelled by its caller before completing.
    #[error("cancelled: {command} was terminated before completion")]
    Cancelled {
        /// Sub-command that was terminated.
        command: String,
        /// Output captured before the process was terminated.
        output: String,
    },

    /// Resource attachment referenced an audit record that does not exist.
    #[error("referential integrity failure: {0}")]
    ReferentialIntegrity(String),

    /// Audit store is unreachable or rejected a write.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns true for expected operational outcomes of the external tool.
    ///
    /// Non-zero exits, timeouts and cancellations are recorded as `failed`;
    /// every other error is a defect recorded as `error`.
    #[must_use]
    pub fn is_operational_failure(&self) -> bool {
        matches!(
            self,
            Self::ExternalTool { .. } | Self::Timeout { .. } | Self::Cancelled { .. }
        )
    }

    /// Returns the captured tool output carried by operational failures.
    #[must_use]
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Self::ExternalTool { output, .. }
            | Self::Timeout { output, .. }
            | Self::Cancelled { output, .. } => Some(output.as_str()),
            _ => None,
        }
    }

    /// Returns the message persisted as the audit error detail.
    ///
    /// Operational failures keep the full captured output after the summary
    /// line, everything else keeps its message verbatim.
    #[must_use]
    pub fn audit_detail(&self) -> String {
        match self {
            Self::Timeout { output, .. } => format!("timeout\n{output}"),
            Self::Cancelled { output, .. } => format!("cancelled\n{output}"),
            Self::ExternalTool { output, .. } => format!("{self}\n{output}"),
            Self::Io(message)
            | Self::Spawn(message)
            | Self::ReferentialIntegrity(message)
            | Self::Persistence(message)
            | Self::Internal(message)
            | Self::Validation(message)
            | Self::NotFound(message) => message.clone(),
        }
    }
}
