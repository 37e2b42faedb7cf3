use chrono::{DateTime, Utc};
use rigger_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::{DeviceId, ProvisionOperation, RequestId};

/// Resource type label recorded for provisioned compute instances.
pub const RESOURCE_TYPE_INSTANCE: &str = "EC2";

/// Returns the tombstoned external identifier recorded after a teardown.
#[must_use]
pub fn teardown_marker(device_id: &DeviceId) -> String {
    format!("DESTROYED-{device_id}")
}

/// Lifecycle status of one audit record.
///
/// `Started` is the only in-progress value; the others are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Workflow accepted and running.
    Started,
    /// External tool finished with exit code zero.
    Success,
    /// External tool reported a failure, timed out or was cancelled.
    Failed,
    /// Workflow faulted before the external tool could produce an outcome.
    Error,
}

impl AuditStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "started" => Ok(Self::Started),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "error" => Ok(Self::Error),
            _ => Err(AppError::Validation(format!(
                "unknown audit status '{value}'"
            ))),
        }
    }

    /// Returns whether the status closes the record.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Started)
    }

    /// Classifies a workflow error into its terminal status.
    #[must_use]
    pub fn for_error(error: &AppError) -> Self {
        if error.is_operational_failure() {
            Self::Failed
        } else {
            Self::Error
        }
    }
}

/// Current audit record for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Surrogate key assigned on first insert.
    pub log_id: i64,
    /// Request identity, unique across records.
    pub request_id: RequestId,
    /// User that triggered the latest attempt.
    pub user_id: String,
    /// Workflow that last touched the record.
    pub operation: ProvisionOperation,
    /// Current status.
    pub status: AuditStatus,
    /// Wall-clock duration of the external tool run, set on terminal writes.
    pub duration_seconds: Option<f64>,
    /// Failure detail for `failed` and `error` outcomes.
    pub error_message: Option<String>,
    /// First insert timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Resource linked to a successful audit record. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Surrogate key.
    pub resource_id: i64,
    /// Owning audit record.
    pub log_id: i64,
    /// Resource type label.
    pub resource_type: String,
    /// Human-readable resource name.
    pub resource_name: String,
    /// Provider identifier or teardown marker.
    pub resource_external_id: String,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
}
