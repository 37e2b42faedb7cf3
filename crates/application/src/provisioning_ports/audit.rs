use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rigger_core::AppResult;
use rigger_domain::{AuditRecord, AuditStatus, ProvisionOperation, RequestId, ResourceRecord};

/// Payload opening (or re-opening) the audit record of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStartInput {
    /// Request identity.
    pub request_id: RequestId,
    /// User that triggered the attempt.
    pub user_id: String,
    /// Workflow being started.
    pub operation: ProvisionOperation,
    /// Timestamp used as `created_at` when the record is first inserted.
    pub started_at: DateTime<Utc>,
}

/// Payload closing the audit record of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTerminalInput {
    /// Request identity.
    pub request_id: RequestId,
    /// User that triggered the attempt.
    pub user_id: String,
    /// Workflow that produced the outcome.
    pub operation: ProvisionOperation,
    /// Terminal status; `started` is rejected.
    pub status: AuditStatus,
    /// Elapsed external tool time.
    pub duration_seconds: Option<f64>,
    /// Failure detail.
    pub error_message: Option<String>,
}

/// Payload linking one resource to a successful audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachResourceInput {
    /// Owning audit record.
    pub log_id: i64,
    /// Resource type label.
    pub resource_type: String,
    /// Human-readable resource name.
    pub resource_name: String,
    /// Provider identifier or teardown marker.
    pub resource_external_id: String,
}

/// Durable audit trail keyed by request identity.
///
/// Implementations keep at most one record per request id. The lookup and
/// the write of `record_start` and `record_terminal` must be atomic per
/// request id; writes for different request ids must not block each other.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Stable backend name used in health output and logs.
    fn backend_name(&self) -> &'static str;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> AppResult<()>;

    /// Inserts a `started` record or resets the existing one, returning its log id.
    async fn record_start(&self, input: RecordStartInput) -> AppResult<i64>;

    /// Writes the terminal outcome with the same upsert discipline.
    async fn record_terminal(&self, input: RecordTerminalInput) -> AppResult<i64>;

    /// Appends a resource row, failing with `ReferentialIntegrity` for unknown log ids.
    async fn attach_resource(&self, input: AttachResourceInput) -> AppResult<ResourceRecord>;

    /// Returns the current record for a request.
    async fn find_record(&self, request_id: &RequestId) -> AppResult<Option<AuditRecord>>;

    /// Lists resources attached to one record, oldest first.
    async fn list_resources(&self, log_id: i64) -> AppResult<Vec<ResourceRecord>>;
}
