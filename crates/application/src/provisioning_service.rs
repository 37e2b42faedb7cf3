use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rigger_core::{AppError, AppResult};
use rigger_domain::{
    AuditRecord, AuditStatus, ProvisionOperation, ProvisionRequest, RESOURCE_TYPE_INSTANCE,
    RequestId, ResourceRecord,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::device_locks::DeviceLocks;
use crate::lifecycle_controller::LifecycleController;
use crate::provisioning_ports::{
    AttachResourceInput, AuditStore, RecordStartInput, RecordTerminalInput, WorkspaceMaterializer,
};

mod workflow;

use workflow::WorkflowReport;

/// Result returned to callers of a successful provisioning workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReceipt {
    /// Human-readable summary.
    pub message: String,
    /// Target device.
    pub device_id: String,
    /// Provider identifier or teardown marker of the affected resource.
    pub resource_id: Option<String>,
}

/// Audit record of one request together with its resources.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAuditView {
    /// Current audit record.
    pub record: AuditRecord,
    /// Attached resources, oldest first.
    pub resources: Vec<ResourceRecord>,
}

/// Request-level entry point composing workspace, lifecycle and audit trail.
///
/// Every call that passes the `started` write ends with exactly one terminal
/// audit write, whether the workflow succeeds, fails, faults or panics.
#[derive(Clone)]
pub struct ProvisioningService {
    audit_store: Arc<dyn AuditStore>,
    materializer: Arc<dyn WorkspaceMaterializer>,
    lifecycle: LifecycleController,
    device_locks: DeviceLocks,
    shutdown: CancellationToken,
}

impl ProvisioningService {
    /// Creates a provisioning service.
    #[must_use]
    pub fn new(
        audit_store: Arc<dyn AuditStore>,
        materializer: Arc<dyn WorkspaceMaterializer>,
        lifecycle: LifecycleController,
    ) -> Self {
        Self {
            audit_store,
            materializer,
            lifecycle,
            device_locks: DeviceLocks::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses an externally owned token to cancel running workflows on shutdown.
    #[must_use]
    pub fn with_shutdown_token(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Cancels every running external process; their requests end as `failed`.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns the audit store backing this service.
    #[must_use]
    pub fn audit_store(&self) -> &Arc<dyn AuditStore> {
        &self.audit_store
    }

    /// Materializes and applies the device workspace.
    pub async fn create_server(&self, request: ProvisionRequest) -> AppResult<ProvisionReceipt> {
        self.spawn_provision(request, ProvisionOperation::Create)
            .await
    }

    /// Destroys the resources previously applied for the device.
    pub async fn destroy_server(&self, request: ProvisionRequest) -> AppResult<ProvisionReceipt> {
        self.spawn_provision(request, ProvisionOperation::Destroy)
            .await
    }

    /// Returns the audit record and resources of one request.
    pub async fn find_request(&self, request_id: &RequestId) -> AppResult<RequestAuditView> {
        let record = self
            .audit_store
            .find_record(request_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no audit record for request '{request_id}'"))
            })?;
        let resources = self.audit_store.list_resources(record.log_id).await?;

        Ok(RequestAuditView { record, resources })
    }

    // The workflow runs on its own task so a dropped caller cannot skip the
    // terminal audit write.
    async fn spawn_provision(
        &self,
        request: ProvisionRequest,
        operation: ProvisionOperation,
    ) -> AppResult<ProvisionReceipt> {
        let service = self.clone();
        tokio::spawn(async move { service.provision(request, operation).await })
            .await
            .map_err(|error| {
                AppError::Internal(format!("provisioning task did not complete: {error}"))
            })?
    }

    async fn provision(
        &self,
        request: ProvisionRequest,
        operation: ProvisionOperation,
    ) -> AppResult<ProvisionReceipt> {
        let _device_guard = self.device_locks.acquire(request.device_id().as_str()).await;
        let started = Instant::now();

        let log_id = self
            .audit_store
            .record_start(RecordStartInput {
                request_id: request.request_id().clone(),
                user_id: request.user_id().to_owned(),
                operation,
                started_at: Utc::now(),
            })
            .await?;

        info!(
            request_id = %request.request_id(),
            device_id = %request.device_id(),
            user_id = request.user_id(),
            operation = operation.as_str(),
            log_id,
            "provisioning started"
        );

        let report = self.run_workflow_isolated(&request, operation).await;
        let duration = report.tool_duration.unwrap_or_else(|| started.elapsed());
        let (status, error_message) = match &report.result {
            Ok(_) => (AuditStatus::Success, None),
            Err(error) => (AuditStatus::for_error(error), Some(error.audit_detail())),
        };

        let terminal_write = self
            .audit_store
            .record_terminal(RecordTerminalInput {
                request_id: request.request_id().clone(),
                user_id: request.user_id().to_owned(),
                operation,
                status,
                duration_seconds: Some(duration.as_secs_f64()),
                error_message,
            })
            .await;

        let terminal_log_id = match terminal_write {
            Ok(terminal_log_id) => Some(terminal_log_id),
            Err(write_error) => {
                error!(
                    request_id = %request.request_id(),
                    log_id,
                    status = status.as_str(),
                    error = %write_error,
                    "terminal audit write failed; audit record left in progress"
                );
                None
            }
        };

        info!(
            request_id = %request.request_id(),
            device_id = %request.device_id(),
            operation = operation.as_str(),
            status = status.as_str(),
            duration_seconds = duration.as_secs_f64(),
            "provisioning finished"
        );

        let resource_external_id = report.result?;
        if let Some(terminal_log_id) = terminal_log_id {
            self.attach_resource(&request, terminal_log_id, resource_external_id.as_str())
                .await;
        }

        Ok(receipt(&request, operation, resource_external_id))
    }

    // Faults inside the workflow, panics included, are folded into an
    // `error` outcome instead of escaping before the terminal write.
    async fn run_workflow_isolated(
        &self,
        request: &ProvisionRequest,
        operation: ProvisionOperation,
    ) -> WorkflowReport {
        let service = self.clone();
        let task_request = request.clone();
        let cancel = self.shutdown.child_token();

        let workflow =
            tokio::spawn(async move { service.run_workflow(&task_request, operation, &cancel).await });

        match workflow.await {
            Ok(report) => report,
            Err(join_error) => {
                error!(
                    request_id = %request.request_id(),
                    error = %join_error,
                    "provisioning workflow faulted"
                );
                WorkflowReport {
                    result: Err(AppError::Internal(format!(
                        "provisioning workflow faulted: {join_error}"
                    ))),
                    tool_duration: None,
                }
            }
        }
    }

    async fn attach_resource(
        &self,
        request: &ProvisionRequest,
        log_id: i64,
        resource_external_id: &str,
    ) {
        let attached = self
            .audit_store
            .attach_resource(AttachResourceInput {
                log_id,
                resource_type: RESOURCE_TYPE_INSTANCE.to_owned(),
                resource_name: request.params().instance_name().to_owned(),
                resource_external_id: resource_external_id.to_owned(),
            })
            .await;

        if let Err(error) = attached {
            error!(
                request_id = %request.request_id(),
                log_id,
                error = %error,
                "failed to attach resource to audit record"
            );
        }
    }
}

fn receipt(
    request: &ProvisionRequest,
    operation: ProvisionOperation,
    resource_external_id: String,
) -> ProvisionReceipt {
    let message = match operation {
        ProvisionOperation::Create => format!("Server created for device {}", request.device_id()),
        ProvisionOperation::Destroy => {
            format!("Server destroyed for device {}", request.device_id())
        }
    };

    ProvisionReceipt {
        message,
        device_id: request.device_id().as_str().to_owned(),
        resource_id: Some(resource_external_id),
    }
}
