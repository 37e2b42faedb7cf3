use std::time::Duration;

use rigger_core::AppResult;
use rigger_domain::{ProvisionOperation, ProvisionRequest, teardown_marker};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::ProvisioningService;

/// Outcome of the fault-prone part of a workflow.
pub(super) struct WorkflowReport {
    /// Resource external id on success.
    pub(super) result: AppResult<String>,
    /// External tool wall-clock time, absent when the tool never ran.
    pub(super) tool_duration: Option<Duration>,
}

impl ProvisioningService {
    pub(super) async fn run_workflow(
        &self,
        request: &ProvisionRequest,
        operation: ProvisionOperation,
        cancel: &CancellationToken,
    ) -> WorkflowReport {
        let workspace = match self
            .materializer
            .materialize(request.device_id(), request.params())
            .await
        {
            Ok(workspace) => workspace,
            Err(error) => {
                warn!(
                    device_id = %request.device_id(),
                    error = %error,
                    "workspace materialization failed"
                );
                return WorkflowReport {
                    result: Err(error),
                    tool_duration: None,
                };
            }
        };

        info!(
            device_id = %request.device_id(),
            workspace = %workspace.display(),
            "workspace materialized"
        );

        let report = self
            .lifecycle
            .run(
                operation,
                workspace.as_path(),
                request.device_id(),
                request.params(),
                cancel,
            )
            .await;
        let tool_duration = Some(report.duration);

        if let Some(failure) = report.failure {
            return WorkflowReport {
                result: Err(failure),
                tool_duration,
            };
        }

        let resource_external_id = match operation {
            ProvisionOperation::Create => {
                let instance_id = match self
                    .lifecycle
                    .query_instance_id(workspace.as_path(), cancel)
                    .await
                {
                    Ok(instance_id) => instance_id,
                    Err(error) => {
                        warn!(
                            device_id = %request.device_id(),
                            error = %error,
                            "instance output query failed"
                        );
                        None
                    }
                };

                instance_id.unwrap_or_else(|| {
                    warn!(
                        device_id = %request.device_id(),
                        "instance id unavailable; recording device id instead"
                    );
                    request.device_id().as_str().to_owned()
                })
            }
            ProvisionOperation::Destroy => teardown_marker(request.device_id()),
        };

        WorkflowReport {
            result: Ok(resource_external_id),
            tool_duration,
        }
    }
}
