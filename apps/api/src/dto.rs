use rigger_application::{ProvisionReceipt, RequestAuditView};
use rigger_domain::{AuditRecord, ResourceRecord};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub audit_backend: &'static str,
    pub audit_reachable: bool,
    pub detail: Option<String>,
}

/// Incoming payload for both provisioning operations.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/deploy-request.ts"
)]
pub struct DeployRequest {
    pub user: String,
    pub device_id: String,
    pub instance_name: String,
}

/// Successful provisioning result.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/provision-response.ts"
)]
pub struct ProvisionResponse {
    pub message: String,
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub resource_id: Option<String>,
}

impl From<ProvisionReceipt> for ProvisionResponse {
    fn from(value: ProvisionReceipt) -> Self {
        Self {
            message: value.message,
            device_id: value.device_id,
            resource_id: value.resource_id,
        }
    }
}

/// API representation of a resource attached to an audit record.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/request-resource-response.ts"
)]
pub struct RequestResourceResponse {
    pub resource_type: String,
    pub resource_name: String,
    pub resource_external_id: String,
    pub created_at: String,
}

impl From<ResourceRecord> for RequestResourceResponse {
    fn from(value: ResourceRecord) -> Self {
        Self {
            resource_type: value.resource_type,
            resource_name: value.resource_name,
            resource_external_id: value.resource_external_id,
            created_at: value.created_at.to_rfc3339(),
        }
    }
}

/// API representation of one request's audit trail.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/request-status-response.ts"
)]
pub struct RequestStatusResponse {
    pub request_id: String,
    pub user_id: String,
    pub operation: String,
    pub status: String,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub resources: Vec<RequestResourceResponse>,
}

impl From<RequestAuditView> for RequestStatusResponse {
    fn from(value: RequestAuditView) -> Self {
        let RequestAuditView { record, resources } = value;
        let AuditRecord {
            request_id,
            user_id,
            operation,
            status,
            duration_seconds,
            error_message,
            created_at,
            updated_at,
            ..
        } = record;

        Self {
            request_id: request_id.as_str().to_owned(),
            user_id,
            operation: operation.as_str().to_owned(),
            status: status.as_str().to_owned(),
            duration_seconds,
            error_message,
            created_at: created_at.to_rfc3339(),
            updated_at: updated_at.to_rfc3339(),
            resources: resources
                .into_iter()
                .map(RequestResourceResponse::from)
                .collect(),
        }
    }
}
