//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod provisioning;
mod workspace;

pub use audit::{AuditRecord, AuditStatus, RESOURCE_TYPE_INSTANCE, ResourceRecord, teardown_marker};
pub use provisioning::{
    DEVICE_ID_MAX_LENGTH, DEVICE_ID_MIN_LENGTH, DeviceId, INSTANCE_NAME_MAX_LENGTH,
    INSTANCE_NAME_MIN_LENGTH, InstanceParams, ProvisionOperation, ProvisionRequest, RequestId,
};
pub use workspace::{
    MAIN_FILE, OUTPUTS_FILE, PROVIDER_FILE, VARIABLES_FILE, WorkspaceFile, WorkspaceFiles,
    WorkspaceTemplate,
};
