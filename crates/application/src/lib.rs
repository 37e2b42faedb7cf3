//! Application services and ports.

#![forbid(unsafe_code)]

mod device_locks;
mod lifecycle_controller;
mod provisioning_ports;
mod provisioning_service;

#[cfg(test)]
mod test_support;

pub use device_locks::{DeviceLockGuard, DeviceLocks};
pub use lifecycle_controller::{
    INSTANCE_ID_OUTPUT, LifecycleController, LifecyclePhase, LifecycleReport, ToolSettings,
};
pub use provisioning_ports::{
    AttachResourceInput, AuditStore, ProcessOutput, ProcessRunner, RecordStartInput,
    RecordTerminalInput, ToolCommand, WorkspaceMaterializer,
};
pub use provisioning_service::{ProvisionReceipt, ProvisioningService, RequestAuditView};
