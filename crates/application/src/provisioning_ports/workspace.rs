use std::path::PathBuf;

use async_trait::async_trait;
use rigger_core::AppResult;
use rigger_domain::{DeviceId, InstanceParams};

/// Port writing the configuration documents of one device workspace.
#[async_trait]
pub trait WorkspaceMaterializer: Send + Sync {
    /// Renders and writes the workspace, returning its directory.
    ///
    /// Fails with `AppError::Io` when the directory or a document cannot be
    /// written.
    async fn materialize(&self, device_id: &DeviceId, params: &InstanceParams)
    -> AppResult<PathBuf>;
}
