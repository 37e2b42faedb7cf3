use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rigger_application::WorkspaceMaterializer;
use rigger_core::{AppError, AppResult};
use rigger_domain::{DeviceId, InstanceParams, WorkspaceTemplate};
use tracing::debug;

/// Writes rendered workspaces to `<root>/<device_id>`.
///
/// Files are overwritten on every call; other files already in the directory
/// (tool caches, state lock files) are left alone.
#[derive(Debug, Clone)]
pub struct FsWorkspaceMaterializer {
    root: PathBuf,
    template: WorkspaceTemplate,
}

impl FsWorkspaceMaterializer {
    /// Creates a materializer rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, template: WorkspaceTemplate) -> Self {
        Self {
            root: root.into(),
            template,
        }
    }

    /// Returns the workspace root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn workspace_dir(&self, device_id: &DeviceId) -> PathBuf {
        self.root.join(device_id.as_str())
    }
}

#[async_trait]
impl WorkspaceMaterializer for FsWorkspaceMaterializer {
    async fn materialize(
        &self,
        device_id: &DeviceId,
        params: &InstanceParams,
    ) -> AppResult<PathBuf> {
        let directory = self.workspace_dir(device_id);
        tokio::fs::create_dir_all(&directory).await.map_err(|error| {
            AppError::Io(format!(
                "failed to create workspace directory '{}': {error}",
                directory.display()
            ))
        })?;

        for file in self.template.render(device_id, params).files() {
            let path = directory.join(file.name);
            tokio::fs::write(&path, file.content.as_bytes())
                .await
                .map_err(|error| {
                    AppError::Io(format!(
                        "failed to write workspace file '{}': {error}",
                        path.display()
                    ))
                })?;
            debug!(path = %path.display(), "workspace file written");
        }

        Ok(directory)
    }
}

#[cfg(test)]
mod tests {
    use rigger_application::WorkspaceMaterializer;
    use rigger_core::AppError;
    use rigger_domain::{
        DeviceId, InstanceParams, MAIN_FILE, OUTPUTS_FILE, PROVIDER_FILE, VARIABLES_FILE,
        WorkspaceTemplate,
    };

    use super::FsWorkspaceMaterializer;

    fn inputs() -> (DeviceId, InstanceParams) {
        let (Ok(device_id), Ok(params)) = (DeviceId::new("dev123"), InstanceParams::new("web-1"))
        else {
            panic!("inputs should be valid");
        };
        (device_id, params)
    }

    #[tokio::test]
    async fn writes_all_template_files_under_device_directory() {
        let Ok(root) = tempfile::tempdir() else {
            panic!("tempdir should be created");
        };
        let materializer =
            FsWorkspaceMaterializer::new(root.path().join("workspaces"), WorkspaceTemplate::default());
        let (device_id, params) = inputs();

        let Ok(directory) = materializer.materialize(&device_id, &params).await else {
            panic!("materialize should succeed");
        };

        assert_eq!(directory, root.path().join("workspaces").join("dev123"));
        for name in [PROVIDER_FILE, VARIABLES_FILE, OUTPUTS_FILE, MAIN_FILE] {
            assert!(directory.join(name).is_file(), "{name} should exist");
        }

        let expected = WorkspaceTemplate::default().render(&device_id, &params);
        let main = std::fs::read_to_string(directory.join(MAIN_FILE)).unwrap_or_default();
        assert_eq!(Some(main.as_str()), expected.get(MAIN_FILE));
    }

    #[tokio::test]
    async fn rematerializing_overwrites_files_and_keeps_foreign_ones() {
        let Ok(root) = tempfile::tempdir() else {
            panic!("tempdir should be created");
        };
        let materializer = FsWorkspaceMaterializer::new(root.path(), WorkspaceTemplate::default());
        let (device_id, params) = inputs();

        let Ok(directory) = materializer.materialize(&device_id, &params).await else {
            panic!("first materialize should succeed");
        };
        assert!(std::fs::write(directory.join(MAIN_FILE), "stale").is_ok());
        assert!(std::fs::write(directory.join(".terraform.lock.hcl"), "lock").is_ok());

        assert!(materializer.materialize(&device_id, &params).await.is_ok());

        let main = std::fs::read_to_string(directory.join(MAIN_FILE)).unwrap_or_default();
        assert_ne!(main, "stale");
        assert!(directory.join(".terraform.lock.hcl").is_file());
    }

    #[tokio::test]
    async fn unwritable_root_is_an_io_error() {
        let Ok(root) = tempfile::tempdir() else {
            panic!("tempdir should be created");
        };
        let blocker = root.path().join("occupied");
        assert!(std::fs::write(&blocker, "not a directory").is_ok());
        let materializer = FsWorkspaceMaterializer::new(&blocker, WorkspaceTemplate::default());
        let (device_id, params) = inputs();

        let result = materializer.materialize(&device_id, &params).await;

        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
