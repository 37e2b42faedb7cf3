use std::sync::Arc;

use rigger_application::{AuditStore, LifecycleController, ProvisioningService, ToolSettings};
use rigger_infrastructure::{
    FsWorkspaceMaterializer, InMemoryAuditStore, PostgresAuditStore, TokioProcessRunner,
};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::api_config::ApiConfig;

pub fn build_provisioning_service(
    config: &ApiConfig,
    pool: Option<PgPool>,
    shutdown: CancellationToken,
) -> ProvisioningService {
    let audit_store: Arc<dyn AuditStore> = match pool {
        Some(pool) => Arc::new(PostgresAuditStore::new(pool)),
        None => Arc::new(InMemoryAuditStore::new()),
    };
    let materializer = Arc::new(FsWorkspaceMaterializer::new(
        config.workspace_root.clone(),
        config.template.clone(),
    ));
    let runner = Arc::new(TokioProcessRunner::new(config.tool.output_limit_bytes));
    let lifecycle = LifecycleController::new(
        runner,
        ToolSettings {
            program: config.tool.program.clone(),
            backend_config: config.tool.backend_config.clone(),
            timeout: Some(config.tool.timeout),
        },
    );

    ProvisioningService::new(audit_store, materializer, lifecycle).with_shutdown_token(shutdown)
}
