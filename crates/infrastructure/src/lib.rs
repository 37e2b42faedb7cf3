//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod fs_workspace_materializer;
mod in_memory_audit_store;
mod postgres_audit_store;
mod tokio_process_runner;

pub use fs_workspace_materializer::FsWorkspaceMaterializer;
pub use in_memory_audit_store::InMemoryAuditStore;
pub use postgres_audit_store::PostgresAuditStore;
pub use tokio_process_runner::{DEFAULT_OUTPUT_LIMIT_BYTES, TokioProcessRunner};
