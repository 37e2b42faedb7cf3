use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use rigger_application::{
    AttachResourceInput, AuditStore, RecordStartInput, RecordTerminalInput,
};
use rigger_core::{AppError, AppResult};
use rigger_domain::{AuditRecord, AuditStatus, ProvisionOperation, RequestId, ResourceRecord};

const FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgreSQL-backed audit store.
///
/// Both status writes are single upsert statements keyed by `request_id`, so
/// concurrent writers for one request never create a second row.
#[derive(Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditRecordRow {
    log_id: i64,
    request_id: String,
    user_id: String,
    operation: String,
    status: String,
    duration_seconds: Option<f64>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ResourceRow {
    resource_id: i64,
    log_id: i64,
    resource_type: String,
    resource_name: String,
    resource_external_id: String,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Persistence(format!("audit database unreachable: {error}"))
            })?;

        Ok(())
    }

    async fn record_start(&self, input: RecordStartInput) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO request_status_logs (
                request_id,
                user_id,
                operation,
                status,
                duration_seconds,
                error_message,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, 'started', NULL, NULL, $4, $4)
            ON CONFLICT (request_id)
            DO UPDATE SET
                user_id = EXCLUDED.user_id,
                operation = EXCLUDED.operation,
                status = 'started',
                duration_seconds = NULL,
                error_message = NULL,
                updated_at = EXCLUDED.updated_at
            RETURNING log_id
            "#,
        )
        .bind(input.request_id.as_str())
        .bind(input.user_id.as_str())
        .bind(input.operation.as_str())
        .bind(input.started_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to record start for request '{}': {error}",
                input.request_id
            ))
        })
    }

    async fn record_terminal(&self, input: RecordTerminalInput) -> AppResult<i64> {
        if !input.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "status '{}' is not terminal",
                input.status.as_str()
            )));
        }

        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO request_status_logs (
                request_id,
                user_id,
                operation,
                status,
                duration_seconds,
                error_message,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, now(), now())
            ON CONFLICT (request_id)
            DO UPDATE SET
                user_id = EXCLUDED.user_id,
                operation = EXCLUDED.operation,
                status = EXCLUDED.status,
                duration_seconds = EXCLUDED.duration_seconds,
                error_message = EXCLUDED.error_message,
                updated_at = now()
            RETURNING log_id
            "#,
        )
        .bind(input.request_id.as_str())
        .bind(input.user_id.as_str())
        .bind(input.operation.as_str())
        .bind(input.status.as_str())
        .bind(input.duration_seconds)
        .bind(input.error_message)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to record '{}' for request '{}': {error}",
                input.status.as_str(),
                input.request_id
            ))
        })
    }

    async fn attach_resource(&self, input: AttachResourceInput) -> AppResult<ResourceRecord> {
        let row = sqlx::query_as::<_, ResourceRow>(
            r#"
            INSERT INTO request_resources (
                log_id,
                resource_type,
                resource_name,
                resource_external_id
            )
            SELECT $1, $2, $3, $4
            WHERE EXISTS (
                SELECT 1 FROM request_status_logs WHERE log_id = $1
            )
            RETURNING
                resource_id,
                log_id,
                resource_type,
                resource_name,
                resource_external_id,
                created_at
            "#,
        )
        .bind(input.log_id)
        .bind(input.resource_type)
        .bind(input.resource_name)
        .bind(input.resource_external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            let is_foreign_key_violation = error
                .as_database_error()
                .and_then(|database_error| database_error.code())
                .is_some_and(|code| code == FOREIGN_KEY_VIOLATION);
            if is_foreign_key_violation {
                AppError::ReferentialIntegrity(format!(
                    "audit record {} does not exist",
                    input.log_id
                ))
            } else {
                AppError::Persistence(format!(
                    "failed to attach resource to audit record {}: {error}",
                    input.log_id
                ))
            }
        })?
        .ok_or_else(|| {
            AppError::ReferentialIntegrity(format!("audit record {} does not exist", input.log_id))
        })?;

        Ok(resource_from_row(row))
    }

    async fn find_record(&self, request_id: &RequestId) -> AppResult<Option<AuditRecord>> {
        let row = sqlx::query_as::<_, AuditRecordRow>(
            r#"
            SELECT
                log_id,
                request_id,
                user_id,
                operation,
                status,
                duration_seconds,
                error_message,
                created_at,
                updated_at
            FROM request_status_logs
            WHERE request_id = $1
            "#,
        )
        .bind(request_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to load audit record for request '{request_id}': {error}"
            ))
        })?;

        row.map(record_from_row).transpose()
    }

    async fn list_resources(&self, log_id: i64) -> AppResult<Vec<ResourceRecord>> {
        let rows = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT
                resource_id,
                log_id,
                resource_type,
                resource_name,
                resource_external_id,
                created_at
            FROM request_resources
            WHERE log_id = $1
            ORDER BY resource_id
            "#,
        )
        .bind(log_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to list resources for audit record {log_id}: {error}"
            ))
        })?;

        Ok(rows.into_iter().map(resource_from_row).collect())
    }
}

fn record_from_row(row: AuditRecordRow) -> AppResult<AuditRecord> {
    Ok(AuditRecord {
        log_id: row.log_id,
        request_id: RequestId::parse(row.request_id)?,
        user_id: row.user_id,
        operation: ProvisionOperation::parse(row.operation.as_str())?,
        status: AuditStatus::parse(row.status.as_str())?,
        duration_seconds: row.duration_seconds,
        error_message: row.error_message,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn resource_from_row(row: ResourceRow) -> ResourceRecord {
    ResourceRecord {
        resource_id: row.resource_id,
        log_id: row.log_id,
        resource_type: row.resource_type,
        resource_name: row.resource_name,
        resource_external_id: row.resource_external_id,
        created_at: row.created_at,
    }
}
