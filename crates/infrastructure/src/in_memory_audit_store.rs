use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use rigger_application::{
    AttachResourceInput, AuditStore, RecordStartInput, RecordTerminalInput,
};
use rigger_core::{AppError, AppResult};
use rigger_domain::{AuditRecord, AuditStatus, RequestId, ResourceRecord};

#[derive(Debug, Default)]
struct AuditTables {
    records: HashMap<RequestId, AuditRecord>,
    resources: Vec<ResourceRecord>,
    next_log_id: i64,
    next_resource_id: i64,
}

impl AuditTables {
    fn upsert(
        &mut self,
        request_id: RequestId,
        update: impl FnOnce(&mut AuditRecord),
        insert: impl FnOnce(i64) -> AuditRecord,
    ) -> i64 {
        if let Some(record) = self.records.get_mut(&request_id) {
            update(record);
            return record.log_id;
        }

        self.next_log_id += 1;
        let record = insert(self.next_log_id);
        let log_id = record.log_id;
        self.records.insert(request_id, record);
        log_id
    }
}

/// In-memory audit store for local runs and tests.
///
/// A single lock guards both tables so each upsert is atomic.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    tables: RwLock<AuditTables>,
}

impl InMemoryAuditStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn record_start(&self, input: RecordStartInput) -> AppResult<i64> {
        let mut tables = self.tables.write().await;
        let RecordStartInput {
            request_id,
            user_id,
            operation,
            started_at,
        } = input;

        Ok(tables.upsert(
            request_id.clone(),
            |record| {
                record.user_id = user_id.clone();
                record.operation = operation;
                record.status = AuditStatus::Started;
                record.duration_seconds = None;
                record.error_message = None;
                record.updated_at = started_at;
            },
            |log_id| AuditRecord {
                log_id,
                request_id,
                user_id: user_id.clone(),
                operation,
                status: AuditStatus::Started,
                duration_seconds: None,
                error_message: None,
                created_at: started_at,
                updated_at: started_at,
            },
        ))
    }

    async fn record_terminal(&self, input: RecordTerminalInput) -> AppResult<i64> {
        if !input.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "status '{}' is not terminal",
                input.status.as_str()
            )));
        }

        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let RecordTerminalInput {
            request_id,
            user_id,
            operation,
            status,
            duration_seconds,
            error_message,
        } = input;

        Ok(tables.upsert(
            request_id.clone(),
            |record| {
                record.user_id = user_id.clone();
                record.operation = operation;
                record.status = status;
                record.duration_seconds = duration_seconds;
                record.error_message = error_message.clone();
                record.updated_at = now;
            },
            |log_id| AuditRecord {
                log_id,
                request_id,
                user_id: user_id.clone(),
                operation,
                status,
                duration_seconds,
                error_message: error_message.clone(),
                created_at: now,
                updated_at: now,
            },
        ))
    }

    async fn attach_resource(&self, input: AttachResourceInput) -> AppResult<ResourceRecord> {
        let mut tables = self.tables.write().await;
        if !tables
            .records
            .values()
            .any(|record| record.log_id == input.log_id)
        {
            return Err(AppError::ReferentialIntegrity(format!(
                "audit record {} does not exist",
                input.log_id
            )));
        }

        tables.next_resource_id += 1;
        let resource = ResourceRecord {
            resource_id: tables.next_resource_id,
            log_id: input.log_id,
            resource_type: input.resource_type,
            resource_name: input.resource_name,
            resource_external_id: input.resource_external_id,
            created_at: Utc::now(),
        };
        tables.resources.push(resource.clone());

        Ok(resource)
    }

    async fn find_record(&self, request_id: &RequestId) -> AppResult<Option<AuditRecord>> {
        Ok(self.tables.read().await.records.get(request_id).cloned())
    }

    async fn list_resources(&self, log_id: i64) -> AppResult<Vec<ResourceRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .resources
            .iter()
            .filter(|resource| resource.log_id == log_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rigger_application::{
        AttachResourceInput, AuditStore, RecordStartInput, RecordTerminalInput,
    };
    use rigger_core::AppError;
    use rigger_domain::{AuditStatus, ProvisionOperation, RequestId};

    use super::InMemoryAuditStore;

    fn request_id(value: &str) -> RequestId {
        let Ok(request_id) = RequestId::parse(value) else {
            panic!("request id should be valid");
        };
        request_id
    }

    fn start(value: &str, user_id: &str) -> RecordStartInput {
        RecordStartInput {
            request_id: request_id(value),
            user_id: user_id.to_owned(),
            operation: ProvisionOperation::Create,
            started_at: Utc::now(),
        }
    }

    fn terminal(value: &str, status: AuditStatus) -> RecordTerminalInput {
        RecordTerminalInput {
            request_id: request_id(value),
            user_id: "alice".to_owned(),
            operation: ProvisionOperation::Destroy,
            status,
            duration_seconds: Some(2.0),
            error_message: Some("boom".to_owned()),
        }
    }

    #[tokio::test]
    async fn repeated_writes_keep_one_record_per_request() {
        let store = InMemoryAuditStore::new();

        let first = store.record_start(start("dev123", "alice")).await;
        let second = store
            .record_terminal(terminal("dev123", AuditStatus::Failed))
            .await;
        let third = store.record_start(start("dev123", "bob")).await;
        let other = store.record_start(start("dev456", "alice")).await;

        let (Ok(first), Ok(second), Ok(third), Ok(other)) = (first, second, third, other) else {
            panic!("writes should succeed");
        };
        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_ne!(first, other);

        let Ok(Some(record)) = store.find_record(&request_id("dev123")).await else {
            panic!("record should exist");
        };
        assert_eq!(record.status, AuditStatus::Started);
        assert_eq!(record.user_id, "bob");
        assert_eq!(record.operation, ProvisionOperation::Create);
        assert!(record.error_message.is_none());
        assert!(record.duration_seconds.is_none());
    }

    #[tokio::test]
    async fn terminal_write_records_outcome_fields() {
        let store = InMemoryAuditStore::new();
        assert!(store.record_start(start("dev123", "alice")).await.is_ok());
        assert!(
            store
                .record_terminal(terminal("dev123", AuditStatus::Failed))
                .await
                .is_ok()
        );

        let Ok(Some(record)) = store.find_record(&request_id("dev123")).await else {
            panic!("record should exist");
        };
        assert_eq!(record.status, AuditStatus::Failed);
        assert_eq!(record.operation, ProvisionOperation::Destroy);
        assert_eq!(record.duration_seconds, Some(2.0));
        assert_eq!(record.error_message.as_deref(), Some("boom"));
        assert!(record.updated_at >= record.created_at);
    }

    #[tokio::test]
    async fn started_is_rejected_as_terminal_status() {
        let store = InMemoryAuditStore::new();

        let result = store
            .record_terminal(terminal("dev123", AuditStatus::Started))
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn attach_requires_existing_record() {
        let store = InMemoryAuditStore::new();
        let Ok(log_id) = store.record_start(start("dev123", "alice")).await else {
            panic!("start should succeed");
        };

        let attached = store
            .attach_resource(AttachResourceInput {
                log_id,
                resource_type: "EC2".to_owned(),
                resource_name: "web-1".to_owned(),
                resource_external_id: "i-0abc".to_owned(),
            })
            .await;
        let missing = store
            .attach_resource(AttachResourceInput {
                log_id: log_id + 100,
                resource_type: "EC2".to_owned(),
                resource_name: "web-1".to_owned(),
                resource_external_id: "i-0abc".to_owned(),
            })
            .await;

        assert!(attached.is_ok());
        assert!(matches!(missing, Err(AppError::ReferentialIntegrity(_))));
        let Ok(resources) = store.list_resources(log_id).await else {
            panic!("resources should list");
        };
        assert_eq!(resources.len(), 1);
    }
}
