use common::domain::{
    AttributeRecord, AttributeRecordStore, DomainError, DomainResult, NewAttributeRecord,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Domain service that turns one device payload into one persisted attribute record
///
/// Flow:
/// 1. Strip and validate `application` / `device_id`
/// 2. Encode every remaining field into a typed attribute
/// 3. Stage the record in a fresh persistence session
/// 4. Commit; nothing is durable unless the commit succeeds
pub struct StatIngestionService {
    store: Arc<dyn AttributeRecordStore>,
}

impl StatIngestionService {
    pub fn new(store: Arc<dyn AttributeRecordStore>) -> Self {
        Self { store }
    }

    /// Ingest a raw payload object
    ///
    /// # Returns
    /// Storage id of the new record
    #[instrument(skip(self, payload), fields(field_count = payload.len()))]
    pub async fn ingest(&self, payload: Map<String, Value>) -> DomainResult<i64> {
        let input = NewAttributeRecord::from_payload(payload);
        let record = AttributeRecord::build(input).inspect_err(|e| {
            debug!(error = %e, "rejected stat payload");
        })?;

        let application = record.application().to_string();
        let device_id = record.device_id().to_string();
        let attribute_count = record.len();

        let mut session = self.store.begin().await.inspect_err(|e| {
            error!(error = %e, "failed to open persistence session");
        })?;
        if let Err(e) = session.add(record) {
            if let Err(rollback_err) = session.rollback().await {
                warn!(error = %rollback_err, "rollback after failed add also failed");
            }
            return Err(e);
        }

        let ids = session.commit().await.inspect_err(|e| {
            error!(
                error = %e,
                application = %application,
                device_id = %device_id,
                "failed to commit stat record"
            );
        })?;

        let id = ids.first().copied().ok_or_else(|| {
            DomainError::RepositoryError(anyhow::anyhow!("commit returned no record id"))
        })?;

        debug!(
            stat_id = id,
            application = %application,
            device_id = %device_id,
            attribute_count,
            "stored stat record"
        );

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{
        AttributeType, MockAttributeRecordStore, MockPersistenceSession, PersistenceSession,
    };
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    fn store_with_session(session: MockPersistenceSession) -> MockAttributeRecordStore {
        let mut store = MockAttributeRecordStore::new();
        store
            .expect_begin()
            .times(1)
            .return_once(move || Ok(Box::new(session) as Box<dyn PersistenceSession>));
        store
    }

    #[tokio::test]
    async fn test_ingest_success() {
        let mut session = MockPersistenceSession::new();
        session
            .expect_add()
            .withf(|record: &AttributeRecord| {
                let temp = record.attribute("temp");
                let active = record.attribute("active");
                let count = record.attribute("count");
                record.application() == "app1"
                    && record.device_id() == "dev1"
                    && record.len() == 3
                    && temp.map(|a| (a.attribute_type(), a.value()))
                        == Some((AttributeType::Float, "36.6"))
                    && active.map(|a| (a.attribute_type(), a.value()))
                        == Some((AttributeType::Boolean, "1"))
                    && count.map(|a| (a.attribute_type(), a.value()))
                        == Some((AttributeType::Integer, "5"))
            })
            .times(1)
            .returning(|_| Ok(()));
        session
            .expect_commit()
            .times(1)
            .return_once(|| Ok(vec![42]));

        let service = StatIngestionService::new(Arc::new(store_with_session(session)));

        let result = service
            .ingest(payload(json!({
                "application": "app1",
                "device_id": "dev1",
                "temp": 36.6,
                "active": true,
                "count": 5,
            })))
            .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_ingest_missing_device_id() {
        // No expectations: opening a session would panic
        let service = StatIngestionService::new(Arc::new(MockAttributeRecordStore::new()));

        let result = service
            .ingest(payload(json!({"application": "app1", "count": 5})))
            .await;

        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_ingest_empty_application() {
        let service = StatIngestionService::new(Arc::new(MockAttributeRecordStore::new()));

        let result = service
            .ingest(payload(
                json!({"application": "", "device_id": "dev1", "count": 5}),
            ))
            .await;

        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_ingest_unsupported_type_persists_nothing() {
        let service = StatIngestionService::new(Arc::new(MockAttributeRecordStore::new()));

        let result = service
            .ingest(payload(json!({
                "application": "app1",
                "device_id": "dev1",
                "count": 5,
                "readings": [1, 2, 3],
            })))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::UnsupportedType { ref key, .. }) if key == "readings"
        ));
    }

    #[tokio::test]
    async fn test_ingest_commit_failure() {
        let mut session = MockPersistenceSession::new();
        session.expect_add().times(1).returning(|_| Ok(()));
        session.expect_commit().times(1).return_once(|| {
            Err(DomainError::RepositoryError(anyhow::anyhow!(
                "connection reset"
            )))
        });

        let service = StatIngestionService::new(Arc::new(store_with_session(session)));

        let result = service
            .ingest(payload(json!({"application": "app1", "device_id": "dev1"})))
            .await;

        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }

    #[tokio::test]
    async fn test_ingest_add_failure_rolls_back() {
        let mut session = MockPersistenceSession::new();
        session
            .expect_add()
            .times(1)
            .returning(|_| Err(DomainError::SessionClosed));
        session.expect_rollback().times(1).returning(|| Ok(()));
        session.expect_commit().times(0);

        let service = StatIngestionService::new(Arc::new(store_with_session(session)));

        let result = service
            .ingest(payload(json!({"application": "app1", "device_id": "dev1", "n": 1})))
            .await;

        assert!(matches!(result, Err(DomainError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_ingest_begin_failure() {
        let mut store = MockAttributeRecordStore::new();
        store.expect_begin().times(1).return_once(|| {
            Err(DomainError::RepositoryError(anyhow::anyhow!(
                "pool exhausted"
            )))
        });

        let service = StatIngestionService::new(Arc::new(store));

        let result = service
            .ingest(payload(json!({"application": "app1", "device_id": "dev1"})))
            .await;

        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }
}
