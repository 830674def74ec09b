use crate::domain::{
    Attribute, AttributeRecord, AttributeRecordStore, AttributeType, DomainError, DomainResult,
    PersistenceSession, StoredAttributeRecord,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

/// Stat row for PostgreSQL storage
#[derive(Debug, Clone)]
pub struct StatRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub application: String,
    pub device_id: String,
}

/// Stat data row; `type` holds the one-character attribute tag
#[derive(Debug, Clone)]
pub struct StatDataRow {
    pub key: String,
    pub attribute_type: String,
    pub value: String,
}

impl TryFrom<StatDataRow> for Attribute {
    type Error = DomainError;

    fn try_from(row: StatDataRow) -> Result<Self, Self::Error> {
        let attribute_type = row
            .attribute_type
            .trim_end()
            .parse::<AttributeType>()
            .map_err(DomainError::DecodeError)?;
        Ok(Attribute::from_stored(row.key, attribute_type, row.value))
    }
}

/// PostgreSQL implementation of AttributeRecordStore trait
#[derive(Clone)]
pub struct PostgresAttributeRecordStore {
    client: PostgresClient,
}

impl PostgresAttributeRecordStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AttributeRecordStore for PostgresAttributeRecordStore {
    async fn begin(&self) -> DomainResult<Box<dyn PersistenceSession>> {
        Ok(Box::new(PostgresPersistenceSession::new(self.client.clone())))
    }

    #[instrument(skip(self))]
    async fn get_record(&self, id: i64) -> DomainResult<Option<StoredAttributeRecord>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT id, created_at, application, device_id
                 FROM stats
                 WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let stat = StatRow {
            id: row.get(0),
            created_at: row.get(1),
            application: row.get(2),
            device_id: row.get(3),
        };

        let data_rows = conn
            .query(
                "SELECT key, type, value
                 FROM stat_data
                 WHERE stat_id = $1
                 ORDER BY key",
                &[&id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let attributes = data_rows
            .iter()
            .map(|row| {
                Attribute::try_from(StatDataRow {
                    key: row.get(0),
                    attribute_type: row.get(1),
                    value: row.get(2),
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        debug!(
            "found stat {} with {} attributes",
            stat.id,
            attributes.len()
        );

        Ok(Some(StoredAttributeRecord {
            id: stat.id,
            record: AttributeRecord::restore(
                stat.application,
                stat.device_id,
                stat.created_at,
                attributes,
            ),
        }))
    }

    #[instrument(skip(self))]
    async fn delete_record(&self, id: i64) -> DomainResult<bool> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        // stat_data rows follow through ON DELETE CASCADE
        let rows_affected = tx
            .execute("DELETE FROM stats WHERE id = $1", &[&id])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!("deleted {} stat rows for id {}", rows_affected, id);
        Ok(rows_affected > 0)
    }
}

/// Unit of work that stages records in memory and writes them in one transaction
pub struct PostgresPersistenceSession {
    client: PostgresClient,
    staged: Vec<AttributeRecord>,
    closed: bool,
}

impl PostgresPersistenceSession {
    pub fn new(client: PostgresClient) -> Self {
        Self {
            client,
            staged: Vec::new(),
            closed: false,
        }
    }

    fn ensure_open(&self) -> DomainResult<()> {
        if self.closed {
            return Err(DomainError::SessionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceSession for PostgresPersistenceSession {
    fn add(&mut self, record: AttributeRecord) -> DomainResult<()> {
        self.ensure_open()?;
        self.staged.push(record);
        Ok(())
    }

    #[instrument(skip(self), fields(staged = self.staged.len()))]
    async fn commit(&mut self) -> DomainResult<Vec<i64>> {
        self.ensure_open()?;
        self.closed = true;
        let staged = std::mem::take(&mut self.staged);

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        // Dropping the transaction on any error below rolls everything back
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let mut ids = Vec::with_capacity(staged.len());
        for record in &staged {
            let created_at = record.created_at();
            let row = tx
                .query_one(
                    "INSERT INTO stats (created_at, application, device_id)
                     VALUES ($1, $2, $3)
                     RETURNING id",
                    &[&created_at, &record.application(), &record.device_id()],
                )
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;
            let id: i64 = row.get(0);

            for attribute in record.attributes() {
                let tag = attribute.attribute_type().tag().to_string();
                tx.execute(
                    "INSERT INTO stat_data (stat_id, key, type, value)
                     VALUES ($1, $2, $3, $4)",
                    &[&id, &attribute.key(), &tag, &attribute.value()],
                )
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;
            }

            ids.push(id);
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!("committed {} stat records", ids.len());
        Ok(ids)
    }

    async fn rollback(&mut self) -> DomainResult<()> {
        self.ensure_open()?;
        self.closed = true;
        let discarded = std::mem::take(&mut self.staged);
        if !discarded.is_empty() {
            warn!("rolled back {} staged stat records", discarded.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postgres::PostgresConfig;
    use serde_json::json;

    fn lazy_client() -> PostgresClient {
        // Pool creation is lazy so no database is needed here
        PostgresClient::new(&PostgresConfig::default()).unwrap()
    }

    fn record() -> AttributeRecord {
        AttributeRecord::build(crate::domain::NewAttributeRecord {
            application: "app1".to_string(),
            device_id: "dev1".to_string(),
            fields: vec![("count".to_string(), json!(5))],
        })
        .unwrap()
    }

    #[test]
    fn test_stat_data_row_to_attribute() {
        let attribute = Attribute::try_from(StatDataRow {
            key: "temp".to_string(),
            attribute_type: "f".to_string(),
            value: "36.6".to_string(),
        })
        .unwrap();

        assert_eq!(attribute.key(), "temp");
        assert_eq!(attribute.attribute_type(), AttributeType::Float);
        assert_eq!(attribute.value(), "36.6");
    }

    #[test]
    fn test_stat_data_row_unknown_tag() {
        let result = Attribute::try_from(StatDataRow {
            key: "temp".to_string(),
            attribute_type: "x".to_string(),
            value: "36.6".to_string(),
        });

        assert!(matches!(result, Err(DomainError::DecodeError(_))));
    }

    #[tokio::test]
    async fn test_rollback_closes_session() {
        let mut session = PostgresPersistenceSession::new(lazy_client());
        session.add(record()).unwrap();

        session.rollback().await.unwrap();

        assert!(session.staged.is_empty());
        assert!(matches!(
            session.add(record()),
            Err(DomainError::SessionClosed)
        ));
        assert!(matches!(
            session.commit().await,
            Err(DomainError::SessionClosed)
        ));
    }
}
