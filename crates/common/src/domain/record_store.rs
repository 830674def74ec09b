use crate::domain::{AttributeRecord, DomainResult};
use async_trait::async_trait;

/// Attribute record as read back from storage
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAttributeRecord {
    pub id: i64,
    pub record: AttributeRecord,
}

/// Explicit unit of work for writing attribute records
///
/// Implementations should:
/// - Only stage records on `add`, writing nothing
/// - Write every staged record and its attributes in one transaction on `commit`
/// - Leave nothing durable when `commit` fails or `rollback` is called
/// - Reject any call after the session was committed or rolled back
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PersistenceSession: Send {
    /// Stage a record together with its attributes
    fn add(&mut self, record: AttributeRecord) -> DomainResult<()>;

    /// Flush staged records atomically
    ///
    /// # Returns
    /// Storage ids of the written records, in staging order
    async fn commit(&mut self) -> DomainResult<Vec<i64>>;

    /// Discard staged records
    async fn rollback(&mut self) -> DomainResult<()>;
}

/// Storage for attribute records
/// Infrastructure layer (e.g., postgres) implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AttributeRecordStore: Send + Sync {
    /// Open a new persistence session
    async fn begin(&self) -> DomainResult<Box<dyn PersistenceSession>>;

    /// Load a record and its attributes
    async fn get_record(&self, id: i64) -> DomainResult<Option<StoredAttributeRecord>>;

    /// Delete a record; its attributes are removed in the same transaction
    ///
    /// # Returns
    /// false when no record had this id
    async fn delete_record(&self, id: i64) -> DomainResult<bool>;
}
