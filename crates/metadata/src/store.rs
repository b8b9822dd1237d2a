//! Metadata store trait.

use crate::error::Result;
use crate::models::{FileRecord, RecordId};
use async_trait::async_trait;

/// Durable storage for [`FileRecord`]s keyed by [`RecordId`].
///
/// Each operation is atomic on its own. There is no multi-operation
/// transaction; callers that need one record and one content object to agree
/// must compensate themselves.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Persist a new record and return the identifier the store assigned.
    ///
    /// Returns [`Conflict`](crate::error::ErrorKind::Conflict) if another
    /// record already uses the same content name.
    async fn create(&self, record: &FileRecord) -> Result<RecordId>;

    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) for unknown ids.
    async fn read(&self, id: &RecordId) -> Result<FileRecord>;

    /// Replace the record stored under `id`.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) for unknown ids
    /// and [`Conflict`](crate::error::ErrorKind::Conflict) if the new name is
    /// used by a different record.
    async fn update(&self, id: &RecordId, record: &FileRecord) -> Result<()>;

    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) for unknown ids.
    async fn delete(&self, id: &RecordId) -> Result<()>;
}
