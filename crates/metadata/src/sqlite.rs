//! SQLite-backed metadata store.

use crate::Database;
use crate::MetadataStore;
use crate::error::{ErrorKind, Result};
use crate::models::{FileRecord, FileRow, RecordId};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use sqlx::SqlitePool;
use tracing::instrument;

/// [`MetadataStore`] persisting records in the `files` table.
///
/// Record ids are the table's `AUTOINCREMENT` keys rendered as strings. An id
/// that doesn't parse as an integer can't name any row, so it is reported as
/// [`NotFound`](ErrorKind::NotFound) rather than as invalid input.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}
impl From<&Database> for SqliteStore {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of records currently stored.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_files.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(count.max(0) as u64)
    }

    /// Map a write result, turning `UNIQUE(name)` violations into conflicts.
    fn checked<T>(result: sqlx::Result<T>, name: &str) -> Result<T> {
        match result {
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                exn::bail!(ErrorKind::Conflict(name.to_string()))
            },
            other => other.or_raise(|| ErrorKind::Database),
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    #[instrument(level = "debug", skip(self, record), fields(name = %record.name))]
    async fn create(&self, record: &FileRecord) -> Result<RecordId> {
        let result = sqlx::query_scalar::<_, i64>(include_str!("../queries/insert_file.sql"))
            .bind(&record.name)
            .bind(&record.source_url)
            .bind(&record.description)
            .fetch_one(&self.pool)
            .await;
        let id = Self::checked(result, &record.name)?;
        Ok(RecordId::from(id))
    }

    async fn read(&self, id: &RecordId) -> Result<FileRecord> {
        let key = FileRow::key(id)?;
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_file.sql"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let (_, record) = row.ok_or_raise(|| ErrorKind::NotFound(id.clone()))?.into();
        Ok(record)
    }

    #[instrument(level = "debug", skip(self, record), fields(%id, name = %record.name))]
    async fn update(&self, id: &RecordId, record: &FileRecord) -> Result<()> {
        let key = FileRow::key(id)?;
        let result = sqlx::query(include_str!("../queries/update_file.sql"))
            .bind(&record.name)
            .bind(&record.source_url)
            .bind(&record.description)
            .bind(key)
            .execute(&self.pool)
            .await;
        let result = Self::checked(result, &record.name)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(id.clone()));
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    async fn delete(&self, id: &RecordId) -> Result<()> {
        let key = FileRow::key(id)?;
        let result = sqlx::query(include_str!("../queries/delete_file.sql"))
            .bind(key)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(id.clone()));
        }
        Ok(())
    }
}
