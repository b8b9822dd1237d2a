//! SQLite connection handling for the `files` table.

use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Every registry operation is a handful of single-row statements, so a small
/// pool covers a busy server.
const MAX_CONNECTIONS: u32 = 4;
/// Must stay below the registry's default metadata deadline (5s), so a writer
/// waiting on the lock reports `SQLITE_BUSY` instead of timing out blind.
const BUSY_TIMEOUT: Duration = Duration::from_secs(1);

/// SQLite database holding file records.
///
/// Wrap it in a [`SqliteStore`](crate::SqliteStore) to use it as a
/// [`MetadataStore`](crate::MetadataStore).
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file at `path` and bring its schema up
    /// to date.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);
        Self::open(options, MAX_CONNECTIONS).await
    }

    /// Open a private in-memory database, for tests and `--database :memory:`.
    ///
    /// Everything is lost once the database is closed.
    pub async fn connect_in_memory() -> Result<Self> {
        // Each connection to ":memory:" is its own database.
        Self::open(SqliteConnectOptions::new().filename(":memory:"), 1).await
    }

    async fn open(options: SqliteConnectOptions, connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(connections)
            // The in-memory database disappears with its last connection.
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    #[instrument("migrating metadata database", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Fold the write-ahead log back into the main file and close the pool.
    ///
    /// The database must not be used afterwards.
    pub async fn close(&self) {
        if let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)").execute(&self.pool).await {
            tracing::debug!(error = %e, "WAL checkpoint on close failed");
        }
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::connect_in_memory().await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files").fetch_one(db.pool()).await.unwrap();
        assert_eq!(count, 0);
        db.close().await;
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_migrating_twice_is_harmless() {
        let db = Database::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_file_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fetchbox.sqlite");
        let db = Database::connect(&path).await.unwrap();
        assert!(path.exists());
        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode").fetch_one(db.pool()).await.unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        let (busy,): (i64,) = sqlx::query_as("PRAGMA busy_timeout").fetch_one(db.pool()).await.unwrap();
        assert_eq!(busy, BUSY_TIMEOUT.as_millis() as i64);
        db.close().await;
    }

    #[tokio::test]
    async fn test_close_checkpoints_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fetchbox.sqlite");
        let db = Database::connect(&path).await.unwrap();
        sqlx::query("INSERT INTO files (name, source_url) VALUES ('a', 'http://example/a')")
            .execute(db.pool())
            .await
            .unwrap();
        db.close().await;
        let wal = dir.path().join("fetchbox.sqlite-wal");
        assert!(!wal.exists() || std::fs::metadata(&wal).unwrap().len() == 0);
    }
}
