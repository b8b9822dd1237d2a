//! Process wiring for `fetchbox serve`.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use fetchbox_config::Config;
use fetchbox_metadata::{Database, SqliteStore};
use fetchbox_registry::{Deadlines, FileRegistry};
use fetchbox_server::{AppState, create_router};
use fetchbox_storage::backend::LocalBackend;
use std::sync::Arc;
use tokio::net::TcpListener;

async fn open_database(config: &Config) -> Result<Database> {
    if config.metadata.is_in_memory() {
        tracing::warn!("using an in-memory metadata database; records are lost on shutdown");
        return Database::connect_in_memory().await.or_raise(|| ErrorKind::Metadata);
    }
    let path = &config.metadata.database;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Metadata)?;
    }
    Database::connect(path).await.or_raise(|| ErrorKind::Metadata)
}

/// Build the registry described by `config`.
pub fn registry(config: &Config, database: &Database) -> Result<FileRegistry> {
    let content = LocalBackend::new("local", &config.storage.root).or_raise(|| ErrorKind::Storage)?;
    let deadlines = Deadlines {
        metadata: config.deadlines.metadata(),
        content: config.deadlines.content(),
        fetch: config.deadlines.fetch(),
    };
    Ok(FileRegistry::new(Arc::new(content), Arc::new(SqliteStore::from(database)))
        .with_name_length(config.registry.name_length)
        .with_name_attempts(config.registry.name_attempts)
        .with_deadlines(deadlines))
}

pub async fn serve(config: Config) -> Result<()> {
    let database = open_database(&config).await?;
    let registry = registry(&config, &database)?;
    let listener = TcpListener::bind(config.server.listen).await.or_raise(|| ErrorKind::Serve)?;
    tracing::info!(
        listen = %config.server.listen,
        root = %config.storage.root.display(),
        database = %config.metadata.database.display(),
        "fetchbox v{} listening",
        env!("CARGO_PKG_VERSION"),
    );
    let served = axum::serve(listener, create_router(AppState::new(registry)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .or_raise(|| ErrorKind::Serve);
    database.close().await;
    served
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(err) => tracing::error!(error = %err, "could not listen for shutdown signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetchbox_config::IN_MEMORY;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_registry_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.root = dir.path().join("downloads");
        config.metadata.database = PathBuf::from(IN_MEMORY);
        let database = open_database(&config).await.unwrap();
        let registry = registry(&config, &database).unwrap();
        assert_eq!(registry.content_store().name(), "local");
        assert_eq!(registry.metadata_store().name(), "sqlite");
        assert!(config.storage.root.is_dir());
        database.close().await;
    }

    #[tokio::test]
    async fn test_database_parent_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.metadata.database = dir.path().join("nested").join("fetchbox.sqlite");
        let database = open_database(&config).await.unwrap();
        assert!(config.metadata.database.exists());
        database.close().await;
    }
}
