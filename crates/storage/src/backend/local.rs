//! Local filesystem content store.
//!
//! This module provides a content store implementation for the local
//! filesystem. Content objects are stored as files directly inside a
//! configured directory and accessed using `tokio::fs` for async I/O. Remote
//! sources are fetched over HTTP(S) with `reqwest`.

use crate::backend::Content;
use crate::error::ErrorKind;
use crate::{ContentInfo, ContentStore, error::Result, name::validate as validate_name};
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Local filesystem content store.
///
/// Stores content objects as files in a directory on the local filesystem.
/// All names are relative to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use fetchbox_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/tmp/downloads")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory for content objects
    root: PathBuf,
    client: reqwest::Client,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Arguments
    /// * `root` - Absolute path to the content root directory
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, is not a directory, or
    /// the HTTP client cannot be initialised.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .or_raise(|| ErrorKind::BackendError("failed to initialise HTTP client".to_string()))?;
        Self::with_client(name, root, client)
    }

    /// Create a new local filesystem backend that fetches with a
    /// preconfigured HTTP client (proxies, timeouts, TLS roots, ...).
    pub fn with_client(name: impl Into<String>, root: impl AsRef<Path>, client: reqwest::Client) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::BackendError(format!("content root must be absolute: {}", root.display())));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::BackendError(format!("content root is not a directory: {}", root.display())));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root.to_string_lossy()))?;
        }
        Ok(Self { name: name.into(), root, client })
    }

    /// Get the absolute path for a content name.
    ///
    /// Validates the name and joins it with the root directory.
    fn absolute_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_name(name)?))
    }

    fn info(name: &str, metadata: Metadata) -> Result<ContentInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
        Ok(ContentInfo::new(name, metadata.len(), modified))
    }

    fn map_io_error(e: std::io::Error, name: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(name.to_string()),
            std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists(name.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(PathBuf::from(name)),
            _ => ErrorKind::Io(e),
        }
    }

    /// Stream the response body for `source` into `file`.
    async fn download(&self, source: &Url, file: &mut fs::File) -> Result<u64> {
        let mut response =
            self.client.get(source.clone()).send().await.or_raise(|| ErrorKind::Fetch(source.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16(), source.to_string()));
        }
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.or_raise(|| ErrorKind::Fetch(source.to_string()))? {
            file.write_all(&chunk).await.map_err(ErrorKind::Io)?;
            written += chunk.len() as u64;
        }
        file.sync_all().await.map_err(ErrorKind::Io)?;
        Ok(written)
    }
}

#[async_trait]
impl ContentStore for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn materialize(&self, name: &str, source: &Url) -> Result<u64> {
        if !matches!(source.scheme(), "http" | "https") {
            exn::bail!(ErrorKind::InvalidSource(source.to_string()));
        }
        let abs_path = self.absolute_path(name)?;
        // create_new() is what makes this create-if-absent: a name collision
        // surfaces as AlreadyExists instead of clobbering someone's content.
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&abs_path)
            .await
            .map_err(|e| Self::map_io_error(e, name))?;
        let partial = Partial::new(&self.name, abs_path);
        let written = self.download(source, &mut file).await?;
        partial.keep();
        tracing::debug!(backend = %self.name, name, source = %source, bytes = written, "Materialized content");
        Ok(written)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let abs_path = self.absolute_path(name)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn open(&self, name: &str) -> Result<Content> {
        let abs_path = self.absolute_path(name)?;
        let file = fs::File::open(&abs_path).await.map_err(|e| Self::map_io_error(e, name))?;
        let metadata = file.metadata().await.map_err(|e| Self::map_io_error(e, name))?;
        Ok(Content { info: Self::info(name, metadata)?, reader: Box::pin(file) })
    }

    async fn stat(&self, name: &str) -> Result<ContentInfo> {
        let abs_path = self.absolute_path(name)?;
        let metadata = fs::metadata(&abs_path).await.map_err(|e| Self::map_io_error(e, name))?;
        Self::info(name, metadata)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_path = self.absolute_path(from)?;
        let to_path = self.absolute_path(to)?;
        let backend = self.name.clone();
        // Runs to completion even if the caller stops waiting, so the object
        // never ends up reachable under both names.
        let outcome = tokio::task::spawn_blocking(move || link_then_unlink(&backend, &from_path, &to_path))
            .await
            .or_raise(|| ErrorKind::BackendError("rename task failed".to_string()))?;
        match outcome {
            Ok(()) => Ok(()),
            Err(Step::Link(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                exn::bail!(ErrorKind::NotFound(from.to_string()))
            },
            Err(Step::Link(e)) => Err(Self::map_io_error(e, to).into()),
            Err(Step::Unlink(e)) => Err(Self::map_io_error(e, from).into()),
        }
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let abs_path = self.absolute_path(name)?;
        Ok(fs::remove_file(&abs_path).await.map_err(|e| Self::map_io_error(e, name))?)
    }
}

/// Removes a freshly created content file when dropped, unless [`keep`]
/// was called. Drop also runs when the owning future is cancelled.
///
/// [`keep`]: Partial::keep
struct Partial<'a> {
    backend: &'a str,
    path: Option<PathBuf>,
}
impl<'a> Partial<'a> {
    fn new(backend: &'a str, path: PathBuf) -> Self {
        Self { backend, path: Some(path) }
    }

    fn keep(mut self) {
        self.path = None;
    }
}
impl Drop for Partial<'_> {
    fn drop(&mut self) {
        if let Some(path) = self.path.take()
            && let Err(e) = std::fs::remove_file(&path)
        {
            tracing::warn!(backend = %self.backend, path = %path.display(), error = %e, "Failed to remove partially materialized content");
        }
    }
}

/// Which half of a rename failed.
enum Step {
    Link(std::io::Error),
    Unlink(std::io::Error),
}

fn link_then_unlink(backend: &str, from: &Path, to: &Path) -> std::result::Result<(), Step> {
    // A hard link refuses to replace an existing destination, which a plain
    // rename(2) would silently do.
    match std::fs::hard_link(from, to) {
        Ok(()) => {},
        Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::AlreadyExists) => {
            return Err(Step::Link(e));
        },
        // Filesystem without hard link support: check-then-rename.
        Err(e) => {
            tracing::debug!(backend, error = %e, "Hard link failed; falling back to rename");
            if to.try_exists().map_err(Step::Link)? {
                return Err(Step::Link(std::io::Error::from(std::io::ErrorKind::AlreadyExists)));
            }
            return std::fs::rename(from, to).map_err(Step::Link);
        },
    }
    if let Err(e) = std::fs::remove_file(from) {
        // Undo the link so the object isn't reachable under both names.
        _ = std::fs::remove_file(to);
        return Err(Step::Unlink(e));
    }
    Ok(())
}
