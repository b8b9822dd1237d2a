//! Content store trait and implementations.
//!
//! This module defines the `ContentStore` trait, which provides a unified
//! interface for content operations across different backends (local
//! filesystem, in-memory for tests, etc.).
//!

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::{Fault, MockBackend, Operation};
use crate::error::Result;
use crate::models::ContentInfo;
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;
use url::Url;

/// A `'static` reader over a content object's bytes.
pub type ContentReader = Pin<Box<dyn AsyncRead + Send + 'static>>;

/// An opened content object: its metadata plus a reader over its bytes.
pub struct Content {
    pub info: ContentInfo,
    pub reader: ContentReader,
}

/// Unified interface for content storage.
///
/// Content objects are raw bytes keyed by a flat name (see
/// [`validate_name`](crate::validate_name)). All operations are asynchronous
/// and operate on `&self`, so a single store can be shared between
/// concurrent requests behind an [`Arc`](std::sync::Arc).
///
/// The store knows nothing about metadata. Keeping content and metadata in
/// agreement is the job of the caller.
///
/// # Examples
///
/// ```
/// use fetchbox_storage::{ContentStore, error::Result};
///
/// async fn size_of(store: &dyn ContentStore, name: &str) -> Result<u64> {
///     if store.exists(name).await? {
///         Ok(store.stat(name).await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Fetch the bytes at `source` and store them under `name`.
    ///
    /// This is create-if-absent: returns
    /// [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists) rather than
    /// overwriting an existing object. Network and transport failures (including
    /// non-success HTTP statuses) are reported as
    /// [`Fetch`](crate::error::ErrorKind::Fetch) or
    /// [`Status`](crate::error::ErrorKind::Status); local write failures as
    /// [`Io`](crate::error::ErrorKind::Io). A materialize that fails, or whose
    /// future is dropped before it completes, leaves no partial object behind.
    ///
    /// Returns the number of bytes stored.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use url::Url;
    /// # use fetchbox_storage::{ContentStore, error::Result};
    /// # async fn example(store: &dyn ContentStore) -> Result<()> {
    /// let source = Url::parse("https://example.com/cat.png").unwrap();
    /// let bytes = store.materialize("aB3dE9fGh1", &source).await?;
    /// println!("Stored {bytes} bytes");
    /// # Ok(())
    /// # }
    /// ```
    async fn materialize(&self, name: &str, source: &Url) -> Result<u64>;

    /// Check if a content object exists.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Open a content object for streaming reads.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tokio::io::AsyncReadExt;
    /// # use fetchbox_storage::{ContentStore, error::Result};
    /// # async fn example(store: &dyn ContentStore) -> Result<()> {
    /// let mut content = store.open("aB3dE9fGh1").await?;
    /// let mut buf = Vec::with_capacity(content.info.size as usize);
    /// content.reader.read_to_end(&mut buf).await.unwrap();
    /// # Ok(())
    /// # }
    /// ```
    async fn open(&self, name: &str) -> Result<Content>;

    /// Get content metadata without reading the bytes.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn stat(&self, name: &str) -> Result<ContentInfo>;

    /// Rename a content object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if `from` does
    /// not exist and [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists)
    /// if `to` does. An existing destination is never overwritten, and the
    /// object is never left reachable under both names, even if the future
    /// is dropped part way through.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Remove a content object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn remove(&self, name: &str) -> Result<()>;
}
