//! In-memory content store for testing.

use crate::backend::Content;
use crate::error::{ErrorKind, Result};
use crate::name::validate as validate_name;
use crate::{ContentInfo, ContentStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use url::Url;

/// A [`ContentStore`] operation that can have a [`Fault`] injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Materialize,
    Exists,
    Open,
    Rename,
    Remove,
}

/// How an injected fault manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The operation fails: materialize with a fetch error, everything else
    /// with an I/O error. Nothing is changed.
    Fail,
    /// The operation never completes (for exercising caller deadlines).
    Stall,
}

/// In-memory content store for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Remote
/// sources are simulated by a second map of URL to bytes: materializing an
/// unregistered URL fails like an unreachable host would.
///
/// # Examples
///
/// ```
/// use fetchbox_storage::backend::MockBackend;
/// use fetchbox_storage::ContentStore;
/// use url::Url;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("existing", b"data")])
///     .with_remote("http://example/a.png", b"PNG...");
/// assert!(backend.exists("existing").await.unwrap());
///
/// backend.materialize("fresh", &Url::parse("http://example/a.png")?).await.unwrap();
/// assert!(backend.exists("fresh").await.unwrap());
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<String, (OffsetDateTime, Vec<u8>)>>,
    remote: HashMap<String, Vec<u8>>,
    faults: RwLock<HashMap<Operation, Fault>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with content objects.
    ///
    /// Panics if any name fails validation. If test setup is wrong, then
    /// test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (name, data) in files {
            let name = name.into();
            if validate_name(&name).is_err() {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid name {name:?}");
            }
            map.insert(name, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            remote: HashMap::new(),
            faults: RwLock::new(HashMap::new()),
        }
    }

    /// Register bytes that materializing `url` will "download".
    pub fn with_remote(mut self, url: impl AsRef<str>, data: impl Into<Vec<u8>>) -> Self {
        // Normalise through Url so lookups match what callers parse.
        let key = Url::parse(url.as_ref()).map(String::from).unwrap_or_else(|_| url.as_ref().to_string());
        self.remote.insert(key, data.into());
        self
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Inject a fault into every subsequent call of `operation`.
    pub async fn inject(&self, operation: Operation, fault: Fault) {
        self.faults.write().await.insert(operation, fault);
    }

    /// Remove any fault injected into `operation`.
    pub async fn heal(&self, operation: Operation) {
        self.faults.write().await.remove(&operation);
    }

    /// Names of all stored objects, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.storage.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Bytes stored under `name`, if any.
    pub async fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.storage.read().await.get(name).map(|(_, data)| data.clone())
    }

    async fn check(&self, operation: Operation, failure: impl FnOnce() -> ErrorKind) -> Result<()> {
        // Copy the fault out so the lock isn't held while stalling.
        let fault = self.faults.read().await.get(&operation).copied();
        match fault {
            None => Ok(()),
            Some(Fault::Fail) => exn::bail!(failure()),
            Some(Fault::Stall) => std::future::pending().await,
        }
    }

    fn injected_io() -> ErrorKind {
        ErrorKind::Io(std::io::Error::other("injected failure"))
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl ContentStore for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn materialize(&self, name: &str, source: &Url) -> Result<u64> {
        let name = validate_name(name)?;
        self.check(Operation::Materialize, || ErrorKind::Fetch(source.to_string())).await?;
        let data = self
            .remote
            .get(source.as_str())
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::Fetch(source.to_string())))?;
        let mut guard = self.storage.write().await;
        if guard.contains_key(name) {
            exn::bail!(ErrorKind::AlreadyExists(name.to_string()));
        }
        let size = data.len() as u64;
        guard.insert(name.to_string(), (OffsetDateTime::now_utc(), data));
        Ok(size)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let name = validate_name(name)?;
        self.check(Operation::Exists, Self::injected_io).await?;
        Ok(self.storage.read().await.contains_key(name))
    }

    async fn open(&self, name: &str) -> Result<Content> {
        let name = validate_name(name)?;
        self.check(Operation::Open, Self::injected_io).await?;
        let (modified, data) = self
            .storage
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(name.to_string())))?;
        let info = ContentInfo::new(name, data.len() as u64, modified);
        Ok(Content { info, reader: Box::pin(Cursor::new(data)) })
    }

    async fn stat(&self, name: &str) -> Result<ContentInfo> {
        let name = validate_name(name)?;
        let guard = self.storage.read().await;
        let (modified, data) = guard.get(name).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(name.to_string())))?;
        Ok(ContentInfo::new(name, data.len() as u64, *modified))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = validate_name(from)?;
        let to = validate_name(to)?;
        self.check(Operation::Rename, Self::injected_io).await?;
        let mut guard = self.storage.write().await;
        if !guard.contains_key(from) {
            exn::bail!(ErrorKind::NotFound(from.to_string()));
        }
        if guard.contains_key(to) {
            exn::bail!(ErrorKind::AlreadyExists(to.to_string()));
        }
        if let Some(entry) = guard.remove(from) {
            guard.insert(to.to_string(), entry);
        }
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        self.check(Operation::Remove, Self::injected_io).await?;
        self.storage
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(name.to_string())))
    }
}
