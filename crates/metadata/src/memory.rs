//! In-memory metadata store for testing.

use crate::MetadataStore;
use crate::error::{ErrorKind, Result};
use crate::models::{FileRecord, RecordId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A [`MetadataStore`] operation that can have a [`Fault`] injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

/// How an injected fault manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The operation fails without changing anything.
    Fail,
    /// The operation never completes.
    Stall,
    /// The operation is applied but the caller is told it failed (a lost
    /// acknowledgement).
    Drop,
}

/// In-memory metadata store for testing.
///
/// Ids are sequential integers starting at 1 (or wherever
/// [`with_next_id`](Self::with_next_id) says) and are never reused.
#[derive(Debug)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<RecordId, FileRecord>>,
    next_id: AtomicU64,
    faults: RwLock<HashMap<Operation, Fault>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_next_id(1)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start id assignment at `next`.
    pub fn with_next_id(next: u64) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(next),
            faults: RwLock::new(HashMap::new()),
        }
    }

    /// Inject a fault into every subsequent call of `operation`.
    pub async fn inject(&self, operation: Operation, fault: Fault) {
        self.faults.write().await.insert(operation, fault);
    }

    /// Remove any fault injected into `operation`.
    pub async fn heal(&self, operation: Operation) {
        self.faults.write().await.remove(&operation);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Snapshot of the record under `id`, bypassing injected faults.
    pub async fn get(&self, id: &RecordId) -> Option<FileRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Insert or overwrite a record directly, bypassing faults and checks.
    pub async fn put(&self, id: &RecordId, record: FileRecord) {
        self.records.write().await.insert(id.clone(), record);
    }

    /// Returns `Ok(true)` if the caller should apply the operation and then
    /// report failure.
    async fn check(&self, operation: Operation) -> Result<bool> {
        let fault = self.faults.read().await.get(&operation).copied();
        match fault {
            None => Ok(false),
            Some(Fault::Fail) => exn::bail!(ErrorKind::Database),
            Some(Fault::Stall) => std::future::pending().await,
            Some(Fault::Drop) => Ok(true),
        }
    }

    fn name_taken(records: &BTreeMap<RecordId, FileRecord>, name: &str, except: Option<&RecordId>) -> bool {
        records.iter().any(|(id, record)| record.name == name && Some(id) != except)
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, record: &FileRecord) -> Result<RecordId> {
        let dropped = self.check(Operation::Create).await?;
        let mut guard = self.records.write().await;
        if Self::name_taken(&guard, &record.name, None) {
            exn::bail!(ErrorKind::Conflict(record.name.clone()));
        }
        let id = RecordId::from(self.next_id.fetch_add(1, Ordering::SeqCst).to_string());
        guard.insert(id.clone(), record.clone());
        if dropped {
            exn::bail!(ErrorKind::Database);
        }
        Ok(id)
    }

    async fn read(&self, id: &RecordId) -> Result<FileRecord> {
        // Reads have no effect to keep, so a dropped read is a plain failure.
        if self.check(Operation::Read).await? {
            exn::bail!(ErrorKind::Database);
        }
        self.get(id).await.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id.clone())))
    }

    async fn update(&self, id: &RecordId, record: &FileRecord) -> Result<()> {
        let dropped = self.check(Operation::Update).await?;
        let mut guard = self.records.write().await;
        if !guard.contains_key(id) {
            exn::bail!(ErrorKind::NotFound(id.clone()));
        }
        if Self::name_taken(&guard, &record.name, Some(id)) {
            exn::bail!(ErrorKind::Conflict(record.name.clone()));
        }
        guard.insert(id.clone(), record.clone());
        if dropped {
            exn::bail!(ErrorKind::Database);
        }
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        let dropped = self.check(Operation::Delete).await?;
        if self.records.write().await.remove(id).is_none() {
            exn::bail!(ErrorKind::NotFound(id.clone()));
        }
        if dropped {
            exn::bail!(ErrorKind::Database);
        }
        Ok(())
    }
}
