//! Durable metadata for registered files.
//!
//! A [`FileRecord`] maps an opaque [`RecordId`] to the name of a content
//! object plus its source URL and description. The content itself lives
//! elsewhere (see `fetchbox-storage`); nothing in this crate checks that a
//! record's content actually exists.
//!
//! Two stores are provided:
//! - [`SqliteStore`]: the production store, backed by a SQLite [`Database`]
//! - [`MemoryStore`] (feature `mock`): an in-memory store with fault injection

mod db;
pub mod error;
#[cfg(feature = "mock")]
mod memory;
mod models;
mod sqlite;
mod store;

pub use crate::db::Database;
#[cfg(feature = "mock")]
pub use crate::memory::{Fault, MemoryStore, Operation};
pub use crate::models::{FileRecord, RecordId};
pub use crate::sqlite::SqliteStore;
pub use crate::store::MetadataStore;
use std::sync::Arc;

/// Shared handle to a metadata store.
pub type MetadataHandle = Arc<dyn MetadataStore + Send + Sync>;
