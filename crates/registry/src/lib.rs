//! Keeps file metadata and stored content consistent.
//!
//! [`FileRegistry`] is the only component that talks to both the
//! [metadata store](fetchbox_metadata::MetadataStore) and the
//! [content store](fetchbox_storage::ContentStore). Every logical action
//! (register, describe, rename, delete, fetch) is sequenced here, together
//! with what happens when one store succeeds and the other fails.

mod deadline;
pub mod error;
mod names;
mod registry;
mod saga;

pub use crate::deadline::Deadlines;
pub use crate::names::{DEFAULT_NAME_LENGTH, NameGenerator, generate as generate_name};
pub use crate::registry::{Confirmed, DEFAULT_NAME_ATTEMPTS, Deletion, Download, FileRegistry};
pub use fetchbox_metadata::{FileRecord, RecordId};
