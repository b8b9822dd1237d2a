//! Storage models.

use time::OffsetDateTime;

/// Metadata about a stored content object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInfo {
    /// Content name (the key within the storage root)
    pub name: String,
    /// Content size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl ContentInfo {
    pub fn new(name: impl Into<String>, size: u64, modified: OffsetDateTime) -> Self {
        Self { name: name.into(), size, modified }
    }
}
