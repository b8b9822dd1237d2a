//! File record models.

use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier assigned by a metadata store on creation.
///
/// Identifiers are immutable and never reused by the stores in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);
impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Metadata describing one registered file.
///
/// `name` is the content store key for the file's bytes. Whenever the two
/// disagree (the record names content that isn't there) the record is
/// *dangling*.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Content store key (generated blob name)
    pub name: String,
    /// URL the content was originally fetched from; informational only
    #[serde(rename = "url")]
    pub source_url: String,
    /// Free-form description
    pub description: String,
}
impl FileRecord {
    /// A freshly registered record: no description yet.
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
            description: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) source_url: String,
    pub(crate) description: String,
}
impl FileRow {
    /// Parse an opaque identifier back into the table's integer key.
    pub(crate) fn key(id: &RecordId) -> Result<i64, Error> {
        id.as_str().parse::<i64>().or_raise(|| ErrorKind::NotFound(id.clone()))
    }
}
impl From<FileRow> for (RecordId, FileRecord) {
    fn from(row: FileRow) -> Self {
        let record = FileRecord {
            name: row.name,
            source_url: row.source_url,
            description: row.description,
        };
        (RecordId::from(row.id), record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_new_record_has_empty_description() {
        let record = FileRecord::new("aB3dE9fGh1", "http://example/a.png");
        assert_eq!(record.description, "");
        let record = record.with_description("a cat");
        assert_eq!(record.description, "a cat");
        assert_eq!(record.name, "aB3dE9fGh1");
    }

    #[test]
    fn test_record_json_shape() {
        let record = FileRecord::new("b", "http://example/a.png").with_description("a cat");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"name": "b", "url": "http://example/a.png", "description": "a cat"}));
        assert_eq!(serde_json::from_value::<FileRecord>(json).unwrap(), record);
    }

    #[rstest]
    #[case("42", Some(42))]
    #[case("1", Some(1))]
    #[case("not-a-number", None)]
    #[case("", None)]
    fn test_row_key(#[case] id: &str, #[case] expected: Option<i64>) {
        let key = FileRow::key(&RecordId::from(id));
        match expected {
            Some(k) => assert_eq!(key.unwrap(), k),
            None => assert!(matches!(&*key.unwrap_err(), ErrorKind::NotFound(_))),
        }
    }

    #[test]
    fn test_row_to_model() {
        let row = FileRow {
            id: 42,
            name: "aB3dE9fGh1".to_string(),
            source_url: "http://example/a.png".to_string(),
            description: String::new(),
        };
        let (id, record) = row.into();
        assert_eq!(id, RecordId::from("42"));
        assert_eq!(record, FileRecord::new("aB3dE9fGh1", "http://example/a.png"));
    }
}
