//! The file registry.

use crate::deadline::{self, Deadlines};
use crate::error::{ErrorKind, Result};
use crate::names::{DEFAULT_NAME_LENGTH, NameGenerator};
use crate::saga::{Compensation, Saga};
use exn::ResultExt;
use fetchbox_metadata::{FileRecord, MetadataHandle, RecordId};
use fetchbox_storage::{ContentHandle, ContentReader};
use std::ops::Deref;
use tracing::instrument;
use url::Url;

/// How many content names [`FileRegistry::register`] tries before giving up.
pub const DEFAULT_NAME_ATTEMPTS: usize = 5;
/// How many times [`FileRegistry::delete`] follows a record renamed under it.
const RENAME_FOLLOWS: usize = 3;

/// A value read back from the metadata store after writing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmed<T> {
    /// What the store returned on re-read.
    pub value: T,
    /// `false` if the re-read value differs from what was written.
    pub verified: bool,
}

/// Outcome of a successful [`FileRegistry::delete`], carrying the removed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deletion {
    /// Content and record were both removed.
    Complete(FileRecord),
    /// The content was already gone (a dangling record); only the record
    /// was removed.
    RecordOnly(FileRecord),
}
impl Deletion {
    pub fn record(&self) -> &FileRecord {
        match self {
            Self::Complete(record) | Self::RecordOnly(record) => record,
        }
    }
}

/// An opened file, ready to stream.
pub struct Download {
    pub id: RecordId,
    pub record: FileRecord,
    /// Size of the content in bytes.
    pub size: u64,
    pub content: ContentReader,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("id", &self.id)
            .field("record", &self.record)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Sequences metadata and content store operations so the two stay in
/// agreement.
///
/// Neither store knows about the other and there's no transaction spanning
/// both. Each operation commits its steps in an order that leaves the least
/// harmful state behind on failure, undoes what it can, and reports
/// [`InconsistentState`](ErrorKind::InconsistentState) when it can't.
///
/// The registry holds no mutable state of its own; concurrent operations on
/// the same record race at the stores (last writer wins).
pub struct FileRegistry {
    content: ContentHandle,
    metadata: MetadataHandle,
    names: NameGenerator,
    name_length: usize,
    name_attempts: usize,
    deadlines: Deadlines,
}

impl FileRegistry {
    pub fn new(content: ContentHandle, metadata: MetadataHandle) -> Self {
        Self {
            content,
            metadata,
            names: NameGenerator::new(),
            name_length: DEFAULT_NAME_LENGTH,
            name_attempts: DEFAULT_NAME_ATTEMPTS,
            deadlines: Deadlines::default(),
        }
    }

    pub fn with_names(mut self, names: NameGenerator) -> Self {
        self.names = names;
        self
    }

    pub fn with_name_length(mut self, length: usize) -> Self {
        self.name_length = length;
        self
    }

    /// At least one attempt is always made.
    pub fn with_name_attempts(mut self, attempts: usize) -> Self {
        self.name_attempts = attempts.max(1);
        self
    }

    pub fn with_deadlines(mut self, deadlines: Deadlines) -> Self {
        self.deadlines = deadlines;
        self
    }

    pub fn content_store(&self) -> &ContentHandle {
        &self.content
    }

    pub fn metadata_store(&self) -> &MetadataHandle {
        &self.metadata
    }

    /// Download `source` into the content store and record it.
    ///
    /// The record is created first, reserving the generated name, and deleted
    /// again if the download fails. Generated names that already hold content
    /// or are already recorded are skipped.
    ///
    /// # Errors
    /// - [`InvalidInput`](ErrorKind::InvalidInput) if `source` isn't an http(s) URL
    /// - [`Fetch`](ErrorKind::Fetch) if the download failed (the record has been removed)
    /// - [`Conflict`](ErrorKind::Conflict) if no free name was found
    /// - [`InconsistentState`](ErrorKind::InconsistentState) if the download
    ///   failed and the record couldn't be removed
    #[instrument(skip(self))]
    pub async fn register(&self, source: &str) -> Result<RecordId> {
        let source = parse_source(source)?;
        for attempt in 1..=self.name_attempts {
            let name = self.names.generate(self.name_length);
            if deadline::content(self.deadlines.content, "content exists", self.content.exists(&name)).await? {
                tracing::debug!(attempt, %name, "generated name already holds content");
                continue;
            }

            let record = FileRecord::new(&name, source.as_str());
            let id = match deadline::metadata(self.deadlines.metadata, "metadata create", self.metadata.create(&record))
                .await
            {
                Ok(id) => id,
                Err(err) if matches!(err.deref(), ErrorKind::Conflict(_)) => {
                    tracing::debug!(attempt, %name, "generated name already recorded");
                    continue;
                },
                Err(err) => return Err(err),
            };
            let mut saga = Saga::new("register");
            saga.compensable("metadata create", Compensation::DeleteRecord(id.clone()));

            match deadline::fetch(self.deadlines.fetch, "materialize", self.content.materialize(&name, &source)).await {
                Ok(size) => {
                    tracing::info!(%id, %name, %source, size, "registered file");
                    return Ok(id);
                },
                // Content appeared under the name between the check and the write.
                Err(err) if matches!(err.deref(), ErrorKind::Conflict(_)) => {
                    let err = saga.abort(&self.metadata, &self.deadlines, err).await;
                    if err.needs_reconciliation() {
                        return Err(err);
                    }
                    tracing::debug!(attempt, %name, "generated name taken during download");
                },
                Err(err) => return Err(saga.abort(&self.metadata, &self.deadlines, err).await),
            }
        }
        exn::bail!(ErrorKind::Conflict(format!("no free content name after {} attempts", self.name_attempts)))
    }

    /// Read the record for `id`.
    pub async fn get(&self, id: &RecordId) -> Result<FileRecord> {
        deadline::metadata(self.deadlines.metadata, "metadata read", self.metadata.read(id)).await
    }

    pub async fn description(&self, id: &RecordId) -> Result<String> {
        Ok(self.get(id).await?.description)
    }

    /// Replace the description of `id`, returning the description as read
    /// back from the store.
    ///
    /// Name and source URL are written back unchanged. A re-read that doesn't
    /// match what was written is logged and reported through
    /// [`Confirmed::verified`].
    #[instrument(skip_all, fields(%id))]
    pub async fn describe(&self, id: &RecordId, description: &str) -> Result<Confirmed<String>> {
        let updated = self.get(id).await?.with_description(description);
        deadline::metadata(self.deadlines.metadata, "metadata update", self.metadata.update(id, &updated)).await?;

        let persisted = self.get(id).await?.description;
        let verified = persisted == description;
        if !verified {
            tracing::warn!(%id, written = description, %persisted, "re-read description differs from what was written");
        }
        Ok(Confirmed { value: persisted, verified })
    }

    /// Rename the content of `id` to `new_name`.
    ///
    /// The record is updated before the content is moved and is not rolled
    /// back: if moving the content fails the record names content that isn't
    /// there, reported as [`InconsistentState`](ErrorKind::InconsistentState).
    /// If the record was deleted while the content was moving, the moved
    /// content is removed too and the rename reports [`NotFound`](ErrorKind::NotFound).
    ///
    /// # Errors
    /// - [`InvalidInput`](ErrorKind::InvalidInput) if `new_name` isn't a single safe name
    /// - [`NotFound`](ErrorKind::NotFound) if the record or its content is missing
    /// - [`Conflict`](ErrorKind::Conflict) if content already exists under `new_name`
    #[instrument(skip_all, fields(%id, new_name))]
    pub async fn rename(&self, id: &RecordId, new_name: &str) -> Result<String> {
        fetchbox_storage::validate_name(new_name).map_err(ErrorKind::content)?;
        let record = self.get(id).await?;
        let old_name = record.name.clone();

        if !deadline::content(self.deadlines.content, "content exists", self.content.exists(&old_name)).await? {
            tracing::warn!(%id, name = %old_name, "record points at missing content");
            exn::bail!(ErrorKind::NotFound(format!("content {old_name}")));
        }
        if deadline::content(self.deadlines.content, "content exists", self.content.exists(new_name)).await? {
            exn::bail!(ErrorKind::Conflict(format!("content {new_name} already exists")));
        }

        let mut saga = Saga::new("rename");
        let updated = record.with_name(new_name);
        deadline::metadata(self.deadlines.metadata, "metadata update", self.metadata.update(id, &updated)).await?;
        saga.irreversible("metadata update");

        let moved = self.content.rename(&old_name, new_name);
        if let Err(err) = deadline::content(self.deadlines.content, "content rename", moved).await {
            return Err(saga.abort(&self.metadata, &self.deadlines, err).await);
        }

        // A delete that ran while the content was moving found nothing under
        // either name and took the record; the moved content is now ours to
        // remove.
        match self.get(id).await {
            Ok(_) => {},
            Err(err) if matches!(err.deref(), ErrorKind::NotFound(_)) => {
                tracing::warn!(%id, name = new_name, "record deleted during rename; removing moved content");
                let cleanup = self.content.remove(new_name);
                if let Err(cleanup) = deadline::content(self.deadlines.content, "content remove", cleanup).await
                    && !matches!(cleanup.deref(), ErrorKind::NotFound(_))
                {
                    tracing::error!(%id, name = new_name, "content left without a record");
                    return Err(cleanup.raise(ErrorKind::InconsistentState(format!("content {new_name} has no record"))));
                }
                return Err(err);
            },
            Err(err) => {
                tracing::warn!(%id, error = %err.deref(), "could not re-read record after rename");
            },
        }
        tracing::info!(%id, from = %old_name, to = new_name, "renamed file");
        Ok(new_name.to_string())
    }

    /// Remove the content of `id`, then its record.
    ///
    /// Content goes first so a failure in between leaves a record pointing at
    /// missing content, which a retried delete clears up.
    ///
    /// # Errors
    /// - [`NotFound`](ErrorKind::NotFound) if there is no record
    /// - [`InconsistentState`](ErrorKind::InconsistentState) if the content was
    ///   removed but the record wasn't
    #[instrument(skip_all, fields(%id))]
    pub async fn delete(&self, id: &RecordId) -> Result<Deletion> {
        let mut record = self.get(id).await?;
        let mut saga = Saga::new("delete");

        let mut removed = self.remove_content(&record.name).await?;
        // A rename running alongside may have moved the content after the
        // record was read; follow the record to wherever it points now.
        for _ in 0..RENAME_FOLLOWS {
            if removed {
                break;
            }
            let current = self.get(id).await?;
            if current.name == record.name {
                break;
            }
            tracing::debug!(%id, from = %record.name, to = %current.name, "record renamed during delete");
            record = current;
            removed = self.remove_content(&record.name).await?;
        }
        if removed {
            saga.irreversible("content removal");
        } else {
            tracing::warn!(%id, name = %record.name, "content already absent; deleting dangling record");
        }

        match deadline::metadata(self.deadlines.metadata, "metadata delete", self.metadata.delete(id)).await {
            Ok(()) => {},
            // Deleted concurrently; nothing is left diverged.
            Err(err) if matches!(err.deref(), ErrorKind::NotFound(_)) => return Err(err),
            Err(err) => return Err(saga.abort(&self.metadata, &self.deadlines, err).await),
        }

        tracing::info!(%id, name = %record.name, "deleted file");
        Ok(if removed { Deletion::Complete(record) } else { Deletion::RecordOnly(record) })
    }

    /// Remove content `name`, returning `false` if it was already gone.
    async fn remove_content(&self, name: &str) -> Result<bool> {
        if !deadline::content(self.deadlines.content, "content exists", self.content.exists(name)).await? {
            return Ok(false);
        }
        match deadline::content(self.deadlines.content, "content remove", self.content.remove(name)).await {
            Ok(()) => Ok(true),
            Err(err) if matches!(err.deref(), ErrorKind::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Open the content of `id` for reading.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the record doesn't exist,
    /// or if it does but its content doesn't.
    #[instrument(skip_all, fields(%id))]
    pub async fn fetch(&self, id: &RecordId) -> Result<Download> {
        let record = self.get(id).await?;
        let content = match deadline::content(self.deadlines.content, "content open", self.content.open(&record.name))
            .await
        {
            Ok(content) => content,
            Err(err) => {
                if matches!(err.deref(), ErrorKind::NotFound(_)) {
                    tracing::warn!(%id, name = %record.name, "record points at missing content");
                }
                return Err(err);
            },
        };
        Ok(Download {
            id: id.clone(),
            record,
            size: content.info.size,
            content: content.reader,
        })
    }
}

fn parse_source(source: &str) -> Result<Url> {
    let url = Url::parse(source).or_raise(|| ErrorKind::InvalidInput(format!("source {source:?} is not a URL")))?;
    if !matches!(url.scheme(), "http" | "https") {
        exn::bail!(ErrorKind::InvalidInput(format!("unsupported source scheme {:?}", url.scheme())));
    }
    Ok(url)
}
