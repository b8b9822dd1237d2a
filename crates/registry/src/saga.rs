//! Explicit compensation for multi-store operations.
//!
//! A [`Saga`] records each step of an operation as it commits. When a later
//! step fails, [`Saga::abort`] decides what the caller is told:
//!
//! - nothing committed, or only compensable steps: compensations run newest
//!   first and the original error is returned if they all succeed;
//! - a compensation fails, or an irreversible step had committed: the error is
//!   escalated to [`InconsistentState`](ErrorKind::InconsistentState).

use crate::deadline::{self, Deadlines};
use crate::error::{Error, ErrorKind, Result};
use fetchbox_metadata::{MetadataHandle, RecordId};
use std::ops::Deref;

/// Undo action for a committed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Compensation {
    /// Remove a metadata record created earlier in the operation.
    DeleteRecord(RecordId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Compensable(&'static str, Compensation),
    Irreversible(&'static str),
}

#[derive(Debug)]
pub(crate) struct Saga {
    operation: &'static str,
    committed: Vec<Step>,
}

impl Saga {
    pub(crate) fn new(operation: &'static str) -> Self {
        Self { operation, committed: Vec::new() }
    }

    /// Record a committed step that `compensation` can undo.
    pub(crate) fn compensable(&mut self, step: &'static str, compensation: Compensation) {
        self.committed.push(Step::Compensable(step, compensation));
    }

    /// Record a committed step that cannot be undone.
    pub(crate) fn irreversible(&mut self, step: &'static str) {
        self.committed.push(Step::Irreversible(step));
    }

    fn irreversible_step(&self) -> Option<&'static str> {
        self.committed.iter().rev().find_map(|step| match step {
            Step::Irreversible(name) => Some(*name),
            Step::Compensable(..) => None,
        })
    }

    /// Unwind after `err`, returning the error the caller should see.
    pub(crate) async fn abort(self, metadata: &MetadataHandle, deadlines: &Deadlines, err: Error) -> Error {
        let operation = self.operation;
        if let Some(step) = self.irreversible_step() {
            tracing::error!(operation, step, error = %err.deref(), "failed after an irreversible step");
            return err.raise(ErrorKind::InconsistentState(format!("{operation} failed after {step}")));
        }
        for step in self.committed.into_iter().rev() {
            let Step::Compensable(step, compensation) = step else {
                continue;
            };
            tracing::warn!(operation, step, ?compensation, error = %err.deref(), "compensating");
            if let Err(failure) = compensate(metadata, deadlines, &compensation).await {
                tracing::error!(
                    operation,
                    step,
                    ?compensation,
                    error = %failure.deref(),
                    "compensation failed; record left dangling"
                );
                return err.raise(ErrorKind::InconsistentState(format!(
                    "{operation} failed and undoing {step} failed too"
                )));
            }
        }
        err
    }
}

async fn compensate(metadata: &MetadataHandle, deadlines: &Deadlines, compensation: &Compensation) -> Result<()> {
    match compensation {
        Compensation::DeleteRecord(id) => {
            match deadline::metadata(deadlines.metadata, "compensating delete", metadata.delete(id)).await {
                // Already gone is what the compensation wanted.
                Err(err) if matches!(err.deref(), ErrorKind::NotFound(_)) => Ok(()),
                other => other,
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetchbox_metadata::{Fault, FileRecord, MemoryStore, MetadataStore, Operation};
    use std::sync::Arc;

    fn original() -> Error {
        Error::from(ErrorKind::Fetch)
    }

    async fn store_with_record() -> (Arc<MemoryStore>, RecordId) {
        let store = Arc::new(MemoryStore::new());
        let id = store.create(&FileRecord::new("name", "http://example/a.png")).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn test_nothing_committed_returns_original() {
        let (store, _) = store_with_record().await;
        let handle: MetadataHandle = store.clone();
        let err = Saga::new("register").abort(&handle, &Deadlines::default(), original()).await;
        assert!(matches!(&*err, ErrorKind::Fetch));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_compensation_runs() {
        let (store, id) = store_with_record().await;
        let handle: MetadataHandle = store.clone();
        let mut saga = Saga::new("register");
        saga.compensable("metadata create", Compensation::DeleteRecord(id));
        let err = saga.abort(&handle, &Deadlines::default(), original()).await;
        assert!(matches!(&*err, ErrorKind::Fetch));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_compensating_an_absent_record_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let handle: MetadataHandle = store.clone();
        let mut saga = Saga::new("register");
        saga.compensable("metadata create", Compensation::DeleteRecord(RecordId::from("7")));
        let err = saga.abort(&handle, &Deadlines::default(), original()).await;
        assert!(matches!(&*err, ErrorKind::Fetch));
    }

    #[tokio::test]
    async fn test_failed_compensation_escalates() {
        let (store, id) = store_with_record().await;
        store.inject(Operation::Delete, Fault::Fail).await;
        let handle: MetadataHandle = store.clone();
        let mut saga = Saga::new("register");
        saga.compensable("metadata create", Compensation::DeleteRecord(id.clone()));
        let err = saga.abort(&handle, &Deadlines::default(), original()).await;
        assert!(err.needs_reconciliation());
        assert!(store.get(&id).await.is_some());
    }

    #[tokio::test]
    async fn test_irreversible_step_escalates_without_compensating() {
        let (store, id) = store_with_record().await;
        let handle: MetadataHandle = store.clone();
        let mut saga = Saga::new("rename");
        saga.compensable("metadata create", Compensation::DeleteRecord(id.clone()));
        saga.irreversible("metadata update");
        let err = saga.abort(&handle, &Deadlines::default(), original()).await;
        assert!(matches!(&*err, ErrorKind::InconsistentState(msg) if msg.contains("metadata update")));
        assert!(store.get(&id).await.is_some());
    }
}
