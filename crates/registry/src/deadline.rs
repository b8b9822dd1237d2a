//! Bounded store calls.
//!
//! Every call the registry makes into a store goes through one of the
//! wrappers here. A call that outlives its deadline is abandoned and reported
//! as a failure of that step.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use fetchbox_metadata::error::Result as MetadataResult;
use fetchbox_storage::error::Result as StorageResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Upper bounds on how long each kind of store call may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    /// Metadata store create/read/update/delete.
    pub metadata: Duration,
    /// Content store exists/open/rename/remove.
    pub content: Duration,
    /// Content store materialize (includes the network download).
    pub fetch: Duration,
}
impl Default for Deadlines {
    fn default() -> Self {
        Self {
            metadata: Duration::from_secs(5),
            content: Duration::from_secs(5),
            fetch: Duration::from_secs(60),
        }
    }
}
impl Deadlines {
    /// The same deadline for every kind of call.
    pub fn uniform(deadline: Duration) -> Self {
        Self { metadata: deadline, content: deadline, fetch: deadline }
    }
}

pub(crate) async fn metadata<T>(
    deadline: Duration,
    step: &'static str,
    call: impl Future<Output = MetadataResult<T>>,
) -> Result<T> {
    match timeout(deadline, call).await {
        Ok(result) => result.map_err(ErrorKind::metadata),
        Err(elapsed) => {
            tracing::warn!(step, deadline_ms = deadline.as_millis() as u64, "metadata store call timed out");
            Err(elapsed).or_raise(|| ErrorKind::Store)
        },
    }
}

pub(crate) async fn content<T>(
    deadline: Duration,
    step: &'static str,
    call: impl Future<Output = StorageResult<T>>,
) -> Result<T> {
    match timeout(deadline, call).await {
        Ok(result) => result.map_err(ErrorKind::content),
        Err(elapsed) => {
            tracing::warn!(step, deadline_ms = deadline.as_millis() as u64, "content store call timed out");
            Err(elapsed).or_raise(|| ErrorKind::Write)
        },
    }
}

pub(crate) async fn fetch<T>(
    deadline: Duration,
    step: &'static str,
    call: impl Future<Output = StorageResult<T>>,
) -> Result<T> {
    match timeout(deadline, call).await {
        Ok(result) => result.map_err(ErrorKind::content),
        Err(elapsed) => {
            tracing::warn!(step, deadline_ms = deadline.as_millis() as u64, "remote fetch timed out");
            Err(elapsed).or_raise(|| ErrorKind::Fetch)
        },
    }
}
