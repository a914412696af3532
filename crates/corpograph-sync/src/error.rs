use corpograph_store::StoreError;
use thiserror::Error;

/// Errors surfaced by a synchronization run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No local node matches the requested root lookup key. Not retried.
    #[error("no node found for lookup key {0:?}")]
    RootNotFound(String),

    /// Reading the staging store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The remote graph store rejected or failed an operation. The run is
    /// aborted with local state untouched; re-running it is safe because
    /// every remote write is an idempotent upsert.
    #[error("remote graph store: {0}")]
    Remote(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SyncError {
    pub(crate) fn remote(err: anyhow::Error) -> Self {
        SyncError::Remote(err.into())
    }
}
