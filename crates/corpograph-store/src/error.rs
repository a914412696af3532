use thiserror::Error;

/// Errors surfaced by the staging store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A payload was missing a required field. Ingestion is batch
    /// transactional, so one bad payload fails the whole batch.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// No node exists for the requested `(node_type, lookup_key)`.
    #[error("no node found for {node_type}/{lookup_key}")]
    NotFound {
        node_type: String,
        lookup_key: String,
    },

    /// A concurrent writer held the database through every retry attempt.
    /// The batch was not committed; resubmitting it verbatim is safe.
    #[error("store busy after {attempts} attempts")]
    Busy { attempts: u32 },

    #[error(transparent)]
    Database(#[from] duckdb::Error),

    #[error("encoding node data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the caller may retry the same call verbatim.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Busy { .. })
    }
}
