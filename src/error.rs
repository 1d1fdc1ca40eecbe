use thiserror::Error;

use crate::models::IndexType;

/// One `ComputedIndex` write that did not land.
#[derive(Debug, Error)]
#[error("failed to save {index_type}: {message}")]
pub struct PersistenceError {
    pub index_type: IndexType,
    pub message: String,
}

#[derive(Debug, Error)]
#[error("dashboard query '{query}' failed: {message}")]
pub struct AggregationError {
    pub query: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no file at {0}")]
    MissingFile(String),
    #[error("storage quota exceeded: {used} of {limit} bytes")]
    QuotaExceeded { used: u64, limit: u64 },
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}
