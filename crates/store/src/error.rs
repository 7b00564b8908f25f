use std::path::PathBuf;

use pulseboard_core::types::WidgetId;
use pulseboard_core::CoreError;

/// Failure of the durable storage layer itself.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Keys name a single file, so path separators are refused.
    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),
}

/// Errors returned by [`WidgetStore`](crate::WidgetStore) mutations.
///
/// A failed mutation leaves both the in-memory collection and durable
/// storage unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Widget id '{0}' already exists")]
    DuplicateId(WidgetId),

    #[error("New order is not a permutation of the current widgets")]
    NotAPermutation,

    #[error("Widget '{0}' not found")]
    NotFound(WidgetId),

    #[error("Index {index} out of bounds for {len} widgets")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
