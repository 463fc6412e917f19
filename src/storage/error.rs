//! Storage Errors

/// Errors raised by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backend does not implement this capability
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// A stored row could not be turned back into a domain value
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Check if this error means the backend lacks a capability
    pub fn is_unsupported(&self) -> bool {
        matches!(self, StorageError::Unsupported(_))
    }
}
