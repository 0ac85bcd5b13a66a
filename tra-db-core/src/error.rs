//! Error types shared across the TRA entity store

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in store operations
#[derive(Error, Debug)]
pub enum Error {
    /// Storage/IO error after the backend's own retry policy is exhausted
    #[error("Storage error: {0}")]
    Storage(String),

    /// The backing store throttled the request
    #[error("Throttled: {0}")]
    Throttled(String),

    /// A conditional write guard failed (concurrent writer won)
    #[error("Write conflict on {pk}")]
    Conflict {
        /// Partition key of the contested item
        pk: String,
    },

    /// Update target does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed identifier or enum wire value
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored item is missing attributes required by its declared entity type
    #[error("Corrupt item: {0}")]
    Corrupt(String),
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a throttled error
    pub fn throttled(msg: impl Into<String>) -> Self {
        Self::Throttled(msg.into())
    }

    /// Create a write-conflict error
    pub fn conflict(pk: impl Into<String>) -> Self {
        Self::Conflict { pk: pk.into() }
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid-identifier error
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Create a corrupt-item error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// Whether this error is a conditional-write conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether this error is a throttling signal (retryable on the batch path)
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}
