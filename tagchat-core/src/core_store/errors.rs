/*
    errors.rs - Error types for the store capability

    Discovery reports per-item failures inside the stream; `put` reports a
    rejected write as its return value.
*/

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by an object store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A discovered item could not be parsed
    #[error("Malformed object: {0}")]
    Malformed(String),

    /// The caller may not read or write the object
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The store refused the write
    #[error("Write rejected: {0}")]
    Rejected(String),

    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(String),
}
