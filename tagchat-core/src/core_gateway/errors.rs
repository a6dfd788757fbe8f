//! Error types for the mutation gateway

use crate::core_store::StoreError;
use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur while publishing a mutation
///
/// A mutation that has nothing to do is not an error; see
/// [`super::WriteOutcome::Skipped`].
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The store refused or failed the write
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A draft built by the gateway does not satisfy its own contract
    #[error("Invalid {kind} draft: {reason}")]
    InvalidDraft { kind: &'static str, reason: String },

    /// Payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_convert() {
        let err: GatewayError = StoreError::Rejected("quota".to_string()).into();
        assert!(matches!(err, GatewayError::Store(StoreError::Rejected(_))));
        assert_eq!(err.to_string(), "Store error: Write rejected: quota");
    }

    #[test]
    fn test_invalid_draft_display() {
        let err = GatewayError::InvalidDraft {
            kind: "chat_name",
            reason: "missing describes".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid chat_name draft: missing describes");
    }
}
