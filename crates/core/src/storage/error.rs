use thiserror::Error;

use crate::order::OrderKey;

/// Errors surfaced by table storage operations.
///
/// Every operation propagates to its immediate caller; the only recovery
/// the client layer performs is bounded backoff on throttling-class errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Malformed key, patch, or expression. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Transient capacity exhaustion reported by the table service.
    #[error("throttled by the table service: {0}")]
    Throttled(String),

    /// Update target does not exist and no upsert is intended.
    #[error("record not found: {id}")]
    NotFound { id: String },

    /// A batch completed some deletions and left others unprocessed.
    /// Carries exactly the keys to retry.
    #[error("batch delete left {} key(s) unprocessed", unprocessed.len())]
    PartialBatchFailure { unprocessed: Vec<OrderKey> },

    /// A stored item could not be mapped back to a record.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The table service could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Any other failure reported by the table service.
    #[error("table service error: {0}")]
    Service(String),
}

impl StoreError {
    /// True for throttling-class errors, which the client retries with
    /// bounded exponential backoff.
    pub fn is_throttling(&self) -> bool {
        matches!(self, StoreError::Throttled(_))
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let error = StoreError::Validation("missing sort key".to_string());
        assert_eq!(error.to_string(), "validation failed: missing sort key");
    }

    #[test]
    fn test_not_found_display() {
        let error = StoreError::NotFound {
            id: "cus-05/ord-4".to_string(),
        };
        assert_eq!(error.to_string(), "record not found: cus-05/ord-4");
    }

    #[test]
    fn test_partial_batch_failure_display() {
        let error = StoreError::PartialBatchFailure {
            unprocessed: vec![
                OrderKey::new("cus-01", "ord-1"),
                OrderKey::new("cus-02", "ord-2"),
            ],
        };
        assert_eq!(error.to_string(), "batch delete left 2 key(s) unprocessed");
    }

    #[test]
    fn test_only_throttled_is_throttling() {
        assert!(StoreError::Throttled("capacity".to_string()).is_throttling());
        assert!(!StoreError::Validation("bad key".to_string()).is_throttling());
        assert!(!StoreError::Service("boom".to_string()).is_throttling());
    }
}
