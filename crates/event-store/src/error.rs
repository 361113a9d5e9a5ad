use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The expected version did not match the stored version.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The aggregate was not found in the event store.
    #[error("Aggregate not found: {0}")]
    AggregateNotFound(AggregateId),

    /// The batch handed to `append` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// An envelope was built without one of its required fields.
    #[error("Event envelope is missing `{0}`")]
    IncompleteEnvelope(&'static str),

    /// The backing store could not be reached.
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    /// A store call did not finish within its deadline.
    #[error("Event store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Transient errors may succeed when the same call is retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_io_failures_are_transient() {
        assert!(EventStoreError::Unavailable("down".into()).is_transient());
        assert!(EventStoreError::Timeout(std::time::Duration::from_millis(5)).is_transient());
        assert!(
            !EventStoreError::ConcurrencyConflict {
                aggregate_id: AggregateId::new(),
                expected: Version::first(),
                actual: Version::new(2),
            }
            .is_transient()
        );
        assert!(!EventStoreError::InvalidAppend("empty".into()).is_transient());
    }
}
