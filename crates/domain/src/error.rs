//! Domain error types.

use event_bus::BusError;
use event_store::EventStoreError;
use thiserror::Error;

/// Why an aggregate rejected a command.
///
/// Returned by processing functions; the broker turns it into the matching
/// [`CommandOutcome`](crate::CommandOutcome).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The command failed validation. Carries one message per problem.
    #[error("Validation failed: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The command contradicts the current state.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl CommandError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(vec![message.into()])
    }

    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Invalid(messages) => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Errors from domain operations outside command processing.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] BusError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_lists_every_message() {
        let err = CommandError::Invalid(vec![
            "first name is required".into(),
            "last name is required".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: first name is required; last name is required"
        );
        assert_eq!(err.messages().len(), 2);
    }

    #[test]
    fn transient_store_errors_stay_transient() {
        let err = DomainError::from(EventStoreError::Unavailable("down".into()));
        assert!(err.is_transient());
        assert!(!DomainError::from(BusError::Closed).is_transient());
    }
}
