use thiserror::Error;

/// Errors raised by the bus itself.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus has been shut down and no longer accepts events.
    #[error("Event bus is closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure reported by an integration event handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Delivery may succeed later; the bus retries with backoff.
    #[error("Retryable handler failure: {0}")]
    Retryable(String),

    /// Delivery will never succeed; the event is dead-lettered at once.
    #[error("Fatal handler failure: {0}")]
    Fatal(String),
}

impl HandlerError {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::Retryable(reason.into())
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal(reason.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Fatal(format!("undecodable payload: {e}"))
    }
}
