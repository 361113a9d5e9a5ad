use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::{HandlerError, IntegrationEvent};

/// Subscription key that matches every event type.
pub const WILDCARD: &str = "*";

/// Subscriber that reacts to another service's integration events.
///
/// Delivery is at-least-once, so `handle` must be idempotent.
#[async_trait]
pub trait IntegrationEventHandler: Send + Sync {
    /// Stable name, used for de-duplication and dead letters.
    fn name(&self) -> &str;

    async fn handle(&self, event: &IntegrationEvent) -> Result<(), HandlerError>;
}

/// Handlers keyed by the event type they subscribed to.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    by_type: Arc<DashMap<String, Vec<Arc<dyn IntegrationEventHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, event_type: &str, handler: Arc<dyn IntegrationEventHandler>) {
        self.by_type
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }

    /// Handlers subscribed to `event_type` followed by wildcard handlers.
    pub fn matching(&self, event_type: &str) -> Vec<Arc<dyn IntegrationEventHandler>> {
        let mut handlers = Vec::new();
        if let Some(exact) = self.by_type.get(event_type) {
            handlers.extend(exact.iter().cloned());
        }
        if event_type != WILDCARD
            && let Some(any) = self.by_type.get(WILDCARD)
        {
            handlers.extend(any.iter().cloned());
        }
        handlers
    }

    pub fn len(&self) -> usize {
        self.by_type.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
