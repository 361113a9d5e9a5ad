use std::sync::Arc;

use async_trait::async_trait;

use crate::{BusError, IntegrationEvent, IntegrationEventHandler};

/// Publishes integration events and routes them to subscribed handlers.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Enqueues an event for delivery and returns without waiting for
    /// handlers.
    async fn publish(&self, event: IntegrationEvent) -> Result<(), BusError>;

    /// Enqueues events in order.
    async fn publish_batch(&self, events: Vec<IntegrationEvent>) -> Result<(), BusError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    /// Registers `handler` for `event_type`; `"*"` subscribes to every type.
    fn subscribe(&self, event_type: &str, handler: Arc<dyn IntegrationEventHandler>);
}
