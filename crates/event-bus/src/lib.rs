//! Integration event bus.
//!
//! Services publish [`IntegrationEvent`]s derived from their domain events;
//! other services subscribe [`IntegrationEventHandler`]s by event type. The
//! in-memory bus delivers asynchronously, at least once, with per-handler
//! retries and a dead-letter list.

pub mod bus;
pub mod error;
pub mod event;
pub mod handler;
pub mod memory;

pub use bus::EventBus;
pub use error::{BusError, HandlerError};
pub use event::{IntegrationEvent, IntegrationEventPayload};
pub use handler::{HandlerRegistry, IntegrationEventHandler, WILDCARD};
pub use memory::{DEFAULT_DELIVERY_LOG_CAPACITY, DeadLetter, InMemoryEventBus, RetryPolicy};
