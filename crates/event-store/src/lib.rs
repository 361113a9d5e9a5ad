//! Storage collaborator for the command broker.
//!
//! Events are appended per aggregate with optimistic concurrency on the
//! aggregate version. Only an in-memory implementation ships; it can inject
//! transient failures so callers can exercise their retry paths.

pub mod error;
pub mod event;
pub mod memory;
pub mod query;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use query::EventQuery;
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt};
