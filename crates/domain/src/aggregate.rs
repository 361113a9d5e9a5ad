//! Core aggregate and domain event traits.

use common::AggregateId;
use event_bus::{BusError, IntegrationEvent};
use event_store::{EventEnvelope, Version};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events are immutable facts named in past tense. They carry the
/// data `apply` needs to update the aggregate.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Event kind, stored as the envelope's `event_type`.
    fn event_type(&self) -> &'static str;
}

/// Lifecycle of an aggregate instance.
///
/// ```text
/// Uninitialized ──Created──► Active ──Updated──► Active
///                              │
///                              └──Removed──► Removed
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Active,
    Removed,
}

impl Lifecycle {
    /// Whether any event has been applied.
    pub fn exists(&self) -> bool {
        !matches!(self, Lifecycle::Uninitialized)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, Lifecycle::Removed)
    }
}

/// Trait for aggregates in an event-sourced system.
///
/// An aggregate is rebuilt by replaying its events through `apply`, which
/// must be pure, deterministic and infallible. Commands never touch state
/// directly; the command broker turns them into events first.
pub trait Aggregate:
    Default + Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    type Event: DomainEvent;

    /// Aggregate kind, e.g. "Customer".
    fn aggregate_type() -> &'static str;

    /// `None` until the creation event is applied.
    fn id(&self) -> Option<AggregateId>;

    fn version(&self) -> Version;

    /// Called by the broker after each applied envelope.
    fn set_version(&mut self, version: Version);

    fn lifecycle(&self) -> Lifecycle;

    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Integration events other services should see for `event`.
    ///
    /// Called on the state *before* `event` is applied, so implementations
    /// can compare old and new values.
    fn integration_events(
        &self,
        _event: &Self::Event,
        _envelope: &EventEnvelope,
    ) -> Result<Vec<IntegrationEvent>, BusError> {
        Ok(Vec::new())
    }
}

/// Aggregates whose state is periodically saved as a snapshot.
pub trait SnapshotCapable: Aggregate {
    /// Number of events between snapshots.
    fn snapshot_interval() -> usize {
        100
    }

    /// Whether moving from `previous` to the current version crossed a
    /// multiple of the interval.
    fn should_snapshot(&self, previous: Version) -> bool {
        let Ok(interval) = i64::try_from(Self::snapshot_interval()) else {
            return false;
        };
        if interval <= 0 {
            return false;
        }
        let (before, after) = (previous.as_i64().max(0), self.version().as_i64());
        after > before && before / interval < after / interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Opened { id: AggregateId },
        Set { value: i32 },
        Closed,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened { .. } => "CounterOpened",
                CounterEvent::Set { .. } => "CounterSet",
                CounterEvent::Closed => "CounterClosed",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Counter {
        id: Option<AggregateId>,
        value: i32,
        version: Version,
        lifecycle: Lifecycle,
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn lifecycle(&self) -> Lifecycle {
            self.lifecycle
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Opened { id } => {
                    self.id.get_or_insert(id);
                    self.lifecycle = Lifecycle::Active;
                }
                CounterEvent::Set { value } => self.value = value,
                CounterEvent::Closed => self.lifecycle = Lifecycle::Removed,
            }
        }
    }

    impl SnapshotCapable for Counter {
        fn snapshot_interval() -> usize {
            10
        }
    }

    #[test]
    fn apply_events_walks_the_lifecycle() {
        let id = AggregateId::new();
        let mut counter = Counter::default();
        assert!(!counter.lifecycle().exists());

        counter.apply_events([CounterEvent::Opened { id }, CounterEvent::Set { value: 42 }]);
        assert_eq!(counter.id(), Some(id));
        assert!(counter.lifecycle().is_active());
        assert_eq!(counter.value, 42);

        counter.apply(CounterEvent::Closed);
        assert!(counter.lifecycle().is_removed());
        assert!(counter.lifecycle().exists());
    }

    #[test]
    fn event_type_names() {
        assert_eq!(CounterEvent::Closed.event_type(), "CounterClosed");
        assert_eq!(CounterEvent::Set { value: 1 }.event_type(), "CounterSet");
    }

    #[test]
    fn snapshot_every_interval() {
        let mut counter = Counter::default();
        assert!(!counter.should_snapshot(Version::initial()));

        counter.set_version(Version::new(10));
        assert!(counter.should_snapshot(Version::new(9)));

        counter.set_version(Version::new(11));
        assert!(!counter.should_snapshot(Version::new(10)));
    }

    #[test]
    fn multi_event_step_across_interval_snapshots() {
        let mut counter = Counter::default();
        counter.set_version(Version::new(12));
        assert!(counter.should_snapshot(Version::new(8)));
        assert!(!counter.should_snapshot(Version::new(10)));

        counter.set_version(Version::new(25));
        assert!(counter.should_snapshot(Version::new(12)));
    }
}
