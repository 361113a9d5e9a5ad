use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Snapshot, Version,
    store::{AppendOptions, EventStore, validate_events_for_append},
};

#[derive(Default)]
struct StoreState {
    /// Every event in insertion order.
    log: Vec<EventEnvelope>,
    /// Positions in `log` per aggregate, in version order.
    streams: HashMap<AggregateId, Vec<usize>>,
    snapshots: HashMap<AggregateId, Snapshot>,
}

impl StoreState {
    fn version_of(&self, aggregate_id: AggregateId) -> Option<Version> {
        self.streams
            .get(&aggregate_id)
            .and_then(|positions| positions.last())
            .map(|&pos| self.log[pos].version)
    }

    fn stream(&self, aggregate_id: AggregateId) -> impl Iterator<Item = &EventEnvelope> {
        self.streams
            .get(&aggregate_id)
            .into_iter()
            .flatten()
            .map(|&pos| &self.log[pos])
    }
}

/// Injected failures, used to exercise retry and timeout paths.
#[derive(Default)]
struct Faults {
    failing_appends: AtomicUsize,
    failing_reads: AtomicUsize,
    latency_ms: AtomicU64,
}

impl Faults {
    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// In-memory event store.
///
/// Cloning shares the underlying storage, so the broker and the read side of
/// a service can hold their own handles.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    state: Arc<RwLock<StoreState>>,
    faults: Arc<Faults>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.log.len()
    }

    /// Makes the next `count` appends fail with `Unavailable`.
    pub fn fail_next_appends(&self, count: usize) {
        self.faults.failing_appends.store(count, Ordering::Release);
    }

    /// Makes the next `count` reads fail with `Unavailable`.
    pub fn fail_next_reads(&self, count: usize) {
        self.faults.failing_reads.store(count, Ordering::Release);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.faults
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::Release);
    }

    async fn before_read(&self) -> Result<()> {
        self.delay().await;
        if Faults::take(&self.faults.failing_reads) {
            return Err(EventStoreError::Unavailable("injected read failure".into()));
        }
        Ok(())
    }

    async fn delay(&self) {
        let ms = self.faults.latency_ms.load(Ordering::Acquire);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;
        self.delay().await;
        if Faults::take(&self.faults.failing_appends) {
            return Err(EventStoreError::Unavailable(
                "injected append failure".into(),
            ));
        }

        let aggregate_id = events[0].aggregate_id;
        let mut state = self.state.write().await;
        let current = state.version_of(aggregate_id).unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current,
            });
        }

        // Versions are unique per aggregate even without an expected version.
        if events[0].version != current.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: events[0].version,
                actual: current,
            });
        }

        let mut last = current;
        for event in events {
            last = event.version;
            let pos = state.log.len();
            state.log.push(event);
            state.streams.entry(aggregate_id).or_default().push(pos);
        }

        metrics::counter!("event_store_appends_total").increment(1);
        tracing::debug!(%aggregate_id, version = %last, "events appended");
        Ok(last)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.before_read().await?;
        let state = self.state.read().await;
        Ok(state.stream(aggregate_id).cloned().collect())
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        self.before_read().await?;
        let state = self.state.read().await;
        Ok(state
            .stream(aggregate_id)
            .filter(|e| e.version >= from_version)
            .cloned()
            .collect())
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        self.before_read().await?;
        let state = self.state.read().await;
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(state
            .log
            .iter()
            .filter(|e| query.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        self.before_read().await?;
        Ok(self.state.read().await.version_of(aggregate_id))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.delay().await;
        let mut state = self.state.write().await;
        state.snapshots.insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        self.before_read().await?;
        Ok(self.state.read().await.snapshots.get(&aggregate_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventStoreExt;

    fn event(aggregate_id: AggregateId, version: i64, event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Customer")
            .event_type(event_type)
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn append_returns_last_version() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        let version = store
            .append(
                vec![event(id, 1, "CustomerCreated"), event(id, 2, "CustomerUpdated")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        assert_eq!(version, Version::new(2));
        assert_eq!(store.get_events_for_aggregate(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append(vec![event(id, 1, "CustomerCreated")], AppendOptions::expect_new())
            .await
            .unwrap();

        let result = store
            .append(vec![event(id, 2, "CustomerUpdated")], AppendOptions::expect_new())
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { actual, .. }) if actual == Version::first()
        ));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_version_conflicts_without_expectation() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append(vec![event(id, 1, "CustomerCreated")], AppendOptions::new())
            .await
            .unwrap();

        let result = store
            .append(vec![event(id, 1, "CustomerCreated")], AppendOptions::new())
            .await;
        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn injected_append_failures_leave_store_untouched() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store.fail_next_appends(1);

        let first = store
            .append(vec![event(id, 1, "CustomerCreated")], AppendOptions::expect_new())
            .await;
        assert!(matches!(first, Err(ref e) if e.is_transient()));
        assert_eq!(store.event_count().await, 0);

        let second = store
            .append(vec![event(id, 1, "CustomerCreated")], AppendOptions::expect_new())
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn injected_read_failures_are_transient() {
        let store = InMemoryEventStore::new();
        store.fail_next_reads(1);

        let id = AggregateId::new();
        assert!(store.get_aggregate_version(id).await.is_err());
        assert_eq!(store.get_aggregate_version(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn events_from_version() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        let batch = (1..=3).map(|v| event(id, v, "CustomerUpdated")).collect();
        store.append(batch, AppendOptions::new()).await.unwrap();

        let tail = store
            .get_events_for_aggregate_from_version(id, Version::new(2))
            .await
            .unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].version, Version::new(2));
    }

    #[tokio::test]
    async fn query_by_kind_keeps_insertion_order() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();
        store
            .append(vec![event(a, 1, "CustomerCreated")], AppendOptions::new())
            .await
            .unwrap();
        store
            .append(vec![event(b, 1, "CustomerCreated")], AppendOptions::new())
            .await
            .unwrap();
        store
            .append(vec![event(a, 2, "CustomerRemoved")], AppendOptions::new())
            .await
            .unwrap();

        let created = store
            .query_events(EventQuery::of_kind("Customer", "CustomerCreated"))
            .await
            .unwrap();
        let ids: Vec<_> = created.iter().map(|e| e.aggregate_id).collect();
        assert_eq!(ids, vec![a, b]);

        let limited = store
            .query_events(EventQuery::new().limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn load_aggregate_starts_after_snapshot() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        let batch = (1..=4).map(|v| event(id, v, "CustomerUpdated")).collect();
        store.append(batch, AppendOptions::new()).await.unwrap();

        let snapshot =
            Snapshot::capture(id, "Customer", Version::new(3), &serde_json::json!({})).unwrap();
        store.save_snapshot(snapshot).await.unwrap();

        let (snapshot, events) = store.load_aggregate(id).await.unwrap();
        assert_eq!(snapshot.map(|s| s.version), Some(Version::new(3)));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].version, Version::new(4));
    }

    #[tokio::test]
    async fn unknown_aggregate_has_no_version() {
        let store = InMemoryEventStore::new();
        assert!(!store.aggregate_exists(AggregateId::new()).await.unwrap());
    }
}
