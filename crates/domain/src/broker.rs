//! Command broker: routes a command to its aggregate, persists the resulting
//! events and publishes the integration events derived from them.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use backon::Retryable;
use common::AggregateId;
use dashmap::DashMap;
use event_bus::{EventBus, IntegrationEvent, RetryPolicy};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreError, EventStoreExt, Snapshot, Version,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::command::{Command, DispatchTable};
use crate::error::{CommandError, DomainError};
use crate::result::{CommandOutcome, CommandResult};

/// Store access limits applied by the broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Deadline for a single store call.
    pub store_timeout: Duration,

    /// Backoff for transient store failures and timeouts.
    pub store_retry: RetryPolicy,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            store_retry: RetryPolicy {
                max_retries: 3,
                min_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(500),
            },
        }
    }
}

type LockTable = DashMap<AggregateId, Arc<Mutex<()>>>;

struct Inner<S, A: Aggregate> {
    store: S,
    bus: Arc<dyn EventBus>,
    table: DispatchTable<A>,
    locks: Arc<LockTable>,
    /// Committed integration events the bus has not accepted yet, oldest
    /// first.
    outbox: Mutex<VecDeque<IntegrationEvent>>,
    config: BrokerConfig,
}

/// Exclusive hold on one aggregate id.
///
/// Dropping it unlocks the id and removes the table entry once nobody else
/// holds or waits on it, including when the owning future is dropped.
struct IdLock {
    locks: Arc<LockTable>,
    aggregate_id: AggregateId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl IdLock {
    async fn acquire(locks: &Arc<LockTable>, aggregate_id: AggregateId) -> Self {
        let mut held = Self {
            locks: Arc::clone(locks),
            aggregate_id,
            guard: None,
        };
        let mutex = locks.entry(aggregate_id).or_default().clone();
        held.guard = Some(mutex.lock_owned().await);
        held
    }
}

impl Drop for IdLock {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.aggregate_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Events of one command, ready to be appended.
struct Staged<A: Aggregate> {
    expected: Version,
    next: A,
    events: Vec<A::Event>,
    envelopes: Vec<EventEnvelope>,
    integration: Vec<IntegrationEvent>,
}

/// Executes commands against one aggregate kind.
///
/// Each invocation runs load → process → apply → append → publish while
/// holding a per-id lock, so commands for the same aggregate never
/// interleave inside this process. The append is additionally guarded by the
/// loaded version, which turns writers elsewhere into `Conflict`s.
///
/// Integration events go through an outbox: whatever the bus refuses after a
/// commit stays queued, in order, and is published ahead of later events by
/// the next commit, [`flush_outbox`](Self::flush_outbox) or
/// [`relay_outbox`](Self::relay_outbox).
///
/// Cloning is cheap and shares the dispatch table, locks and collaborators.
pub struct CommandBroker<S, A: Aggregate> {
    inner: Arc<Inner<S, A>>,
}

impl<S, A: Aggregate> Clone for CommandBroker<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, A> CommandBroker<S, A>
where
    S: EventStore + 'static,
    A: SnapshotCapable,
{
    pub fn new(
        store: S,
        bus: Arc<dyn EventBus>,
        table: DispatchTable<A>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                bus,
                table,
                locks: Arc::new(DashMap::new()),
                outbox: Mutex::new(VecDeque::new()),
                config,
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.inner.bus
    }

    /// Executes a command. Never fails; every problem becomes an outcome.
    pub async fn invoke<C>(&self, command: C) -> CommandResult<A>
    where
        C: Command<Aggregate = A>,
    {
        self.invoke_cancellable(command, CancellationToken::new())
            .await
    }

    /// Like [`invoke`](Self::invoke), but returns `Cancelled` if `cancel`
    /// fires before persistence starts. Once the append has been handed off
    /// it runs to completion even if this future is dropped.
    #[tracing::instrument(
        skip_all,
        fields(
            aggregate = A::aggregate_type(),
            command = C::NAME,
            aggregate_id = %command.aggregate_id(),
        )
    )]
    pub async fn invoke_cancellable<C>(
        &self,
        command: C,
        cancel: CancellationToken,
    ) -> CommandResult<A>
    where
        C: Command<Aggregate = A>,
    {
        let started = Instant::now();
        let result = self.dispatch(command, cancel).await;

        metrics::counter!(
            "broker_commands_total",
            "aggregate" => A::aggregate_type(),
            "command" => C::NAME,
            "outcome" => result.outcome.as_str()
        )
        .increment(1);
        metrics::histogram!(
            "broker_command_duration_seconds",
            "aggregate" => A::aggregate_type(),
            "command" => C::NAME
        )
        .record(started.elapsed().as_secs_f64());

        if result.is_accepted() {
            debug!(version = ?result.version, events = result.events.len(), "command accepted");
        } else {
            info!(outcome = %result.outcome, errors = ?result.errors, "command rejected");
        }
        result
    }

    /// Integration events committed but not yet accepted by the bus.
    pub async fn outbox_len(&self) -> usize {
        self.inner.outbox.lock().await.len()
    }

    /// Hands queued integration events to the bus. Returns how many are
    /// still waiting.
    pub async fn flush_outbox(&self) -> usize {
        self.inner.publish(Vec::new()).await
    }

    /// Flushes the outbox every `period` until `shutdown` fires.
    pub async fn relay_outbox(&self, period: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let remaining = self.flush_outbox().await;
                    if remaining > 0 {
                        debug!(remaining, "outbox still holds unpublished events");
                    }
                }
            }
        }
    }

    /// Current state of an active aggregate.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        Ok(self
            .load_any(aggregate_id)
            .await?
            .filter(|aggregate| aggregate.lifecycle().is_active()))
    }

    /// Current state of an aggregate, removed ones included.
    pub async fn load_any(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.inner.load_state(aggregate_id).await?;
        Ok(aggregate.lifecycle().exists().then_some(aggregate))
    }

    async fn dispatch<C>(&self, command: C, cancel: CancellationToken) -> CommandResult<A>
    where
        C: Command<Aggregate = A>,
    {
        let inner = &self.inner;
        if !inner.table.handles::<C>() {
            return CommandResult::failed(
                CommandOutcome::NotHandled,
                format!(
                    "no processing registered for {}/{}",
                    A::aggregate_type(),
                    C::NAME
                ),
            );
        }

        let aggregate_id = command.aggregate_id();
        if command.is_creation() && aggregate_id.is_nil() {
            return CommandError::invalid(format!("{} id is required", A::aggregate_type())).into();
        }

        let lock = tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(),
            lock = IdLock::acquire(&inner.locks, aggregate_id) => lock,
        };

        let loaded = tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(),
            loaded = inner.load_state(aggregate_id) => loaded,
        };
        let current = match loaded {
            Ok(aggregate) => aggregate,
            Err(e) => return store_failure("load", e),
        };

        if let Err(e) = check_preconditions(&current, &command) {
            return e.into();
        }

        let events = match inner.table.process(&current, &command) {
            Some(Ok(events)) => events,
            Some(Err(e)) => return e.into(),
            None => {
                return CommandResult::failed(
                    CommandOutcome::NotHandled,
                    format!("processing for {} did not accept the command", C::NAME),
                );
            }
        };

        if events.is_empty() {
            return CommandResult::accepted(current, events);
        }

        let staged = match stage(aggregate_id, &current, events, C::NAME) {
            Ok(staged) => staged,
            Err(e) => {
                error!(error = %e, "failed to stage events");
                return CommandResult::failed(CommandOutcome::Unavailable, e);
            }
        };

        if cancel.is_cancelled() {
            return cancelled();
        }

        let inner = Arc::clone(inner);
        let commit = tokio::spawn(async move { inner.commit(aggregate_id, staged, lock).await });
        match commit.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "commit task failed");
                CommandResult::failed(CommandOutcome::Unavailable, e)
            }
        }
    }
}

impl<S, A> Inner<S, A>
where
    S: EventStore + 'static,
    A: SnapshotCapable,
{
    async fn load_state(&self, aggregate_id: AggregateId) -> Result<A, EventStoreError> {
        self.with_store_retry("load", || self.replay(aggregate_id))
            .await
    }

    async fn replay(&self, aggregate_id: AggregateId) -> Result<A, EventStoreError> {
        let (snapshot, events) = self.store.load_aggregate(aggregate_id).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => snapshot.restore::<A>()?,
            None => A::default(),
        };
        for envelope in events {
            let event: A::Event = envelope.decode()?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }
        Ok(aggregate)
    }

    async fn commit(
        &self,
        aggregate_id: AggregateId,
        staged: Staged<A>,
        _lock: IdLock,
    ) -> CommandResult<A> {
        let Staged {
            expected,
            next,
            events,
            envelopes,
            integration,
        } = staged;

        let appended = self
            .with_store_retry("append", move || {
                self.store
                    .append(envelopes.clone(), AppendOptions::expect_version(expected))
            })
            .await;
        if let Err(e) = appended {
            return store_failure("append", e);
        }

        if next.should_snapshot(expected) {
            self.save_snapshot(aggregate_id, &next).await;
        }

        self.publish(integration).await;
        CommandResult::accepted(next, events)
    }

    /// Queues `events` behind anything still unpublished and hands the queue
    /// to the bus in order, stopping at the first refusal. Returns how many
    /// events remain queued.
    async fn publish(&self, events: Vec<IntegrationEvent>) -> usize {
        let mut outbox = self.outbox.lock().await;
        outbox.extend(events);
        if outbox.is_empty() {
            return 0;
        }

        while let Some(event) = outbox.front().cloned() {
            match self.bus.publish(event).await {
                Ok(()) => {
                    outbox.pop_front();
                }
                Err(e) => {
                    warn!(error = %e, pending = outbox.len(), "bus refused integration event, keeping it in the outbox");
                    metrics::counter!(
                        "broker_publish_failures_total",
                        "aggregate" => A::aggregate_type()
                    )
                    .increment(1);
                    break;
                }
            }
        }

        metrics::gauge!("broker_outbox_pending", "aggregate" => A::aggregate_type())
            .set(outbox.len() as f64);
        outbox.len()
    }

    async fn save_snapshot(&self, aggregate_id: AggregateId, aggregate: &A) {
        let snapshot = match Snapshot::capture(
            aggregate_id,
            A::aggregate_type(),
            aggregate.version(),
            aggregate,
        ) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "failed to capture snapshot");
                return;
            }
        };
        if let Err(e) = self.store.save_snapshot(snapshot).await {
            warn!(error = %e, "failed to save snapshot");
        } else {
            debug!(version = %aggregate.version(), "snapshot saved");
        }
    }

    /// Runs a store call with a deadline, retrying transient failures.
    async fn with_store_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, EventStoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EventStoreError>>,
    {
        let timeout = self.config.store_timeout;
        (move || {
            let pending = call();
            async move {
                tokio::time::timeout(timeout, pending)
                    .await
                    .unwrap_or_else(|_| Err(EventStoreError::Timeout(timeout)))
            }
        })
        .retry(self.config.store_retry.backoff())
        .when(EventStoreError::is_transient)
        .notify(|e: &EventStoreError, delay: Duration| {
            warn!(operation, error = %e, ?delay, "store call failed, retrying");
        })
        .await
    }
}

fn check_preconditions<A, C>(current: &A, command: &C) -> Result<(), CommandError>
where
    A: Aggregate,
    C: Command<Aggregate = A>,
{
    let lifecycle = current.lifecycle();
    if command.is_creation() {
        if lifecycle.exists() {
            return Err(CommandError::Conflict(format!(
                "{} {} already exists",
                A::aggregate_type(),
                command.aggregate_id()
            )));
        }
    } else if !lifecycle.is_active() {
        return Err(CommandError::NotFound(format!(
            "{} {}",
            A::aggregate_type(),
            command.aggregate_id()
        )));
    }

    if let Some(expected) = command.expected_version()
        && expected != current.version()
    {
        return Err(CommandError::Conflict(format!(
            "expected version {expected}, found {}",
            current.version()
        )));
    }
    Ok(())
}

/// Builds envelopes, derives integration events and applies the events to a
/// copy of `current`.
fn stage<A: Aggregate>(
    aggregate_id: AggregateId,
    current: &A,
    events: Vec<A::Event>,
    command: &'static str,
) -> Result<Staged<A>, DomainError> {
    let mut next = current.clone();
    let mut version = current.version();
    let mut envelopes = Vec::with_capacity(events.len());
    let mut integration = Vec::new();

    for event in &events {
        version = version.next();
        let envelope = EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type(A::aggregate_type())
            .event_type(event.event_type())
            .version(version)
            .payload(event)?
            .metadata("command", serde_json::Value::from(command))
            .build()?;

        integration.extend(next.integration_events(event, &envelope)?);
        next.apply(event.clone());
        next.set_version(version);
        envelopes.push(envelope);
    }

    Ok(Staged {
        expected: current.version(),
        next,
        events,
        envelopes,
        integration,
    })
}

fn store_failure<A: Aggregate>(operation: &'static str, e: EventStoreError) -> CommandResult<A> {
    match e {
        EventStoreError::ConcurrencyConflict { .. } => {
            CommandResult::failed(CommandOutcome::Conflict, e)
        }
        e => {
            error!(operation, error = %e, "store call failed");
            CommandResult::failed(CommandOutcome::Unavailable, e)
        }
    }
}

fn cancelled<A: Aggregate>() -> CommandResult<A> {
    CommandResult::failed(
        CommandOutcome::Cancelled,
        "cancelled before persistence",
    )
}
