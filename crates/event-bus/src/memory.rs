use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use futures_util::future::join_all;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    BusError, EventBus, HandlerError, HandlerRegistry, IntegrationEvent, IntegrationEventHandler,
};

/// Backoff applied to retryable handler failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// An event a handler could not process.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub event: IntegrationEvent,
    pub handler: String,
    pub error: HandlerError,
    pub attempts: usize,
    pub failed_at: DateTime<Utc>,
}

/// Default number of `(handler, event_id)` pairs remembered for
/// de-duplication.
pub const DEFAULT_DELIVERY_LOG_CAPACITY: usize = 10_000;

/// Successful deliveries, oldest evicted first once `capacity` is reached.
///
/// A redelivery older than the last `capacity` successes is no longer
/// recognised and reaches the handler again, so handlers stay idempotent.
struct DeliveryLog {
    capacity: usize,
    seen: DashSet<(String, Uuid)>,
    order: Mutex<VecDeque<(String, Uuid)>>,
}

impl DeliveryLog {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: DashSet::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    fn contains(&self, key: &(String, Uuid)) -> bool {
        self.seen.contains(key)
    }

    fn record(&self, key: (String, Uuid)) {
        let mut order = lock(&self.order);
        if !self.seen.insert(key.clone()) {
            return;
        }
        order.push_back(key);
        while order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

struct Inner {
    retry: RetryPolicy,
    registry: HandlerRegistry,
    sender: mpsc::UnboundedSender<IntegrationEvent>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<IntegrationEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    delivered: DeliveryLog,
    dead_letters: Mutex<Vec<DeadLetter>>,
    /// Published events not yet fully delivered or dead-lettered.
    pending: AtomicUsize,
    idle: Notify,
    shutdown: CancellationToken,
}

/// Single-process event bus.
///
/// `publish` enqueues onto an unbounded channel and returns. A worker task,
/// spawned by [`start`](Self::start), takes events in publish order and
/// fans each one out to its handlers concurrently. Retryable failures are
/// retried with exponential backoff; fatal failures and exhausted retries
/// end up in [`dead_letters`](Self::dead_letters).
#[derive(Clone)]
pub struct InMemoryEventBus {
    inner: Arc<Inner>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl InMemoryEventBus {
    pub fn new(retry: RetryPolicy) -> Self {
        Self::with_delivery_log_capacity(retry, DEFAULT_DELIVERY_LOG_CAPACITY)
    }

    /// Like [`new`](Self::new), remembering at most `capacity` successful
    /// deliveries for de-duplication.
    pub fn with_delivery_log_capacity(retry: RetryPolicy, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                retry,
                registry: HandlerRegistry::new(),
                sender,
                receiver: Mutex::new(Some(receiver)),
                worker: Mutex::new(None),
                delivered: DeliveryLog::new(capacity),
                dead_letters: Mutex::new(Vec::new()),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Spawns the delivery worker. Calling it again is a no-op.
    pub fn start(&self) {
        let Some(receiver) = lock(&self.inner.receiver).take() else {
            debug!("event bus worker already started");
            return;
        };
        let handle = tokio::spawn(Inner::run(self.inner.clone(), receiver));
        *lock(&self.inner.worker) = Some(handle);
        info!(handlers = self.inner.registry.len(), "event bus started");
    }

    /// Resolves once every published event has been delivered or
    /// dead-lettered.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Drains queued events, then stops the worker. Later publishes fail with
    /// [`BusError::Closed`].
    pub async fn shutdown(&self) {
        if lock(&self.inner.worker).is_some() {
            self.wait_idle().await;
        }
        self.inner.shutdown.cancel();

        let worker = lock(&self.inner.worker).take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            error!(error = %e, "event bus worker panicked");
        }
        info!("event bus stopped");
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        lock(&self.inner.dead_letters).clone()
    }

    /// Re-publishes every dead-lettered event. Handlers that already
    /// succeeded for an event are skipped on redelivery.
    pub async fn redrive_dead_letters(&self) -> Result<usize, BusError> {
        let letters = std::mem::take(&mut *lock(&self.inner.dead_letters));
        let mut seen = std::collections::HashSet::new();
        let events: Vec<_> = letters
            .into_iter()
            .filter(|letter| seen.insert(letter.event.event_id))
            .map(|letter| letter.event)
            .collect();
        let count = events.len();
        self.publish_batch(events).await?;
        Ok(count)
    }

    pub fn has_delivered(&self, handler: &str, event_id: Uuid) -> bool {
        self.inner
            .delivered
            .contains(&(handler.to_string(), event_id))
    }

    /// Number of deliveries currently remembered for de-duplication.
    pub fn delivery_log_len(&self) -> usize {
        self.inner.delivered.len()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: IntegrationEvent) -> Result<(), BusError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(BusError::Closed);
        }

        let event_type = event.event_type.clone();
        let event_id = event.event_id;
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        if self.inner.sender.send(event).is_err() {
            self.inner.complete_one();
            return Err(BusError::Closed);
        }

        metrics::counter!("bus_events_published_total", "event_type" => event_type.clone())
            .increment(1);
        debug!(%event_type, %event_id, "integration event published");
        Ok(())
    }

    fn subscribe(&self, event_type: &str, handler: Arc<dyn IntegrationEventHandler>) {
        debug!(event_type, handler = handler.name(), "handler subscribed");
        self.inner.registry.register(event_type, handler);
    }
}

impl Inner {
    async fn run(self: Arc<Self>, mut receiver: mpsc::UnboundedReceiver<IntegrationEvent>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = receiver.recv() => match next {
                    Some(event) => {
                        self.dispatch(event).await;
                        self.complete_one();
                    }
                    None => break,
                },
            }
        }
    }

    async fn dispatch(&self, event: IntegrationEvent) {
        let handlers = self.registry.matching(&event.event_type);
        if handlers.is_empty() {
            debug!(event_type = %event.event_type, "no handlers subscribed");
            return;
        }
        join_all(
            handlers
                .into_iter()
                .map(|handler| self.deliver(handler, &event)),
        )
        .await;
    }

    async fn deliver(&self, handler: Arc<dyn IntegrationEventHandler>, event: &IntegrationEvent) {
        let name = handler.name().to_string();
        let key = (name.clone(), event.event_id);
        if self.delivered.contains(&key) {
            debug!(handler = %name, event_id = %event.event_id, "already delivered, skipping");
            metrics::counter!("bus_deliveries_total", "handler" => name, "outcome" => "duplicate")
                .increment(1);
            return;
        }

        let attempts = AtomicUsize::new(0);
        let (handler, counter) = (&handler, &attempts);
        let result = (|| async move {
            counter.fetch_add(1, Ordering::Relaxed);
            handler.handle(event).await
        })
        .retry(self.retry.backoff())
        .when(HandlerError::is_retryable)
        .notify(|err: &HandlerError, delay: Duration| {
            warn!(
                handler = %name,
                event_id = %event.event_id,
                error = %err,
                ?delay,
                "handler failed, retrying"
            );
        })
        .await;

        match result {
            Ok(()) => {
                self.delivered.record(key);
                metrics::counter!("bus_deliveries_total", "handler" => name, "outcome" => "ok")
                    .increment(1);
            }
            Err(err) => {
                let attempts = attempts.load(Ordering::Relaxed);
                error!(
                    handler = %name,
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    attempts,
                    error = %err,
                    "handler failed, dead-lettering event"
                );
                metrics::counter!("bus_deliveries_total", "handler" => name.clone(), "outcome" => "failed")
                    .increment(1);
                metrics::counter!("bus_dead_letters_total", "handler" => name.clone())
                    .increment(1);
                lock(&self.dead_letters).push(DeadLetter {
                    event: event.clone(),
                    handler: name,
                    error: err,
                    attempts,
                    failed_at: Utc::now(),
                });
            }
        }
    }

    fn complete_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
