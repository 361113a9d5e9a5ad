//! Shared application state and its wiring.

use std::sync::Arc;

use domain::{
    CommandBroker, Customer, CustomerAddressUpdated, CustomerAddressUpdatedHandler,
    Order, OrderRepository, SnapshotCapable,
};
use event_bus::{EventBus, InMemoryEventBus, IntegrationEventPayload};
use event_store::EventStore;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Shared application state accessible from all handlers.
///
/// The customer and order services keep separate stores and talk only
/// through the bus.
pub struct AppState<S: EventStore> {
    pub customers: CommandBroker<S, Customer>,
    pub orders: OrderRepository<S>,
    pub bus: InMemoryEventBus,
    relay_shutdown: CancellationToken,
}

impl<S: EventStore + 'static> AppState<S> {
    /// Builds both services on `customer_store` and `order_store`,
    /// subscribes the order service's handlers, starts the bus worker and
    /// the outbox relays. Must be called inside a tokio runtime.
    pub fn new(customer_store: S, order_store: S, config: &Config) -> Self {
        let bus = InMemoryEventBus::with_delivery_log_capacity(
            config.bus_retry(),
            config.bus_delivery_log_capacity,
        );
        let shared: Arc<dyn EventBus> = Arc::new(bus.clone());

        let customers = CommandBroker::new(
            customer_store,
            shared.clone(),
            Customer::dispatch_table(),
            config.broker(),
        );
        let orders = OrderRepository::new(CommandBroker::new(
            order_store,
            shared,
            Order::dispatch_table(),
            config.broker(),
        ));

        bus.subscribe(
            CustomerAddressUpdated::EVENT_TYPE,
            Arc::new(CustomerAddressUpdatedHandler::new(orders.clone())),
        );
        bus.start();

        let relay_shutdown = CancellationToken::new();
        spawn_relay(customers.clone(), config, relay_shutdown.clone());
        spawn_relay(orders.broker().clone(), config, relay_shutdown.clone());

        Self {
            customers,
            orders,
            bus,
            relay_shutdown,
        }
    }

    /// Integration events committed by either service but not yet on the bus.
    pub async fn outbox_pending(&self) -> usize {
        self.customers.outbox_len().await + self.orders.broker().outbox_len().await
    }

    /// Stops the relays, hands the outboxes to the bus one last time and
    /// drains the bus.
    pub async fn shutdown(&self) {
        self.relay_shutdown.cancel();
        let remaining =
            self.customers.flush_outbox().await + self.orders.broker().flush_outbox().await;
        if remaining > 0 {
            tracing::warn!(remaining, "shutting down with unpublished integration events");
        }
        self.bus.shutdown().await;
    }
}

fn spawn_relay<S, A>(broker: CommandBroker<S, A>, config: &Config, shutdown: CancellationToken)
where
    S: EventStore + 'static,
    A: SnapshotCapable,
{
    let period = config.outbox_relay_interval;
    tokio::spawn(async move { broker.relay_outbox(period, shutdown).await });
}
