//! Order service reactions to customer service events.

use async_trait::async_trait;
use event_bus::{HandlerError, IntegrationEvent, IntegrationEventHandler};
use event_store::EventStore;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::Aggregate;
use crate::order::OrderRepository;
use crate::result::CommandOutcome;

use super::CustomerAddressUpdated;

/// Re-addresses a customer's pending orders when their shipping address
/// changes. Shipped and cancelled orders keep the address they had.
pub struct CustomerAddressUpdatedHandler<S: EventStore> {
    orders: OrderRepository<S>,
}

impl<S: EventStore + 'static> CustomerAddressUpdatedHandler<S> {
    pub const NAME: &'static str = "order-service.customer-address-updated";

    pub fn new(orders: OrderRepository<S>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl<S: EventStore + 'static> IntegrationEventHandler for CustomerAddressUpdatedHandler<S> {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[instrument(skip_all, fields(event_id = %event.event_id, customer_id = %event.entity_id))]
    async fn handle(&self, event: &IntegrationEvent) -> Result<(), HandlerError> {
        let payload: CustomerAddressUpdated = event.decode()?;

        let orders = self
            .orders
            .customer_orders(payload.customer_id)
            .await
            .map_err(|e| {
                if e.is_transient() {
                    HandlerError::retryable(e.to_string())
                } else {
                    HandlerError::fatal(e.to_string())
                }
            })?;

        let mut updated = 0;
        for order in orders.iter().filter(|order| order.is_pending()) {
            let Some(order_id) = order.id() else {
                continue;
            };
            let result = self
                .orders
                .update_order_address(
                    order_id,
                    payload.shipping_address.clone(),
                    payload.customer_version,
                )
                .await;

            match result.outcome {
                CommandOutcome::Accepted => {
                    if !result.events.is_empty() {
                        updated += 1;
                    }
                }
                CommandOutcome::NotFound => {
                    debug!(%order_id, "order no longer exists, skipping");
                }
                CommandOutcome::Conflict
                | CommandOutcome::Unavailable
                | CommandOutcome::Cancelled => {
                    warn!(%order_id, outcome = %result.outcome, errors = ?result.errors, "order address update will be retried");
                    return Err(HandlerError::retryable(format!(
                        "order {order_id}: {}",
                        result.errors.join("; ")
                    )));
                }
                CommandOutcome::Invalid | CommandOutcome::NotHandled => {
                    return Err(HandlerError::fatal(format!(
                        "order {order_id}: {}",
                        result.errors.join("; ")
                    )));
                }
            }
        }

        info!(
            orders = orders.len(),
            updated, "customer address propagated to orders"
        );
        Ok(())
    }
}
