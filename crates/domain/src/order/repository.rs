//! Order read access and the commands the order service issues itself.

use common::AggregateId;
use event_store::{EventQuery, EventStore, Version};
use tracing::instrument;

use crate::aggregate::Aggregate;
use crate::broker::CommandBroker;
use crate::error::DomainError;
use crate::result::CommandResult;
use crate::value_objects::Address;

use super::{Order, OrderEvent, UpdateOrderAddress};

/// Orders as seen by the order service.
///
/// Reads go through the broker's loader; writes go through the broker, so
/// they take the same per-order lock as API-driven commands.
pub struct OrderRepository<S: EventStore> {
    broker: CommandBroker<S, Order>,
}

impl<S: EventStore> Clone for OrderRepository<S> {
    fn clone(&self) -> Self {
        Self {
            broker: self.broker.clone(),
        }
    }
}

impl<S: EventStore + 'static> OrderRepository<S> {
    pub fn new(broker: CommandBroker<S, Order>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &CommandBroker<S, Order> {
        &self.broker
    }

    pub async fn get(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.broker.load(order_id).await
    }

    /// Every order placed by `customer_id`, in placement order.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn customer_orders(
        &self,
        customer_id: AggregateId,
    ) -> Result<Vec<Order>, DomainError> {
        let placed = self
            .broker
            .store()
            .query_events(EventQuery::of_kind(Order::aggregate_type(), "OrderPlaced"))
            .await?;

        let mut orders = Vec::new();
        for envelope in placed {
            let OrderEvent::OrderPlaced(data) = envelope.decode::<OrderEvent>()? else {
                continue;
            };
            if data.customer_id != customer_id {
                continue;
            }
            if let Some(order) = self.broker.load(envelope.aggregate_id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    /// Re-addresses an order. With a `source_version`, updates older than
    /// one already applied are accepted as no-ops.
    pub async fn update_order_address(
        &self,
        order_id: AggregateId,
        shipping_address: Address,
        source_version: Option<Version>,
    ) -> CommandResult<Order> {
        let mut cmd = UpdateOrderAddress::new(order_id, shipping_address);
        if let Some(version) = source_version {
            cmd = cmd.from_source_version(version);
        }
        self.broker.invoke(cmd).await
    }
}
