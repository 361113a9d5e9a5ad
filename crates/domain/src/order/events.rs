//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::Address;

use super::OrderItem;

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed by a customer.
    OrderPlaced(OrderPlacedData),

    /// Shipping address was changed before shipping.
    OrderAddressUpdated(OrderAddressUpdatedData),

    OrderShipped(OrderShippedData),

    OrderCancelled(OrderCancelledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::OrderAddressUpdated(_) => "OrderAddressUpdated",
            OrderEvent::OrderShipped(_) => "OrderShipped",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
        }
    }
}

/// Data for OrderPlaced event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,

    /// Customer who placed the order. Read by address propagation.
    pub customer_id: AggregateId,

    pub shipping_address: Address,
    pub items: Vec<OrderItem>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAddressUpdatedData {
    pub shipping_address: Address,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub source_version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderShippedData {
    pub shipped_at: DateTime<Utc>,

    #[serde(default)]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub cancelled_at: DateTime<Utc>,

    #[serde(default)]
    pub reason: Option<String>,
}

// Convenience constructors for events
impl OrderEvent {
    pub fn order_placed(
        order_id: AggregateId,
        customer_id: AggregateId,
        shipping_address: Address,
        items: Vec<OrderItem>,
    ) -> Self {
        OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            customer_id,
            shipping_address,
            items,
            placed_at: Utc::now(),
        })
    }

    pub fn order_address_updated(
        shipping_address: Address,
        source_version: Option<Version>,
    ) -> Self {
        OrderEvent::OrderAddressUpdated(OrderAddressUpdatedData {
            shipping_address,
            updated_at: Utc::now(),
            source_version,
        })
    }

    pub fn order_shipped(tracking_number: Option<String>) -> Self {
        OrderEvent::OrderShipped(OrderShippedData {
            shipped_at: Utc::now(),
            tracking_number,
        })
    }

    pub fn order_cancelled(reason: Option<String>) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            cancelled_at: Utc::now(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::Money;

    #[test]
    fn order_placed_round_trips_through_envelope_json() {
        let customer_id = AggregateId::new();
        let event = OrderEvent::order_placed(
            AggregateId::new(),
            customer_id,
            Address::new("1 Main St", "Austin", "TX", "US", "78701"),
            vec![OrderItem::new("SKU-1", "Widget", 2, Money::from_cents(500))],
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "OrderPlaced");
        assert_eq!(json["data"]["customer_id"], customer_id.to_string());

        let back: OrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn optional_fields_default_when_missing() {
        let json = serde_json::json!({
            "type": "OrderShipped",
            "data": {"shipped_at": "2024-05-01T10:00:00Z"}
        });
        let event: OrderEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(
            event,
            OrderEvent::OrderShipped(OrderShippedData {
                tracking_number: None,
                ..
            })
        ));
    }
}
