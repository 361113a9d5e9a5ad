//! Order commands.

use common::AggregateId;
use event_store::Version;

use crate::command::Command;
use crate::value_objects::Address;

use super::{Order, OrderItem};

/// Command to place a new order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: AggregateId,
    pub customer_id: AggregateId,
    pub shipping_address: Address,
    pub items: Vec<OrderItem>,
}

impl PlaceOrder {
    /// A nil `suggested_id` counts as no suggestion.
    pub fn new(
        suggested_id: Option<AggregateId>,
        customer_id: AggregateId,
        shipping_address: Address,
        items: Vec<OrderItem>,
    ) -> Self {
        Self {
            order_id: AggregateId::suggested_or_new(suggested_id),
            customer_id,
            shipping_address,
            items,
        }
    }
}

impl Command for PlaceOrder {
    type Aggregate = Order;
    const NAME: &'static str = "PlaceOrder";

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }

    fn is_creation(&self) -> bool {
        true
    }
}

/// Command to change where a pending order ships.
#[derive(Debug, Clone)]
pub struct UpdateOrderAddress {
    pub order_id: AggregateId,
    pub shipping_address: Address,

    /// Customer version the address came from, when it was propagated.
    pub source_version: Option<Version>,
}

impl UpdateOrderAddress {
    pub fn new(order_id: AggregateId, shipping_address: Address) -> Self {
        Self {
            order_id,
            shipping_address,
            source_version: None,
        }
    }

    pub fn from_source_version(mut self, version: Version) -> Self {
        self.source_version = Some(version);
        self
    }
}

impl Command for UpdateOrderAddress {
    type Aggregate = Order;
    const NAME: &'static str = "UpdateOrderAddress";

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

#[derive(Debug, Clone)]
pub struct ShipOrder {
    pub order_id: AggregateId,
    pub tracking_number: Option<String>,
    pub expected_version: Option<Version>,
}

impl ShipOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self {
            order_id,
            tracking_number: None,
            expected_version: None,
        }
    }

    pub fn with_tracking_number(mut self, tracking_number: impl Into<String>) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }

    pub fn expecting(mut self, version: Version) -> Self {
        self.expected_version = Some(version);
        self
    }
}

impl Command for ShipOrder {
    type Aggregate = Order;
    const NAME: &'static str = "ShipOrder";

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }

    fn expected_version(&self) -> Option<Version> {
        self.expected_version
    }
}

#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: AggregateId,
    pub reason: Option<String>,
}

impl CancelOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self {
            order_id,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl Command for CancelOrder {
    type Aggregate = Order;
    const NAME: &'static str = "CancelOrder";

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_order_is_a_creation_command() {
        let id = AggregateId::new();
        let cmd = PlaceOrder::new(Some(id), AggregateId::new(), Address::default(), vec![]);
        assert_eq!(cmd.aggregate_id(), id);
        assert!(cmd.is_creation());
    }

    #[test]
    fn ship_order_builder() {
        let cmd = ShipOrder::new(AggregateId::new())
            .with_tracking_number("1Z999")
            .expecting(Version::new(2));
        assert_eq!(cmd.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(cmd.expected_version(), Some(Version::new(2)));
        assert!(!cmd.is_creation());
    }
}
