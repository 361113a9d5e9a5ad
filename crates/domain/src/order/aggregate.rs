//! Order aggregate implementation.

use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Lifecycle, SnapshotCapable};
use crate::command::DispatchTable;
use crate::value_objects::{Address, Money};

use super::{
    CancelOrder, OrderError, OrderEvent, OrderItem, OrderState, PlaceOrder, ShipOrder,
    UpdateOrderAddress, events::OrderPlacedData,
};

/// Order aggregate root.
///
/// Placed once with its line items, then either shipped or cancelled. The
/// shipping address follows the customer's while the order is pending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    #[serde(default)]
    lifecycle: Lifecycle,

    customer_id: Option<AggregateId>,

    #[serde(default)]
    state: OrderState,

    #[serde(default)]
    shipping_address: Address,

    #[serde(default)]
    items: Vec<OrderItem>,

    #[serde(default)]
    tracking_number: Option<String>,

    /// Newest customer version whose address this order has taken.
    #[serde(default)]
    address_source_version: Option<Version>,
}

impl Aggregate for Order {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "Order"
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
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::OrderAddressUpdated(data) => {
                self.shipping_address = data.shipping_address;
                self.address_source_version = self.address_source_version.max(data.source_version);
            }
            OrderEvent::OrderShipped(data) => {
                self.state = OrderState::Shipped;
                self.tracking_number = data.tracking_number;
            }
            OrderEvent::OrderCancelled(_) => {
                self.state = OrderState::Cancelled;
            }
        }
    }
}

impl SnapshotCapable for Order {
    fn snapshot_interval() -> usize {
        50
    }
}

// Query methods
impl Order {
    pub fn customer_id(&self) -> Option<AggregateId> {
        self.customer_id
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn total_amount(&self) -> Money {
        self.items.iter().map(OrderItem::total_price).sum()
    }

    pub fn is_pending(&self) -> bool {
        self.lifecycle.is_active() && self.state == OrderState::Pending
    }

    pub fn address_source_version(&self) -> Option<Version> {
        self.address_source_version
    }
}

// Command methods (return events)
impl Order {
    pub fn place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, OrderError> {
        if self.lifecycle.exists() {
            return Err(OrderError::AlreadyPlaced);
        }

        let mut errors = Vec::new();
        if cmd.customer_id.is_nil() {
            errors.push("customer id is required".to_string());
        }
        if cmd.items.is_empty() {
            errors.push("order has no items".to_string());
        }
        errors.extend(cmd.items.iter().flat_map(OrderItem::validate));
        errors.extend(cmd.shipping_address.validate());
        if !errors.is_empty() {
            return Err(OrderError::Validation(errors));
        }

        Ok(vec![OrderEvent::order_placed(
            cmd.order_id,
            cmd.customer_id,
            cmd.shipping_address.clone(),
            cmd.items.clone(),
        )])
    }

    /// Points a pending order at a new address. Returns no events when the
    /// address is already current, or when it comes from a customer version
    /// older than one already applied.
    pub fn update_address(&self, cmd: &UpdateOrderAddress) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if cmd.source_version.is_some() && cmd.source_version <= self.address_source_version {
            return Ok(vec![]);
        }
        let errors = cmd.shipping_address.validate();
        if !errors.is_empty() {
            return Err(OrderError::Validation(errors));
        }

        // A newer source with the same address is still recorded, so an
        // older event arriving later cannot win.
        let newer_source = cmd.source_version > self.address_source_version;
        if cmd.shipping_address == self.shipping_address {
            if !(newer_source && self.state.can_update_address()) {
                return Ok(vec![]);
            }
        } else if !self.state.can_update_address() {
            return Err(self.transition_error("update address"));
        }

        Ok(vec![OrderEvent::order_address_updated(
            cmd.shipping_address.clone(),
            cmd.source_version,
        )])
    }

    pub fn ship(&self, cmd: &ShipOrder) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.state.can_ship() {
            return Err(self.transition_error("ship"));
        }
        Ok(vec![OrderEvent::order_shipped(cmd.tracking_number.clone())])
    }

    pub fn cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.state.can_cancel() {
            return Err(self.transition_error("cancel"));
        }
        Ok(vec![OrderEvent::order_cancelled(cmd.reason.clone())])
    }

    /// Processing registered with the command broker.
    pub fn dispatch_table() -> DispatchTable<Order> {
        let mut table = DispatchTable::new();
        table.register::<PlaceOrder, _>(|order, cmd| Ok(order.place(cmd)?));
        table.register::<UpdateOrderAddress, _>(|order, cmd| Ok(order.update_address(cmd)?));
        table.register::<ShipOrder, _>(|order, cmd| Ok(order.ship(cmd)?));
        table.register::<CancelOrder, _>(|order, cmd| Ok(order.cancel(cmd)?));
        table
    }

    fn ensure_placed(&self) -> Result<(), OrderError> {
        if self.lifecycle.is_active() {
            Ok(())
        } else {
            Err(OrderError::NotPlaced)
        }
    }

    fn transition_error(&self, action: &'static str) -> OrderError {
        OrderError::InvalidStateTransition {
            current_state: self.state,
            action,
        }
    }
}

// Apply event helpers
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id.get_or_insert(data.order_id);
        self.customer_id = Some(data.customer_id);
        self.shipping_address = data.shipping_address;
        self.items = data.items;
        self.state = OrderState::Pending;
        self.lifecycle = Lifecycle::Active;
    }
}
