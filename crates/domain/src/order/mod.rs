//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod item;
mod repository;
mod state;

pub use aggregate::Order;
pub use commands::{CancelOrder, PlaceOrder, ShipOrder, UpdateOrderAddress};
pub use events::{
    OrderAddressUpdatedData, OrderCancelledData, OrderEvent, OrderPlacedData, OrderShippedData,
};
pub use item::OrderItem;
pub use repository::OrderRepository;
pub use state::OrderState;

use thiserror::Error;

use crate::error::CommandError;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Invalid order: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Order is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderState,
        action: &'static str,
    },

    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order does not exist")]
    NotPlaced,
}

impl From<OrderError> for CommandError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Validation(errors) => CommandError::Invalid(errors),
            OrderError::InvalidStateTransition { .. } | OrderError::AlreadyPlaced => {
                CommandError::Conflict(e.to_string())
            }
            OrderError::NotPlaced => CommandError::NotFound(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transition_errors_are_conflicts() {
        let err: CommandError = OrderError::InvalidStateTransition {
            current_state: OrderState::Shipped,
            action: "cancel",
        }
        .into();
        assert!(matches!(err, CommandError::Conflict(ref m) if m.contains("cancel from Shipped")));
    }
}
