//! Order state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// ```text
/// Pending ──┬──► Shipped
///           └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Placed and not yet shipped. The shipping address may still change.
    #[default]
    Pending,

    /// Handed to the carrier (terminal state).
    Shipped,

    /// Cancelled before shipping (terminal state).
    Cancelled,
}

impl OrderState {
    pub fn can_update_address(&self) -> bool {
        matches!(self, OrderState::Pending)
    }

    pub fn can_ship(&self) -> bool {
        matches!(self, OrderState::Pending)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderState::Pending)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Shipped | OrderState::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "Pending",
            OrderState::Shipped => "Shipped",
            OrderState::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
