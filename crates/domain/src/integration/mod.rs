//! Integration events exchanged between the customer and order services,
//! and the order service's handlers for them.

mod events;
mod handlers;

pub use events::{CUSTOMER_SERVICE, CustomerAddressUpdated};
pub use handlers::CustomerAddressUpdatedHandler;
