//! Domain layer for the customer and order services.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - Command trait and the dispatch table that routes commands
//! - CommandBroker, which loads, processes, persists and publishes
//! - Customer and Order aggregates
//! - Integration event contracts and the order service's handlers

pub mod aggregate;
pub mod broker;
pub mod command;
pub mod customer;
pub mod error;
pub mod integration;
pub mod order;
pub mod result;
pub mod value_objects;

pub use aggregate::{Aggregate, DomainEvent, Lifecycle, SnapshotCapable};
pub use broker::{BrokerConfig, CommandBroker};
pub use command::{Command, DispatchTable};
pub use customer::{
    CreateCustomer, Customer, CustomerError, CustomerEvent, RemoveCustomer, UpdateCustomer,
};
pub use error::{CommandError, DomainError};
pub use integration::{CUSTOMER_SERVICE, CustomerAddressUpdated, CustomerAddressUpdatedHandler};
pub use order::{
    CancelOrder, Order, OrderError, OrderEvent, OrderItem, OrderRepository, OrderState,
    PlaceOrder, ShipOrder, UpdateOrderAddress,
};
pub use result::{CommandOutcome, CommandResult};
pub use value_objects::{Address, Money, ProductId};
