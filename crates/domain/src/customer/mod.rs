//! Customer aggregate and related types.

mod aggregate;
mod commands;
mod events;

pub use aggregate::Customer;
pub use commands::{CreateCustomer, RemoveCustomer, UpdateCustomer};
pub use events::{CustomerCreatedData, CustomerEvent, CustomerRemovedData, CustomerUpdatedData};

use thiserror::Error;

use crate::error::CommandError;

/// Errors that can occur during customer operations.
#[derive(Debug, Error)]
pub enum CustomerError {
    #[error("Invalid customer: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Customer already created")]
    AlreadyCreated,

    #[error("Customer does not exist")]
    NotCreated,

    #[error("Customer has been removed")]
    Removed,
}

impl From<CustomerError> for CommandError {
    fn from(e: CustomerError) -> Self {
        match e {
            CustomerError::Validation(errors) => CommandError::Invalid(errors),
            CustomerError::AlreadyCreated => CommandError::Conflict(e.to_string()),
            CustomerError::NotCreated | CustomerError::Removed => {
                CommandError::NotFound(e.to_string())
            }
        }
    }
}
