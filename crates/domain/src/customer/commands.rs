//! Customer commands.

use common::AggregateId;
use event_store::Version;

use crate::command::Command;
use crate::value_objects::Address;

use super::Customer;

/// Command to create a customer.
#[derive(Debug, Clone)]
pub struct CreateCustomer {
    /// The suggested id, or a freshly generated one.
    pub customer_id: AggregateId,
    pub first_name: String,
    pub last_name: String,
    pub shipping_address: Option<Address>,
}

impl CreateCustomer {
    /// A nil `suggested_id` counts as no suggestion.
    pub fn new(
        suggested_id: Option<AggregateId>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            customer_id: AggregateId::suggested_or_new(suggested_id),
            first_name: first_name.into(),
            last_name: last_name.into(),
            shipping_address: None,
        }
    }

    pub fn with_shipping_address(mut self, address: Address) -> Self {
        self.shipping_address = Some(address);
        self
    }
}

impl Command for CreateCustomer {
    type Aggregate = Customer;
    const NAME: &'static str = "CreateCustomer";

    fn aggregate_id(&self) -> AggregateId {
        self.customer_id
    }

    fn is_creation(&self) -> bool {
        true
    }
}

/// Command to replace a customer's details.
#[derive(Debug, Clone)]
pub struct UpdateCustomer {
    pub customer_id: AggregateId,
    pub first_name: String,
    pub last_name: String,
    pub shipping_address: Option<Address>,
    pub expected_version: Option<Version>,
}

impl UpdateCustomer {
    pub fn new(
        customer_id: AggregateId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            customer_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            shipping_address: None,
            expected_version: None,
        }
    }

    pub fn with_shipping_address(mut self, address: Address) -> Self {
        self.shipping_address = Some(address);
        self
    }

    pub fn expecting(mut self, version: Version) -> Self {
        self.expected_version = Some(version);
        self
    }
}

impl Command for UpdateCustomer {
    type Aggregate = Customer;
    const NAME: &'static str = "UpdateCustomer";

    fn aggregate_id(&self) -> AggregateId {
        self.customer_id
    }

    fn expected_version(&self) -> Option<Version> {
        self.expected_version
    }
}

/// Command to remove a customer.
#[derive(Debug, Clone)]
pub struct RemoveCustomer {
    pub customer_id: AggregateId,
}

impl RemoveCustomer {
    pub fn new(customer_id: AggregateId) -> Self {
        Self { customer_id }
    }
}

impl Command for RemoveCustomer {
    type Aggregate = Customer;
    const NAME: &'static str = "RemoveCustomer";

    fn aggregate_id(&self) -> AggregateId {
        self.customer_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_uses_suggested_id() {
        let id = AggregateId::new();
        let cmd = CreateCustomer::new(Some(id), "Ann", "Lee");
        assert_eq!(cmd.aggregate_id(), id);
        assert!(cmd.is_creation());
    }

    #[test]
    fn create_replaces_nil_suggestion() {
        let nil = AggregateId::from_uuid(uuid::Uuid::nil());
        let cmd = CreateCustomer::new(Some(nil), "Ann", "Lee");
        assert!(!cmd.aggregate_id().is_nil());

        let cmd = CreateCustomer::new(None, "Ann", "Lee");
        assert!(!cmd.aggregate_id().is_nil());
    }

    #[test]
    fn update_carries_expected_version() {
        let cmd = UpdateCustomer::new(AggregateId::new(), "Ann", "Lee").expecting(Version::new(3));
        assert_eq!(cmd.expected_version(), Some(Version::new(3)));
        assert!(!cmd.is_creation());
    }
}
