//! Customer aggregate implementation.

use common::AggregateId;
use event_bus::{BusError, IntegrationEvent};
use event_store::{EventEnvelope, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Lifecycle, SnapshotCapable};
use crate::command::DispatchTable;
use crate::integration::{CUSTOMER_SERVICE, CustomerAddressUpdated};
use crate::value_objects::Address;

use super::{
    CreateCustomer, CustomerError, CustomerEvent, RemoveCustomer, UpdateCustomer,
    events::{CustomerCreatedData, CustomerUpdatedData},
};

/// Customer aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    #[serde(default)]
    lifecycle: Lifecycle,

    first_name: String,
    last_name: String,

    #[serde(default)]
    shipping_address: Option<Address>,
}

impl Aggregate for Customer {
    type Event = CustomerEvent;

    fn aggregate_type() -> &'static str {
        "Customer"
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
            CustomerEvent::CustomerCreated(data) => self.apply_created(data),
            CustomerEvent::CustomerUpdated(data) => self.apply_updated(data),
            CustomerEvent::CustomerRemoved(_) => self.lifecycle = Lifecycle::Removed,
        }
    }

    fn integration_events(
        &self,
        event: &CustomerEvent,
        envelope: &EventEnvelope,
    ) -> Result<Vec<IntegrationEvent>, BusError> {
        let CustomerEvent::CustomerUpdated(data) = event else {
            return Ok(Vec::new());
        };
        let Some(address) = &data.shipping_address else {
            return Ok(Vec::new());
        };
        if self.shipping_address.as_ref() == Some(address) {
            return Ok(Vec::new());
        }

        let payload = CustomerAddressUpdated {
            customer_id: envelope.aggregate_id,
            shipping_address: address.clone(),
            customer_version: Some(envelope.version),
        };
        let event = IntegrationEvent::from_payload(CUSTOMER_SERVICE, envelope.aggregate_id, &payload)?
            .with_event_id(envelope.event_id.as_uuid())
            .with_occurred_at(envelope.timestamp);
        Ok(vec![event])
    }
}

impl SnapshotCapable for Customer {}

// Query methods
impl Customer {
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn shipping_address(&self) -> Option<&Address> {
        self.shipping_address.as_ref()
    }

    pub fn is_removed(&self) -> bool {
        self.lifecycle.is_removed()
    }
}

// Command methods (return events)
impl Customer {
    pub fn create(&self, cmd: &CreateCustomer) -> Result<Vec<CustomerEvent>, CustomerError> {
        if self.lifecycle.exists() {
            return Err(CustomerError::AlreadyCreated);
        }
        validate(&cmd.first_name, &cmd.last_name, cmd.shipping_address.as_ref())?;

        Ok(vec![CustomerEvent::customer_created(
            cmd.customer_id,
            cmd.first_name.trim(),
            cmd.last_name.trim(),
            cmd.shipping_address.clone(),
        )])
    }

    /// Replaces the customer's details. Returns no events when nothing
    /// changes.
    pub fn update(&self, cmd: &UpdateCustomer) -> Result<Vec<CustomerEvent>, CustomerError> {
        self.ensure_active()?;
        validate(&cmd.first_name, &cmd.last_name, cmd.shipping_address.as_ref())?;

        let first_name = cmd.first_name.trim();
        let last_name = cmd.last_name.trim();
        if first_name == self.first_name
            && last_name == self.last_name
            && cmd.shipping_address == self.shipping_address
        {
            return Ok(vec![]);
        }

        Ok(vec![CustomerEvent::customer_updated(
            first_name,
            last_name,
            cmd.shipping_address.clone(),
        )])
    }

    pub fn remove(&self) -> Result<Vec<CustomerEvent>, CustomerError> {
        self.ensure_active()?;
        Ok(vec![CustomerEvent::customer_removed()])
    }

    /// Processing registered with the command broker.
    pub fn dispatch_table() -> DispatchTable<Customer> {
        let mut table = DispatchTable::new();
        table.register::<CreateCustomer, _>(|customer, cmd| Ok(customer.create(cmd)?));
        table.register::<UpdateCustomer, _>(|customer, cmd| Ok(customer.update(cmd)?));
        table.register::<RemoveCustomer, _>(|customer, _| Ok(customer.remove()?));
        table
    }

    fn ensure_active(&self) -> Result<(), CustomerError> {
        match self.lifecycle {
            Lifecycle::Active => Ok(()),
            Lifecycle::Uninitialized => Err(CustomerError::NotCreated),
            Lifecycle::Removed => Err(CustomerError::Removed),
        }
    }
}

// Apply event helpers
impl Customer {
    fn apply_created(&mut self, data: CustomerCreatedData) {
        self.id.get_or_insert(data.customer_id);
        self.first_name = data.first_name;
        self.last_name = data.last_name;
        self.shipping_address = data.shipping_address;
        self.lifecycle = Lifecycle::Active;
    }

    fn apply_updated(&mut self, data: CustomerUpdatedData) {
        self.first_name = data.first_name;
        self.last_name = data.last_name;
        self.shipping_address = data.shipping_address;
    }
}

fn validate(
    first_name: &str,
    last_name: &str,
    shipping_address: Option<&Address>,
) -> Result<(), CustomerError> {
    let mut errors = Vec::new();
    if first_name.trim().is_empty() {
        errors.push("first name is required".to_string());
    }
    if last_name.trim().is_empty() {
        errors.push("last name is required".to_string());
    }
    if let Some(address) = shipping_address {
        errors.extend(address.validate());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CustomerError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn austin() -> Address {
        Address::new("1 Main St", "Austin", "TX", "US", "78701")
    }

    fn created() -> Customer {
        let mut customer = Customer::default();
        let cmd = CreateCustomer::new(None, "Ann", "Lee").with_shipping_address(austin());
        customer.apply_events(customer.create(&cmd).unwrap());
        customer
    }

    fn envelope_for(customer: &Customer, event: &CustomerEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(customer.id().unwrap())
            .aggregate_type("Customer")
            .event_type(crate::aggregate::DomainEvent::event_type(event))
            .version(customer.version().next())
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn create_assigns_id_and_activates() {
        let customer = created();
        assert!(customer.id().is_some_and(|id| !id.is_nil()));
        assert_eq!(customer.first_name(), "Ann");
        assert!(customer.lifecycle().is_active());
    }

    #[test]
    fn replaying_created_yields_the_stored_id() {
        let event = CustomerEvent::customer_created(AggregateId::new(), "Ann", "Lee", None);
        let CustomerEvent::CustomerCreated(data) = &event else {
            unreachable!();
        };

        let mut first = Customer::default();
        first.apply(event.clone());
        let mut second = Customer::default();
        second.apply(event.clone());

        assert_eq!(first.id(), Some(data.customer_id));
        assert_eq!(first, second);
    }

    #[test]
    fn create_rejects_blank_names() {
        let err = Customer::default()
            .create(&CreateCustomer::new(None, " ", ""))
            .unwrap_err();
        let CustomerError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn create_twice_fails() {
        let customer = created();
        let result = customer.create(&CreateCustomer::new(None, "Bob", "Lee"));
        assert!(matches!(result, Err(CustomerError::AlreadyCreated)));
    }

    #[test]
    fn unchanged_update_emits_nothing() {
        let customer = created();
        let cmd = UpdateCustomer::new(customer.id().unwrap(), "Ann", "Lee")
            .with_shipping_address(austin());
        assert!(customer.update(&cmd).unwrap().is_empty());
    }

    #[test]
    fn applying_update_twice_is_idempotent() {
        let mut once = created();
        let event = CustomerEvent::customer_updated("Ann", "Park", None);
        once.apply(event.clone());

        let mut twice = once.clone();
        twice.apply(event);
        assert_eq!(once, twice);
    }

    #[test]
    fn applying_remove_twice_is_idempotent() {
        let mut once = created();
        let event = CustomerEvent::customer_removed();
        once.apply(event.clone());

        let mut twice = once.clone();
        twice.apply(event);
        assert_eq!(once, twice);
        assert!(twice.is_removed());
    }

    #[test]
    fn removed_customer_rejects_commands() {
        let mut customer = created();
        customer.apply_events(customer.remove().unwrap());

        assert!(matches!(customer.remove(), Err(CustomerError::Removed)));
        let cmd = UpdateCustomer::new(customer.id().unwrap(), "Ann", "Lee");
        assert!(matches!(customer.update(&cmd), Err(CustomerError::Removed)));
    }

    #[test]
    fn address_change_derives_integration_event() {
        let customer = created();
        let moved = Address::new("9 Elm St", "Denver", "CO", "US", "80202");
        let event = CustomerEvent::customer_updated("Ann", "Lee", Some(moved.clone()));
        let envelope = envelope_for(&customer, &event);

        let derived = customer.integration_events(&event, &envelope).unwrap();

        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].event_id, envelope.event_id.as_uuid());
        let payload: CustomerAddressUpdated = derived[0].decode().unwrap();
        assert_eq!(payload.customer_id, customer.id().unwrap());
        assert_eq!(payload.shipping_address, moved);
    }

    #[test]
    fn name_change_derives_nothing() {
        let customer = created();
        let event = CustomerEvent::customer_updated("Annie", "Lee", Some(austin()));
        let envelope = envelope_for(&customer, &event);

        assert!(customer.integration_events(&event, &envelope).unwrap().is_empty());
    }
}
