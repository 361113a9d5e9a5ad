//! Customer domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::Address;

/// Events that can occur on a customer aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CustomerEvent {
    CustomerCreated(CustomerCreatedData),

    /// Full replacement of the customer's details.
    CustomerUpdated(CustomerUpdatedData),

    CustomerRemoved(CustomerRemovedData),
}

impl DomainEvent for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::CustomerCreated(_) => "CustomerCreated",
            CustomerEvent::CustomerUpdated(_) => "CustomerUpdated",
            CustomerEvent::CustomerRemoved(_) => "CustomerRemoved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerCreatedData {
    pub customer_id: AggregateId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerUpdatedData {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRemovedData {
    pub removed_at: DateTime<Utc>,
}

impl CustomerEvent {
    pub fn customer_created(
        customer_id: AggregateId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        shipping_address: Option<Address>,
    ) -> Self {
        CustomerEvent::CustomerCreated(CustomerCreatedData {
            customer_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            shipping_address,
            created_at: Utc::now(),
        })
    }

    pub fn customer_updated(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        shipping_address: Option<Address>,
    ) -> Self {
        CustomerEvent::CustomerUpdated(CustomerUpdatedData {
            first_name: first_name.into(),
            last_name: last_name.into(),
            shipping_address,
            updated_at: Utc::now(),
        })
    }

    pub fn customer_removed() -> Self {
        CustomerEvent::CustomerRemoved(CustomerRemovedData {
            removed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_with_type_tag() {
        let event = CustomerEvent::customer_updated("Ann", "Lee", None);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "CustomerUpdated");
        assert_eq!(json["data"]["first_name"], "Ann");

        let back: CustomerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn event_type_matches_tag() {
        let id = AggregateId::new();
        for event in [
            CustomerEvent::customer_created(id, "Ann", "Lee", None),
            CustomerEvent::customer_updated("Ann", "Lee", None),
            CustomerEvent::customer_removed(),
        ] {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.event_type());
        }
    }
}
