//! Integration event contracts shared between services.

use common::AggregateId;
use event_bus::IntegrationEventPayload;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::value_objects::Address;

/// Source name stamped on events published by the customer service.
pub const CUSTOMER_SERVICE: &str = "customer-service";

/// A customer's shipping address changed.
///
/// Consumed by the order service to re-address the customer's open orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAddressUpdated {
    pub customer_id: AggregateId,
    #[serde(default)]
    pub shipping_address: Address,

    /// Customer version that produced this address. Consumers drop events
    /// older than one they already applied.
    #[serde(default)]
    pub customer_version: Option<Version>,
}

impl IntegrationEventPayload for CustomerAddressUpdated {
    const EVENT_TYPE: &'static str = "CustomerAddressUpdated";
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::IntegrationEvent;

    #[test]
    fn decodes_payload_with_extra_fields() {
        let customer_id = AggregateId::new();
        let mut event = IntegrationEvent::from_payload(
            CUSTOMER_SERVICE,
            customer_id,
            &CustomerAddressUpdated {
                customer_id,
                shipping_address: Address::new("1 Main St", "Austin", "TX", "US", "78701"),
                customer_version: Some(Version::new(2)),
            },
        )
        .unwrap();
        event.payload["shipping_address"]["unit"] = serde_json::json!("4B");
        event.payload["loyalty_tier"] = serde_json::json!("gold");

        let decoded: CustomerAddressUpdated = event.decode().unwrap();
        assert_eq!(decoded.customer_id, customer_id);
        assert_eq!(decoded.shipping_address.city, "Austin");
        assert_eq!(decoded.customer_version, Some(Version::new(2)));
        assert_eq!(event.source, "customer-service");
        assert_eq!(event.event_type, "CustomerAddressUpdated");
    }

    #[test]
    fn payload_without_customer_version_still_decodes() {
        let customer_id = AggregateId::new();
        let payload = serde_json::json!({
            "customer_id": customer_id,
            "shipping_address": {"city": "Austin"},
        });

        let decoded: CustomerAddressUpdated = serde_json::from_value(payload).unwrap();
        assert_eq!(decoded.customer_version, None);
    }
}
