use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::BusError;

/// Typed payload of an integration event.
///
/// Payload structs should mark optional fields `#[serde(default)]` so a
/// newer producer can add fields without breaking older consumers.
pub trait IntegrationEventPayload: Serialize + DeserializeOwned {
    /// Wire name, e.g. "CustomerAddressUpdated".
    const EVENT_TYPE: &'static str;

    /// Schema version of the payload.
    const VERSION: u32 = 1;
}

/// Cross-service projection of a domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEvent {
    /// Stable id; re-publishing the same event keeps it, which lets the bus
    /// skip handlers that already processed it.
    pub event_id: Uuid,
    pub event_type: String,
    pub version: u32,

    /// Producing service, e.g. "customer-service".
    pub source: String,

    /// Aggregate the event is about.
    pub entity_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl IntegrationEvent {
    pub fn from_payload<P: IntegrationEventPayload>(
        source: impl Into<String>,
        entity_id: AggregateId,
        payload: &P,
    ) -> Result<Self, BusError> {
        Ok(Self {
            event_id: Uuid::new_v4(),
            event_type: P::EVENT_TYPE.to_string(),
            version: P::VERSION,
            source: source.into(),
            entity_id,
            occurred_at: Utc::now(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Reuses an existing id, typically the id of the domain event this
    /// integration event was derived from.
    pub fn with_event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    pub fn is<P: IntegrationEventPayload>(&self) -> bool {
        self.event_type == P::EVENT_TYPE
    }

    /// Decodes the payload. Unknown fields are ignored.
    pub fn decode<P: DeserializeOwned>(&self) -> Result<P, serde_json::Error> {
        P::deserialize(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Renamed {
        name: String,
        #[serde(default)]
        nickname: Option<String>,
    }

    impl IntegrationEventPayload for Renamed {
        const EVENT_TYPE: &'static str = "Renamed";
    }

    #[test]
    fn from_payload_fills_header() {
        let entity_id = AggregateId::new();
        let event = IntegrationEvent::from_payload(
            "customer-service",
            entity_id,
            &Renamed {
                name: "Ann".into(),
                nickname: None,
            },
        )
        .unwrap();

        assert_eq!(event.event_type, "Renamed");
        assert_eq!(event.version, 1);
        assert_eq!(event.entity_id, entity_id);
        assert!(event.is::<Renamed>());
    }

    #[test]
    fn decode_tolerates_unknown_and_missing_fields() {
        let mut event = IntegrationEvent::from_payload(
            "customer-service",
            AggregateId::new(),
            &Renamed {
                name: "Ann".into(),
                nickname: None,
            },
        )
        .unwrap();
        event.payload = serde_json::json!({"name": "Ann", "added_in_v2": 7});

        let decoded: Renamed = event.decode().unwrap();
        assert_eq!(decoded.name, "Ann");
        assert_eq!(decoded.nickname, None);
    }

    #[test]
    fn wire_shape_round_trips() {
        let event = IntegrationEvent::from_payload(
            "customer-service",
            AggregateId::new(),
            &Renamed {
                name: "Lee".into(),
                nickname: Some("L".into()),
            },
        )
        .unwrap();

        let json = serde_json::to_value(&event).unwrap();
        for field in [
            "event_id",
            "event_type",
            "version",
            "source",
            "entity_id",
            "occurred_at",
            "payload",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        let back: IntegrationEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
