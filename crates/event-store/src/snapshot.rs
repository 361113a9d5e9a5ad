use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{AggregateId, Version};

/// Serialized aggregate state at a given version.
///
/// Loading starts from the latest snapshot and replays only the events
/// recorded after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Version of the aggregate the state was captured at.
    pub version: Version,

    pub taken_at: DateTime<Utc>,
    pub state: serde_json::Value,
}

impl Snapshot {
    /// Captures a serializable aggregate state.
    pub fn capture<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            taken_at: Utc::now(),
            state: serde_json::to_value(state)?,
        })
    }

    /// Deserializes the captured state.
    pub fn restore<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Profile {
        first_name: String,
        city: String,
    }

    #[test]
    fn capture_then_restore() {
        let id = AggregateId::new();
        let profile = Profile {
            first_name: "Ann".to_string(),
            city: "Lisbon".to_string(),
        };

        let snapshot = Snapshot::capture(id, "Customer", Version::new(20), &profile).unwrap();
        assert_eq!(snapshot.aggregate_id, id);
        assert_eq!(snapshot.version, Version::new(20));

        let restored: Profile = snapshot.restore().unwrap();
        assert_eq!(restored, profile);
    }
}
