use crate::{AggregateId, Version};

/// Filter over stored events. Every set field must match.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub aggregate_id: Option<AggregateId>,
    pub aggregate_type: Option<String>,

    /// Any of these event types.
    pub event_types: Option<Vec<String>>,

    /// Minimum version, inclusive.
    pub from_version: Option<Version>,

    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events of one kind raised by one aggregate kind, e.g. every
    /// `OrderPlaced` of `Order`.
    pub fn of_kind(aggregate_type: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self::new()
            .aggregate_type(aggregate_type)
            .event_type(event_type)
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types
            .get_or_insert_with(Vec::new)
            .push(event_type.into());
        self
    }

    pub fn from_version(mut self, version: Version) -> Self {
        self.from_version = Some(version);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an envelope passes every filter except `limit`.
    pub fn matches(&self, event: &crate::EventEnvelope) -> bool {
        if self.aggregate_id.is_some_and(|id| id != event.aggregate_id) {
            return false;
        }
        if self
            .aggregate_type
            .as_ref()
            .is_some_and(|t| *t != event.aggregate_type)
        {
            return false;
        }
        if self
            .event_types
            .as_ref()
            .is_some_and(|types| !types.contains(&event.event_type))
        {
            return false;
        }
        if self.from_version.is_some_and(|v| event.version < v) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventEnvelope;

    fn envelope(event_type: &str, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .event_type(event_type)
            .aggregate_id(AggregateId::new())
            .aggregate_type("Order")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn of_kind_matches_type_pair() {
        let query = EventQuery::of_kind("Order", "OrderPlaced");
        assert!(query.matches(&envelope("OrderPlaced", 1)));
        assert!(!query.matches(&envelope("OrderShipped", 2)));
    }

    #[test]
    fn event_type_accumulates() {
        let query = EventQuery::new()
            .event_type("OrderPlaced")
            .event_type("OrderCancelled");
        assert!(query.matches(&envelope("OrderCancelled", 3)));
        assert_eq!(query.event_types.map(|t| t.len()), Some(2));
    }

    #[test]
    fn from_version_is_inclusive() {
        let query = EventQuery::new().from_version(Version::new(2));
        assert!(!query.matches(&envelope("OrderPlaced", 1)));
        assert!(query.matches(&envelope("OrderShipped", 2)));
    }
}
