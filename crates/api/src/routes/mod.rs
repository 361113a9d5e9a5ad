pub mod customer;
pub mod health;
pub mod metrics;
pub mod orders;

use common::AggregateId;

use crate::error::ApiError;

fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID: {e}")))
}

/// Parses an ETag back into the aggregate version it was issued for.
fn parse_etag(etag: &str) -> Result<event_store::Version, ApiError> {
    etag.trim_matches('"')
        .parse::<i64>()
        .map(event_store::Version::new)
        .map_err(|_| ApiError::BadRequest(format!("Invalid etag: {etag}")))
}
