//! Customer command endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use domain::{Address, Aggregate, CreateCustomer, Customer, RemoveCustomer, UpdateCustomer};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::{parse_aggregate_id, parse_etag};
use crate::error::{ApiError, accepted};
use crate::state::AppState;

/// Customer as sent and returned by the API.
#[derive(Debug, Deserialize)]
pub struct CustomerRequest {
    /// Optional on create, required on update.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    /// Version the client last saw. Stale values are rejected with 409.
    #[serde(default)]
    pub etag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub shipping_address: Option<Address>,
    pub etag: String,
}

impl From<&Customer> for CustomerResponse {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id().map(|id| id.to_string()).unwrap_or_default(),
            first_name: customer.first_name().to_string(),
            last_name: customer.last_name().to_string(),
            shipping_address: customer.shipping_address().cloned(),
            etag: customer.version().to_string(),
        }
    }
}

/// POST /api/customer: create a customer.
#[tracing::instrument(skip_all)]
pub async fn create<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CustomerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let suggested = req.id.as_deref().map(parse_aggregate_id).transpose()?;

    let mut cmd = CreateCustomer::new(suggested, req.first_name, req.last_name);
    if let Some(address) = req.shipping_address {
        cmd = cmd.with_shipping_address(address);
    }

    let customer = accepted(state.customers.invoke(cmd).await)?;
    let body = CustomerResponse::from(&customer);
    let location = format!("api/customer/{}", body.id);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(body)))
}

/// PUT /api/customer: replace a customer's details.
#[tracing::instrument(skip_all)]
pub async fn update<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CustomerRequest>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let id = req
        .id
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("id is required".to_string()))
        .and_then(parse_aggregate_id)?;

    let mut cmd = UpdateCustomer::new(id, req.first_name, req.last_name);
    if let Some(address) = req.shipping_address {
        cmd = cmd.with_shipping_address(address);
    }
    if let Some(etag) = req.etag.as_deref() {
        cmd = cmd.expecting(parse_etag(etag)?);
    }

    let customer = accepted(state.customers.invoke(cmd).await)?;
    Ok(Json(CustomerResponse::from(&customer)))
}

/// DELETE /api/customer/{id}: remove a customer.
#[tracing::instrument(skip(state))]
pub async fn remove<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_aggregate_id(&id)?;
    accepted(state.customers.invoke(RemoveCustomer::new(id)).await)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/customer/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let customer_id = parse_aggregate_id(&id)?;
    let customer = state
        .customers
        .load(customer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Customer {id} not found")))?;

    Ok(Json(CustomerResponse::from(&customer)))
}
