//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use domain::{
    Address, Aggregate, CancelOrder, Money, Order, OrderItem, PlaceOrder, ShipOrder,
};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::{parse_aggregate_id, parse_etag};
use crate::error::{ApiError, accepted};
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub customer_id: String,
    #[serde(default)]
    pub shipping_address: Address,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShipParams {
    pub tracking_number: Option<String>,
    pub etag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelParams {
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub state: String,
    pub shipping_address: Address,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub tracking_number: Option<String>,
    pub etag: String,
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().map(|id| id.to_string()).unwrap_or_default(),
            customer_id: order
                .customer_id()
                .map(|c| c.to_string())
                .unwrap_or_default(),
            state: order.state().to_string(),
            shipping_address: order.shipping_address().clone(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                })
                .collect(),
            total_cents: order.total_amount().cents(),
            tracking_number: order.tracking_number().map(str::to_string),
            etag: order.version().to_string(),
        }
    }
}

// -- Handlers --

/// POST /api/order: place an order.
#[tracing::instrument(skip_all)]
pub async fn create<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let suggested = req.id.as_deref().map(parse_aggregate_id).transpose()?;
    let customer_id = parse_aggregate_id(&req.customer_id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid customer_id: {}", req.customer_id)))?;
    let items = req
        .items
        .into_iter()
        .map(|item| {
            OrderItem::new(
                item.product_id,
                item.product_name,
                item.quantity,
                Money::from_cents(item.unit_price_cents),
            )
        })
        .collect();

    let cmd = PlaceOrder::new(suggested, customer_id, req.shipping_address, items);
    let order = accepted(state.orders.broker().invoke(cmd).await)?;
    let body = OrderResponse::from(&order);
    let location = format!("api/order/{}", body.id);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(body)))
}

/// GET /api/order/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state
        .orders
        .get(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from(&order)))
}

/// GET /api/order/customer/{customer_id}: a customer's orders.
#[tracing::instrument(skip(state))]
pub async fn list_for_customer<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(customer_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let customer_id = parse_aggregate_id(&customer_id)?;
    let orders = state.orders.customer_orders(customer_id).await?;

    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// PUT /api/order/{id}/ship
#[tracing::instrument(skip(state))]
pub async fn ship<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(params): Query<ShipParams>,
) -> Result<Json<OrderResponse>, ApiError> {
    let mut cmd = ShipOrder::new(parse_aggregate_id(&id)?);
    if let Some(tracking_number) = params.tracking_number {
        cmd = cmd.with_tracking_number(tracking_number);
    }
    if let Some(etag) = params.etag.as_deref() {
        cmd = cmd.expecting(parse_etag(etag)?);
    }

    let order = accepted(state.orders.broker().invoke(cmd).await)?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PUT /api/order/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(params): Query<CancelParams>,
) -> Result<Json<OrderResponse>, ApiError> {
    let mut cmd = CancelOrder::new(parse_aggregate_id(&id)?);
    if let Some(reason) = params.reason {
        cmd = cmd.with_reason(reason);
    }

    let order = accepted(state.orders.broker().invoke(cmd).await)?;
    Ok(Json(OrderResponse::from(&order)))
}
