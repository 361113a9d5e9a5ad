//! HTTP API for the customer and order services.
//!
//! Provides the customer command endpoints and the order endpoints, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_store::{EventStore, InMemoryEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(routes::metrics::MetricsState {
            handle: metrics_handle,
            bus: state.bus.clone(),
        });

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/api/customer",
            post(routes::customer::create::<S>).put(routes::customer::update::<S>),
        )
        .route(
            "/api/customer/{id}",
            get(routes::customer::get::<S>).delete(routes::customer::remove::<S>),
        )
        .route("/api/order", post(routes::orders::create::<S>))
        .route("/api/order/{id}", get(routes::orders::get::<S>))
        .route(
            "/api/order/customer/{customer_id}",
            get(routes::orders::list_for_customer::<S>),
        )
        .route("/api/order/{id}/ship", put(routes::orders::ship::<S>))
        .route("/api/order/{id}/cancel", put(routes::orders::cancel::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state: one in-memory store per service
/// and a started in-memory bus between them.
pub fn create_default_state(config: &Config) -> Arc<AppState<InMemoryEventStore>> {
    Arc::new(AppState::new(
        InMemoryEventStore::new(),
        InMemoryEventStore::new(),
        config,
    ))
}
