//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use event_bus::InMemoryEventBus;
use metrics_exporter_prometheus::PrometheusHandle;

/// What `/metrics` renders from.
#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
    pub bus: InMemoryEventBus,
}

/// GET /metrics: returns Prometheus-formatted metrics.
pub async fn get(State(state): State<MetricsState>) -> impl IntoResponse {
    // Sampled on scrape.
    metrics::gauge!("bus_dead_letters_pending").set(state.bus.dead_letters().len() as f64);

    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.handle.render(),
    )
}
