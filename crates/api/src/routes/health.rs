//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Integration events no handler could process.
    pub dead_letters: usize,
    /// Committed integration events still waiting for the bus.
    pub outbox_pending: usize,
}

/// GET /health: returns system health status.
pub async fn check<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        dead_letters: state.bus.dead_letters().len(),
        outbox_pending: state.outbox_pending().await,
    })
}
