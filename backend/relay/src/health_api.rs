//! Relay Health API

use axum::{extract::State, Json};

use pantry_core::HealthReport;

use crate::server::RelayState;

/// Handler for `GET /api/health`.
///
/// `modelBackend` only says whether the provider is configured; the upstream is not called.
pub async fn get_health(State(state): State<RelayState>) -> Json<HealthReport> {
    Json(HealthReport::ok(state.model.is_configured()))
}
