//! HTTP handlers for invoices-service.

pub mod identification;
pub mod invoices;
pub mod persons;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::metrics::get_metrics;
use crate::startup::AppState;

/// Liveness plus a store round trip.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "invoices-service",
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(err) => {
            tracing::error!(error = %err, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}

/// Prometheus text exposition.
pub async fn metrics_handler() -> String {
    get_metrics()
}
