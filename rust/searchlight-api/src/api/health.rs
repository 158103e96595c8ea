//! Health, readiness and datastore connectivity endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;
use serde_json::json;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/test-db", get(test_db))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    status: &'static str,
    datastore: &'static str,
    results: &'static str,
    identity: bool,
    notifications: bool,
}

async fn readiness_check(State(state): State<AppState>) -> Json<ReadinessResponse> {
    let services = &state.services;
    Json(ReadinessResponse {
        status: "ready",
        datastore: services.library.backend_name(),
        results: services.results.name(),
        identity: services.identity.is_enabled(),
        notifications: services.notifier.is_enabled(),
    })
}

/// Run a trivial count against the `Library` table.
async fn test_db(State(state): State<AppState>) -> impl IntoResponse {
    match state.services.library.ping().await {
        Ok(data) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Database connection successful",
                "data": data,
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Datastore connectivity check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": e.to_string(),
                    "message": "Database connection failed",
                })),
            )
        }
    }
}
