//! Event endpoints: manual trigger and the background processor callback.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiError;
use crate::AppState;
use crate::events::{BackgroundProcessor, EventEnvelope, FunctionReport, NotificationOutcome, ProcessorError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/inngest/trigger", post(trigger_event))
        .route("/api/inngest", get(list_functions).post(run_function))
}

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Forward an event to the processor. Delivery problems are logged only.
pub async fn trigger_event(
    State(state): State<AppState>,
    body: Result<Json<TriggerRequest>, JsonRejection>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let Json(req) = body?;
    let (Some(event), Some(data)) = (req.event.filter(|e| !e.trim().is_empty()), req.data) else {
        return Err(ApiError::bad_request("Event name and data are required"));
    };

    match state.services.notifier.notify(&event, data).await {
        NotificationOutcome::Failed(reason) => {
            tracing::warn!(event = %event, reason = %reason, "Triggered event was not delivered");
        }
        outcome => tracing::debug!(event = %event, ?outcome, "Event triggered"),
    }

    Ok(Json(TriggerResponse {
        success: true,
        message: "Event triggered successfully",
    }))
}

#[derive(Debug, Serialize)]
pub struct FunctionsResponse {
    pub events: [&'static str; 2],
}

pub async fn list_functions() -> Json<FunctionsResponse> {
    Json(FunctionsResponse {
        events: BackgroundProcessor::handled_events(),
    })
}

/// Callback from the background processor.
pub async fn run_function(
    State(state): State<AppState>,
    body: Result<Json<EventEnvelope>, JsonRejection>,
) -> Result<Json<FunctionReport>, ApiError> {
    let Json(event) = body?;
    state
        .processor
        .handle(&event)
        .await
        .map(Json)
        .map_err(|e| match e {
            ProcessorError::UnknownEvent(_) => ApiError::NotFound(e.to_string()),
            ProcessorError::MissingField(_) => ApiError::BadRequest(e.to_string()),
            ProcessorError::StepFailed { .. } => ApiError::Internal(e.to_string()),
        })
}
