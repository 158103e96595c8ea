//! Search endpoints.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::AppState;
use crate::domain::{
    AiAnalysis, ImageResult, MODELS, ModelRef, SearchType, WebResult, default_model,
};
use crate::gateway::MaybePrincipal;
use crate::runtime::{LifecycleError, LifecycleState, QueryController, SubmitOutcome};
use crate::view::View;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/search", post(search))
        .route("/api/queries", post(run_query))
        .route("/api/search/images", post(search_images))
        .route("/api/models", get(list_models))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl SearchRequest {
    fn query(&self) -> Result<String, ApiError> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Query is required"))
    }

    /// Unknown or missing types fall back to `search`.
    fn kind(&self) -> SearchType {
        self.kind
            .as_deref()
            .and_then(|k| k.parse().ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub query: String,
    #[serde(rename = "type")]
    pub kind: SearchType,
    pub model: String,
    pub web_results: Vec<WebResult>,
    pub ai_analysis: AiAnalysis,
    pub timestamp: String,
}

/// Stateless search: results for a query without touching the library.
pub async fn search(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(req) = body?;
    let query = req.query()?;
    let kind = req.kind();
    let model = req
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| default_model().name.to_string());

    let results = state
        .services
        .results
        .fetch_results(&query, kind, &model)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Search failed");
            ApiError::Internal("Search failed".into())
        })?;

    Ok(Json(SearchResponse {
        success: true,
        query,
        kind,
        model,
        web_results: results.web_results,
        ai_analysis: results.ai_analysis,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub outcome: SubmitOutcome,
    pub view: View,
    pub trace: Vec<LifecycleState>,
}

/// Run the full lifecycle for the caller: provisional write, fetch,
/// enriched write.
pub async fn run_query(
    State(state): State<AppState>,
    MaybePrincipal(principal): MaybePrincipal,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let controller = QueryController::for_principal(state.services.clone(), principal);
    controller.set_query(req.query.as_deref().unwrap_or_default());
    controller.select_type(req.kind());
    if let Some(model) = req.model.as_deref().filter(|m| !m.trim().is_empty()) {
        controller
            .select_model(model)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
    }

    let outcome = controller.submit().await?;
    let session = controller.snapshot();
    let status = match &outcome {
        SubmitOutcome::Errored {
            error: LifecycleError::PreconditionFailed(_),
            ..
        } => StatusCode::BAD_REQUEST,
        SubmitOutcome::Errored {
            error: LifecycleError::ProviderUnavailable(_),
            ..
        } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    };

    let response = QueryResponse {
        error: session.error.clone(),
        view: View::project(&session),
        trace: session.trace,
        outcome,
    };
    Ok((status, Json(response)))
}

#[derive(Debug, Deserialize)]
pub struct ImageSearchRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImageSearchResponse {
    pub success: bool,
    pub query: String,
    pub images: Vec<ImageResult>,
}

pub async fn search_images(
    State(state): State<AppState>,
    MaybePrincipal(principal): MaybePrincipal,
    body: Result<Json<ImageSearchRequest>, JsonRejection>,
) -> Result<Json<ImageSearchResponse>, ApiError> {
    let Json(req) = body?;
    let controller = QueryController::for_principal(state.services.clone(), principal);
    controller.set_query(req.query.as_deref().unwrap_or_default());

    let images = controller.search_images().await?;
    Ok(Json(ImageSearchResponse {
        success: true,
        query: controller.snapshot().query.trim().to_string(),
        images,
    }))
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: &'static [ModelRef],
    pub default: &'static str,
}

pub async fn list_models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: &MODELS,
        default: default_model().name,
    })
}
