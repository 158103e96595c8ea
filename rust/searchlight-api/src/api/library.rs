//! Library (search history) endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::ApiError;
use super::search::QueryResponse;
use crate::AppState;
use crate::domain::{
    LibraryFilter, NewSearchRecord, RecordStage, SearchRecord, SearchResults, SearchType, SortOrder,
};
use crate::gateway::{CurrentPrincipal, Principal};
use crate::runtime::QueryController;
use crate::view::View;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/library/save", post(save_record))
        .route("/api/library", get(list_records))
        .route("/api/library/{id}", get(get_record).delete(delete_record))
        .route("/api/library/{id}/reopen", post(reopen_record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    #[serde(default)]
    pub search_input: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub search_id: Option<Uuid>,
    #[serde(default)]
    pub search_results: Option<Value>,
    #[serde(default)]
    pub ai_model: Option<String>,
}

impl SaveRequest {
    fn into_record(self) -> Result<NewSearchRecord, ApiError> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (Some(search_input), Some(user_email), Some(kind)) = (
            present(self.search_input),
            present(self.user_email),
            present(self.kind),
        ) else {
            return Err(ApiError::bad_request("Missing required fields"));
        };
        let kind: SearchType = kind
            .parse()
            .map_err(|e: crate::domain::UnknownSearchType| ApiError::bad_request(e.to_string()))?;

        Ok(NewSearchRecord {
            search_input,
            user_email,
            kind,
            search_id: self.search_id,
            ai_model: self.ai_model,
            search_results: self.search_results,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub data: SearchRecord,
}

/// Insert one record as given. Used by clients that write the library
/// directly.
pub async fn save_record(
    State(state): State<AppState>,
    body: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<Json<SaveResponse>, ApiError> {
    let Json(req) = body?;
    let record = req.into_record()?;
    let data = state.services.library.insert(&record).await?;
    tracing::info!(id = data.id, kind = %data.kind, "Library record saved");
    Ok(Json(SaveResponse {
        success: true,
        data,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
}

impl ListParams {
    fn filter(&self, email: &str) -> Result<LibraryFilter, ApiError> {
        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("" | "all") => None,
            Some(k) => Some(
                k.parse::<SearchType>()
                    .map_err(|e| ApiError::bad_request(e.to_string()))?,
            ),
        };
        Ok(LibraryFilter::for_user(email).with_kind(kind))
    }

    fn order(&self) -> Result<SortOrder, ApiError> {
        self.sort
            .as_deref()
            .map_or(Ok(SortOrder::default()), str::parse)
            .map_err(ApiError::BadRequest)
    }
}

/// One history row as shown in the library list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    #[serde(flatten)]
    pub record: SearchRecord,
    pub stage: RecordStage,
    /// Decoded results, when the blob is present and well formed.
    pub results: Option<SearchResults>,
}

impl From<SearchRecord> for LibraryEntry {
    fn from(record: SearchRecord) -> Self {
        let results = record.search_results.as_ref().and_then(SearchResults::from_blob);
        Self {
            stage: record.stage(),
            results,
            record,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<LibraryEntry>,
}

pub async fn list_records(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let filter = params.filter(&principal.email)?;
    let records = state.services.library.select(&filter, params.order()?).await?;
    let data: Vec<LibraryEntry> = records.into_iter().map(LibraryEntry::from).collect();
    Ok(Json(ListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Records of other users are reported as missing.
async fn owned_record(state: &AppState, principal: &Principal, id: i64) -> Result<SearchRecord, ApiError> {
    state
        .services
        .library
        .get(id)
        .await?
        .filter(|record| record.user_email == principal.email)
        .ok_or_else(|| ApiError::NotFound(format!("Search {id} not found")))
}

pub async fn get_record(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> Result<Json<LibraryEntry>, ApiError> {
    let record = owned_record(&state, &principal, id).await?;
    Ok(Json(LibraryEntry::from(record)))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub id: i64,
}

pub async fn delete_record(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    owned_record(&state, &principal, id).await?;
    state.services.library.delete(id).await?;
    tracing::info!(id, "Library record deleted");
    Ok(Json(DeleteResponse { success: true, id }))
}

/// Run a stored search again with its original query, type and model.
pub async fn reopen_record(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> Result<Json<QueryResponse>, ApiError> {
    let record = owned_record(&state, &principal, id).await?;
    let controller = QueryController::for_principal(state.services.clone(), Some(principal));
    let outcome = controller.reopen(&record).await?;
    let session = controller.snapshot();
    Ok(Json(QueryResponse {
        error: session.error.clone(),
        view: View::project(&session),
        trace: session.trace,
        outcome,
    }))
}
