//! Identity and service info endpoints.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::auth::CurrentPrincipal;
use super::identity::{AuthError, Principal};
use crate::AppState;
use crate::domain::{NewUser, UserRecord};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/info", get(get_api_info))
        .route("/api/auth/me", get(get_current_user))
        .route("/api/auth/session", post(create_session))
}

#[derive(Debug, Serialize)]
pub struct ApiInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub identity_enabled: bool,
    pub datastore: &'static str,
    pub notifications_enabled: bool,
    pub results_mode: crate::config::ResultsMode,
}

pub async fn get_api_info(State(state): State<AppState>) -> impl IntoResponse {
    let info = ApiInfo {
        name: "Searchlight API",
        version: env!("CARGO_PKG_VERSION"),
        identity_enabled: state.services.identity.is_enabled(),
        datastore: state.services.library.backend_name(),
        notifications_enabled: state.services.notifier.is_enabled(),
        results_mode: state.config.results.mode,
    };
    (StatusCode::OK, Json(info))
}

pub async fn get_current_user(CurrentPrincipal(principal): CurrentPrincipal) -> Json<Principal> {
    Json(principal)
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Principal,
    /// `None` when the user row could not be written.
    pub record: Option<UserRecord>,
}

/// Sign in: verify the token and make sure a `Users` row exists.
///
/// Datastore failures are logged and do not fail the sign-in.
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, AuthError> {
    let principal = state.services.identity.verify(req.token.trim())?;

    let new_user = NewUser {
        name: principal.display_name().to_string(),
        email: principal.email.clone(),
    };
    let record = match state.services.users.ensure_user(&new_user).await {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(email = %principal.email, error = %e, "Could not ensure user row");
            None
        }
    };

    Ok(Json(SessionResponse {
        user: principal,
        record,
    }))
}
