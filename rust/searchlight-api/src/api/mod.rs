//! HTTP API endpoints.

pub mod discover;
pub mod error;
pub mod events;
pub mod health;
pub mod library;
pub mod search;

use axum::Router;

use crate::AppState;

pub use error::ApiError;

/// Create the API router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(search::router())
        .merge(library::router())
        .merge(events::router())
        .merge(discover::router())
}
