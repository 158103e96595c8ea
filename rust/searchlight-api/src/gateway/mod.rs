//! Gateway layer: token verification, request authentication and the
//! identity endpoints.

pub mod auth;
pub mod identity;
pub mod routes;

use axum::Router;

use crate::AppState;

pub use auth::{CurrentPrincipal, MaybePrincipal};
pub use identity::{
    AuthError, IdentityProvider, JwtIdentityProvider, Principal, PrincipalSlot,
    UnconfiguredIdentity,
};

pub fn create_router() -> Router<AppState> {
    Router::new().merge(routes::router())
}
