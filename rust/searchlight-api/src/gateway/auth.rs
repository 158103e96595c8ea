//! Request authentication.
//!
//! [`attach_principal`] runs on every request. A valid bearer token puts its
//! [`Principal`] into the request extensions. A missing token leaves the
//! request anonymous, and so does a token that fails verification; the
//! failure is kept as a [`RejectedToken`] so that [`CurrentPrincipal`] can
//! answer 401 with the real reason. Routes that work anonymously read
//! [`MaybePrincipal`] and never see the failure.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use super::identity::{AuthError, Principal};
use crate::AppState;

/// Why the bearer token of a request was not accepted.
#[derive(Debug, Clone)]
pub struct RejectedToken(pub AuthError);

/// Middleware attaching the optional principal of the caller.
pub async fn attach_principal(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let verified = match req.headers().typed_get::<Authorization<Bearer>>() {
        Some(Authorization(bearer)) => Some(state.services.identity.verify(bearer.token())),
        None if req.headers().contains_key(AUTHORIZATION) => Some(Err(AuthError::InvalidToken(
            "Authorization header must use the Bearer scheme".into(),
        ))),
        None => None,
    };

    match verified {
        Some(Ok(principal)) => {
            req.extensions_mut().insert(principal);
        }
        Some(Err(e)) => {
            tracing::debug!(path = %req.uri().path(), error = %e, "Rejected bearer token");
            req.extensions_mut().insert(RejectedToken(e));
        }
        None => {}
    }

    next.run(req).await
}

/// Extractor for endpoints that need a signed-in user.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for CurrentPrincipal {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                parts
                    .extensions
                    .get::<RejectedToken>()
                    .map_or(AuthError::MissingToken, |rejected| rejected.0.clone())
            })
    }
}

/// Extractor for endpoints that behave differently when signed in.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

impl<S: Send + Sync> FromRequestParts<S> for MaybePrincipal {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().cloned()))
    }
}
