//! Identity provider adapter.
//!
//! Tokens are issued by an external identity provider. This module only
//! verifies them and turns their claims into a [`Principal`].

use std::fmt;
use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::IdentityConfig;

/// The authenticated user a request or session acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

impl Principal {
    /// Display name, falling back to the local part of the email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

/// Claims read from identity tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Token verification failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token is missing the '{0}' claim")]
    MissingClaim(&'static str),
    #[error("No identity provider is configured")]
    NotConfigured,
}

impl AuthError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_auth",
            Self::Expired => "token_expired",
            Self::InvalidToken(_) | Self::MissingClaim(_) => "invalid_token",
            Self::NotConfigured => "identity_not_configured",
        }
    }
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = AuthErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::InvalidToken(err.to_string()),
        }
    }
}

/// Verifies bearer tokens.
pub trait IdentityProvider: Send + Sync + fmt::Debug {
    fn verify(&self, token: &str) -> Result<Principal, AuthError>;

    /// Whether this provider can accept any token at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Used when no key is configured; every token is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredIdentity;

impl IdentityProvider for UnconfiguredIdentity {
    fn verify(&self, _token: &str) -> Result<Principal, AuthError> {
        Err(AuthError::NotConfigured)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// JWT verification with an RS256 public key or an HS256 secret.
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
    algorithm: Algorithm,
}

impl fmt::Debug for JwtIdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtIdentityProvider")
            .field("algorithm", &self.algorithm)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl JwtIdentityProvider {
    /// Verify RS256 tokens signed by the provider.
    pub fn from_public_key_pem(pem: &str) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::InvalidToken(format!("bad public key: {e}")))?;
        Ok(Self::with_key(key, Algorithm::RS256))
    }

    /// Verify HS256 tokens signed with a shared secret.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        Self::with_key(DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        // Provider session tokens carry no audience.
        validation.validate_aud = false;
        Self {
            key,
            validation,
            algorithm,
        }
    }

    /// Require a specific `iss` claim.
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Build the provider the configuration asks for, if any.
    pub fn from_config(config: &IdentityConfig) -> Result<Option<Self>, AuthError> {
        let provider = match (&config.public_key, &config.jwt_secret) {
            (Some(pem), _) => Self::from_public_key_pem(pem)?,
            (None, Some(secret)) => Self::from_secret(secret),
            (None, None) => return Ok(None),
        };
        Ok(Some(match config.issuer.as_deref() {
            Some(issuer) => provider.with_issuer(issuer),
            None => provider,
        }))
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        let claims = data.claims;
        let email = claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or(AuthError::MissingClaim("email"))?;
        Ok(Principal {
            id: claims.sub,
            email,
            name: claims.name,
        })
    }
}

/// Mint an HS256 token for `principal`, valid for `ttl_secs`.
///
/// Only meaningful with a development secret; production tokens come from
/// the identity provider.
pub fn issue_token(secret: &str, principal: &Principal, ttl_secs: i64) -> Result<String, AuthError> {
    let claims = Claims {
        sub: principal.id.clone(),
        email: Some(principal.email.clone()),
        name: principal.name.clone(),
        exp: chrono::Utc::now().timestamp() + ttl_secs,
        iss: None,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(AuthError::from)
}

/// Holds the signed-in principal of an in-process client.
#[derive(Debug)]
pub struct PrincipalSlot {
    provider: Arc<dyn IdentityProvider>,
    current: RwLock<Option<Principal>>,
}

impl PrincipalSlot {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            current: RwLock::new(None),
        }
    }

    /// A slot seeded with an already verified principal.
    #[must_use]
    pub fn with_principal(provider: Arc<dyn IdentityProvider>, principal: Option<Principal>) -> Self {
        Self {
            provider,
            current: RwLock::new(principal),
        }
    }

    /// Verify `token` and make its principal current. On failure the
    /// previous principal is kept.
    pub fn sign_in(&self, token: &str) -> Result<Principal, AuthError> {
        let principal = self.provider.verify(token)?;
        *self.current.write() = Some(principal.clone());
        tracing::info!(user_id = %principal.id, "Signed in");
        Ok(principal)
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.current.write().take() {
            tracing::info!(user_id = %previous.id, "Signed out");
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<Principal> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-with-enough-length";

    fn alice() -> Principal {
        Principal {
            id: "user_1".into(),
            email: "alice@example.com".into(),
            name: Some("Alice".into()),
        }
    }

    #[test]
    fn test_hs256_round_trip() {
        let provider = JwtIdentityProvider::from_secret(SECRET);
        let token = issue_token(SECRET, &alice(), 3600).unwrap();
        assert_eq!(provider.verify(&token).unwrap(), alice());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let provider = JwtIdentityProvider::from_secret("another-secret");
        let token = issue_token(SECRET, &alice(), 3600).unwrap();
        assert!(matches!(provider.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let provider = JwtIdentityProvider::from_secret(SECRET);
        // Past the default 60s leeway.
        let token = issue_token(SECRET, &alice(), -3600).unwrap();
        assert_eq!(provider.verify(&token).unwrap_err(), AuthError::Expired);
    }

    #[test]
    fn test_missing_email_claim() {
        let claims = Claims {
            sub: "user_2".into(),
            email: None,
            name: None,
            exp: chrono::Utc::now().timestamp() + 600,
            iss: None,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        let provider = JwtIdentityProvider::from_secret(SECRET);
        assert_eq!(provider.verify(&token).unwrap_err(), AuthError::MissingClaim("email"));
    }

    #[test]
    fn test_bad_pem_rejected() {
        assert!(JwtIdentityProvider::from_public_key_pem("not a key").is_err());
    }

    #[test]
    fn test_from_config_without_keys() {
        let provider = JwtIdentityProvider::from_config(&IdentityConfig::default()).unwrap();
        assert!(provider.is_none());
    }

    #[test]
    fn test_slot_sign_in_and_out() {
        let slot = PrincipalSlot::new(Arc::new(JwtIdentityProvider::from_secret(SECRET)));
        assert!(slot.current().is_none());

        assert!(slot.sign_in("garbage").is_err());
        assert!(slot.current().is_none());

        let token = issue_token(SECRET, &alice(), 3600).unwrap();
        slot.sign_in(&token).unwrap();
        assert_eq!(slot.current().unwrap().email, "alice@example.com");

        slot.sign_out();
        assert!(slot.current().is_none());
    }

    #[test]
    fn test_unconfigured_rejects_everything() {
        assert_eq!(UnconfiguredIdentity.verify("x").unwrap_err(), AuthError::NotConfigured);
    }

    #[test]
    fn test_display_name_fallback() {
        let mut p = alice();
        assert_eq!(p.display_name(), "Alice");
        p.name = None;
        assert_eq!(p.display_name(), "alice");
    }
}
