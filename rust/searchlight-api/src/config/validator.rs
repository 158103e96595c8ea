//! Startup validation of setting combinations.

use url::Url;

use super::error::{ConfigResult, ConfigurationError};
use super::{AppConfig, DatastoreConfig, IdentityConfig};

/// Checks an [`AppConfig`] and reports every problem at once.
#[derive(Debug)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> ConfigResult<()> {
        let mut errors = Vec::new();

        errors.extend(Self::validate_datastore(&config.datastore));
        errors.extend(Self::validate_identity(&config.identity));

        if let Err(e) = Self::validate_http_url("events.url", "EVENTS_URL", &config.events.url) {
            errors.push(e);
        }
        if let Err(e) = Self::validate_http_url(
            "results.endpoint",
            "SEARCHLIGHT__RESULTS__ENDPOINT",
            &config.results.endpoint,
        ) {
            errors.push(e);
        }

        if config.results.timeout_secs == 0 {
            errors.push(ConfigurationError::invalid(
                "results.timeout_secs is 0, so every live fetch would fall back immediately",
                "Set SEARCHLIGHT__RESULTS__TIMEOUT_SECS to a positive number of seconds (default 8)",
            ));
        }
        if config.server.timeout_secs == 0 {
            errors.push(ConfigurationError::invalid(
                "server.timeout_secs is 0",
                "Set SEARCHLIGHT__SERVER__TIMEOUT_SECS to a positive number of seconds (default 30)",
            ));
        }

        match ConfigurationError::collect(errors) {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// A URL without a key cannot authenticate against the datastore.
    pub fn validate_datastore(config: &DatastoreConfig) -> Vec<ConfigurationError> {
        let mut errors = Vec::new();
        let Some(url) = config.url.as_deref() else {
            return errors;
        };

        if let Err(e) = Self::validate_http_url("datastore.url", "DATASTORE_URL", url) {
            errors.push(e);
        }
        if config.anon_key.is_none() {
            errors.push(ConfigurationError::missing_required(
                "datastore anon key",
                "talking to the datastore at DATASTORE_URL",
                "DATASTORE_ANON_KEY",
            ));
        }
        errors
    }

    pub fn validate_identity(config: &IdentityConfig) -> Vec<ConfigurationError> {
        let mut errors = Vec::new();

        if let Some(key) = config.public_key.as_deref() {
            if !key.trim_start().starts_with("-----BEGIN") {
                errors.push(ConfigurationError::invalid(
                    "IDENTITY_PUBLIC_KEY is not a PEM-encoded key",
                    "Paste the identity provider's public key including the \
                     '-----BEGIN PUBLIC KEY-----' header and footer",
                ));
            }
            if config.jwt_secret.is_some() {
                errors.push(ConfigurationError::incompatible(
                    "IDENTITY_PUBLIC_KEY",
                    "IDENTITY_JWT_SECRET",
                    "Tokens are verified either with the provider's RS256 public key or with a \
                     development HS256 secret. Unset one of them.",
                ));
            }
        }

        if let Some(secret) = config.jwt_secret.as_deref()
            && secret.trim().is_empty()
        {
            errors.push(ConfigurationError::invalid(
                "IDENTITY_JWT_SECRET is blank",
                "Unset IDENTITY_JWT_SECRET or give it a non-empty value",
            ));
        }

        errors
    }

    fn validate_http_url(setting: &str, env_var: &str, value: &str) -> ConfigResult<()> {
        match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            Ok(url) => Err(ConfigurationError::invalid(
                format!("{setting} uses unsupported scheme '{}'", url.scheme()),
                format!("Set {env_var} to an http:// or https:// URL"),
            )),
            Err(e) => Err(ConfigurationError::invalid(
                format!("{setting} is not a valid URL ({e}): '{value}'"),
                format!("Set {env_var} to an absolute URL such as https://example.com"),
            )),
        }
    }
}
