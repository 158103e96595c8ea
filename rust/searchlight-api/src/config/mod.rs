//! Configuration loading.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. `config/searchlight.{yaml,toml,json}` (or an explicit file)
//! 3. `SEARCHLIGHT__SECTION__KEY` environment variables
//! 4. The well-known variables `IDENTITY_PUBLIC_KEY`, `IDENTITY_JWT_SECRET`,
//!    `DATASTORE_URL`, `DATASTORE_ANON_KEY`, `EVENTS_SIGNING_KEY`, `EVENTS_URL`
//!
//! A `.env` file in the working directory is read first.

pub mod error;
pub mod validator;

pub use error::{ConfigResult, ConfigurationError};
pub use validator::ConfigValidator;

use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub datastore: DatastoreConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub results: ResultsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load and validate configuration from the default locations.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(None)
    }

    /// Load and validate, reading `file` instead of the default config files.
    pub fn load_from(file: Option<&str>) -> anyhow::Result<Self> {
        let config = Self::load_unchecked(file)?;
        ConfigValidator::validate(&config)
            .map_err(|e| anyhow::anyhow!("Configuration validation failed:\n\n{e}"))?;
        Ok(config)
    }

    /// Load without running [`ConfigValidator`].
    pub fn load_unchecked(file: Option<&str>) -> anyhow::Result<Self> {
        // A missing .env is normal.
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("results.endpoint", default_search_endpoint())?
            .set_default("results.timeout_secs", default_fetch_timeout())?;

        builder = match file {
            Some(path) => builder.add_source(config::File::with_name(path).required(true)),
            None => builder.add_source(config::File::with_name("config/searchlight").required(false)),
        };

        let mut app_config: AppConfig = builder
            .add_source(
                config::Environment::with_prefix("SEARCHLIGHT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        app_config.apply_env_overrides();
        Ok(app_config)
    }

    fn apply_env_overrides(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(key) = var("IDENTITY_PUBLIC_KEY") {
            // Keys pasted into .env files often carry literal \n sequences.
            self.identity.public_key = Some(key.replace("\\n", "\n"));
        }
        if let Some(secret) = var("IDENTITY_JWT_SECRET") {
            self.identity.jwt_secret = Some(secret);
        }
        if let Some(url) = var("DATASTORE_URL") {
            self.datastore.url = Some(url);
        }
        if let Some(key) = var("DATASTORE_ANON_KEY") {
            self.datastore.anon_key = Some(key);
        }
        if let Some(key) = var("EVENTS_SIGNING_KEY") {
            self.events.signing_key = Some(key);
        }
        if let Some(url) = var("EVENTS_URL") {
            self.events.url = url;
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Whole-request timeout applied by the router.
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_request_timeout(),
            cors_origins: Vec::new(),
        }
    }
}

/// External identity provider settings.
///
/// With neither key set every request is anonymous and submissions are
/// rejected with a precondition failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// PEM-encoded RSA public key for RS256 tokens.
    #[serde(default)]
    pub public_key: Option<String>,
    /// Shared secret for HS256 tokens, for development and tests.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// Expected `iss` claim, if any.
    #[serde(default)]
    pub issuer: Option<String>,
}

impl IdentityConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.public_key.is_some() || self.jwt_secret.is_some()
    }
}

/// Managed datastore (PostgREST dialect) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Project URL; when absent the in-memory store is used.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub anon_key: Option<String>,
    #[serde(default = "default_datastore_timeout")]
    pub timeout_secs: u64,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            timeout_secs: default_datastore_timeout(),
        }
    }
}

/// Background event processor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Without a signing key notifications are skipped.
    #[serde(default)]
    pub signing_key: Option<String>,
    #[serde(default = "default_events_url")]
    pub url: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            signing_key: None,
            url: default_events_url(),
        }
    }
}

/// Which result provider to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultsMode {
    /// Hard-coded results, no network.
    #[default]
    Mock,
    /// Best-effort HTML scrape with fallback.
    Live,
}

/// Result provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsConfig {
    #[serde(default)]
    pub mode: ResultsMode,
    /// HTML search endpoint scraped in live mode.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    /// Upper bound on the live fetch.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            mode: ResultsMode::default(),
            endpoint: default_search_endpoint(),
            timeout_secs: default_fetch_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_datastore_timeout() -> u64 {
    10
}

fn default_events_url() -> String {
    "http://127.0.0.1:8288/e".to_string()
}

fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".to_string()
}

fn default_fetch_timeout() -> u64 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.results.mode, ResultsMode::Mock);
        assert_eq!(config.results.timeout_secs, 8);
        assert!(config.datastore.url.is_none());
        assert!(config.events.signing_key.is_none());
        assert!(!config.identity.is_configured());
    }

    #[test]
    fn test_results_mode_deserializes_lowercase() {
        let cfg: ResultsConfig = serde_json::from_str(r#"{"mode":"live"}"#).unwrap();
        assert_eq!(cfg.mode, ResultsMode::Live);
        assert_eq!(cfg.endpoint, "https://html.duckduckgo.com/html/");
    }
}
