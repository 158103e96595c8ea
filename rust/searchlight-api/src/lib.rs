//! Searchlight API - search assistant backend
//!
//! This crate serves an AI search assistant. A signed-in user types a query,
//! picks a search type and a model label, and receives reference results
//! plus a synthesized analysis. Every submission is recorded in the user's
//! library and announced to an external background processor.
//!
//! - **Lifecycle**: each submission writes a provisional library record,
//!   fetches results, then backfills the record with them
//! - **Identity**: bearer tokens verified against an external identity
//!   provider (RS256 public key, or an HS256 secret for development)
//! - **Persistence**: a PostgREST datastore, or process memory when none is
//!   configured
//! - **Notifications**: fire-and-forget events that never delay a search
//!
//! # Architecture
//!
//! - [`config`]: Configuration loading and validation
//! - [`gateway`]: Token verification and the identity endpoints
//! - [`domain`]: Library records, model catalogue and result payloads
//! - [`database`]: Library and user repositories
//! - [`results`]: Mock and live result providers
//! - [`events`]: Lifecycle notifications and background functions
//! - [`runtime`]: The query lifecycle controller
//! - [`view`]: Projections and export of a query session
//! - [`api`]: HTTP API endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use searchlight_api::{config::AppConfig, server::create_app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let app = create_app(config)?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod config;
pub mod database;
pub mod domain;
pub mod events;
pub mod gateway;
pub mod logging;
pub mod results;
pub mod runtime;
pub mod server;
pub mod view;

use std::sync::Arc;

use config::AppConfig;
use database::{Database, LibraryRepository, UserRepository};
use events::{BackgroundProcessor, EventNotifier};
use gateway::IdentityProvider;
use results::ResultProvider;

/// Service handles built once at startup and injected everywhere.
#[derive(Debug, Clone)]
pub struct Services {
    pub library: Arc<dyn LibraryRepository>,
    pub users: Arc<dyn UserRepository>,
    pub results: Arc<dyn ResultProvider>,
    pub notifier: Arc<dyn EventNotifier>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl Services {
    /// One datastore handle serving both repositories.
    #[must_use]
    pub fn with_database(
        database: Database,
        results: Arc<dyn ResultProvider>,
        notifier: Arc<dyn EventNotifier>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let database = Arc::new(database);
        Self {
            library: Arc::clone(&database) as Arc<dyn LibraryRepository>,
            users: database,
            results,
            notifier,
            identity,
        }
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    pub services: Services,
    /// Background functions invoked by the event processor callback.
    pub processor: BackgroundProcessor,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, services: Services) -> Self {
        let processor = BackgroundProcessor::new(Arc::clone(&services.results));
        Self {
            config: Arc::new(config),
            services,
            processor,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &"AppConfig")
            .field("datastore", &self.services.library.backend_name())
            .field("results", &self.services.results.name())
            .field("identity", &self.services.identity.is_enabled())
            .field("notifications", &self.services.notifier.is_enabled())
            .finish()
    }
}
