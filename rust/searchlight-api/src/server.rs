//! HTTP server setup and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::HeaderValue;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api;
use crate::config::{AppConfig, ResultsMode};
use crate::database::{Database, LibraryRepository};
use crate::events::notifier_from_config;
use crate::gateway::{self, IdentityProvider, JwtIdentityProvider, UnconfiguredIdentity};
use crate::logging::OpTimer;
use crate::results::provider_from_config;
use crate::{AppState, Services, log_banner, log_init_step, log_init_warning, log_success};

/// Searchlight API version (from Cargo.toml).
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the service handles described by `config`.
///
/// Missing optional integrations degrade instead of failing: no datastore
/// means in-memory storage, no signing key means notifications are skipped,
/// and no identity key means every request is anonymous.
pub fn build_services(config: &AppConfig) -> anyhow::Result<Services> {
    // [1/4] Identity
    let step_timer = OpTimer::new("server", "identity");
    let identity: Arc<dyn IdentityProvider> = match JwtIdentityProvider::from_config(&config.identity)? {
        Some(provider) => {
            log_init_step!(1, 4, "Identity", "🔐 Bearer token verification enabled");
            Arc::new(provider)
        }
        None => {
            log_init_warning!("No identity key configured. Every request is anonymous.");
            log_init_step!(1, 4, "Identity", "🔐 Disabled");
            Arc::new(UnconfiguredIdentity)
        }
    };
    step_timer.finish();

    // [2/4] Datastore
    let step_timer = OpTimer::new("server", "datastore");
    let database = Database::from_config(&config.datastore)?;
    let datastore_info = match config.datastore.url.as_deref() {
        Some(url) if database.backend_name() == "postgrest" => format!("🗄️  PostgREST at {url}"),
        _ => "🗄️  In-memory (records are lost on restart)".to_string(),
    };
    log_init_step!(2, 4, "Datastore", datastore_info);
    step_timer.finish();

    // [3/4] Result provider
    let step_timer = OpTimer::new("server", "results");
    let results = provider_from_config(&config.results)?;
    let results_info = match config.results.mode {
        ResultsMode::Mock => "🔎 Mock results".to_string(),
        ResultsMode::Live => format!("🔎 Live results from {}", config.results.endpoint),
    };
    log_init_step!(3, 4, "Results", results_info);
    step_timer.finish();

    // [4/4] Notifications
    let notifier = notifier_from_config(&config.events);
    if notifier.is_enabled() {
        log_init_step!(4, 4, "Events", format!("📣 Sending to {}", config.events.url));
    } else {
        log_init_step!(4, 4, "Events", "📣 Disabled (no signing key)");
    }

    Ok(Services::with_database(database, results, notifier, identity))
}

/// Create the application with all routes and middleware.
pub fn create_app(config: AppConfig) -> anyhow::Result<Router> {
    let overall_timer = OpTimer::new("server", "create_app");

    log_banner!(
        format!("🔦 Searchlight API v{VERSION}"),
        format!(
            "Results: {:?} | Datastore: {}",
            config.results.mode,
            if config.datastore.url.is_some() { "PostgREST" } else { "memory" }
        )
    );

    let services = build_services(&config)?;
    let state = AppState::new(config, services);
    let app = router(state);

    overall_timer.finish();
    log_success!("Searchlight API server created successfully");

    Ok(app)
}

/// All routes with middleware, bound to `state`.
///
/// Layers run outermost first: trace, CORS, timeout, then authentication,
/// so every response the inner layers produce carries CORS headers.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    let timeout = Duration::from_secs(state.config.server.timeout_secs);

    Router::new()
        .merge(api::create_router())
        .merge(gateway::create_router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            gateway::auth::attach_principal,
        ))
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any origin when none are configured, otherwise exactly the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| tracing::warn!(origin = %origin, "Ignoring invalid CORS origin"))
                .ok()
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
