//! Tracing setup and startup logging helpers.
//!
//! [`init_tracing`] installs the global subscriber. [`OpTimer`] and the
//! `log_*` macros give startup and per-request phases a uniform shape in the
//! logs, so a slow datastore probe or a failed submission is easy to find.

use std::fmt::Display;
use std::time::{Duration, Instant};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `level` when set. With `json` the output is one JSON
/// object per line. Calling this twice is harmless; the second call is a
/// no-op.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Measures one named operation and logs how long it took.
///
/// ```rust,ignore
/// let timer = OpTimer::new("datastore", "ping");
/// let result = store.ping().await;
/// timer.finish_with(result.as_ref());
/// ```
#[derive(Debug)]
pub struct OpTimer {
    component: &'static str,
    operation: &'static str,
    start: Instant,
}

impl OpTimer {
    #[must_use]
    pub fn new(component: &'static str, operation: &'static str) -> Self {
        tracing::debug!(component, operation, "Operation started");
        Self {
            component,
            operation,
            start: Instant::now(),
        }
    }

    /// Time elapsed so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Log completion.
    pub fn finish(self) {
        let duration_ms = self.start.elapsed().as_millis();
        tracing::info!(
            component = self.component,
            operation = self.operation,
            duration_ms,
            "Operation completed"
        );
    }

    /// Log completion at info on `Ok` and at warn with the error on `Err`.
    ///
    /// Failures here are logged as warnings rather than errors because every
    /// timed operation in this service has a fallback path.
    pub fn finish_with<T, E: Display>(self, result: Result<&T, &E>) {
        let duration_ms = self.start.elapsed().as_millis();
        match result {
            Ok(_) => tracing::info!(
                component = self.component,
                operation = self.operation,
                duration_ms,
                "Operation completed"
            ),
            Err(e) => tracing::warn!(
                component = self.component,
                operation = self.operation,
                duration_ms,
                error = %e,
                "Operation failed"
            ),
        }
    }
}

/// Log a numbered startup step: `[2/5] Datastore - PostgREST at ...`.
#[macro_export]
macro_rules! log_init_step {
    ($step:expr, $total:expr, $name:expr, $detail:expr) => {
        tracing::info!(step = $step, total = $total, "[{}/{}] {} - {}", $step, $total, $name, $detail);
    };
    ($step:expr, $total:expr, $name:expr) => {
        tracing::info!(step = $step, total = $total, "[{}/{}] {}", $step, $total, $name);
    };
}

/// Log a degraded-but-running startup condition.
#[macro_export]
macro_rules! log_init_warning {
    ($msg:expr) => {
        tracing::warn!("⚠️  {}", $msg);
    };
    ($fmt:expr, $($arg:tt)*) => {
        tracing::warn!("⚠️  {}", format!($fmt, $($arg)*));
    };
}

/// Log the end of a major phase.
#[macro_export]
macro_rules! log_success {
    ($msg:expr) => {
        tracing::info!("✅ {}", $msg);
    };
    ($fmt:expr, $($arg:tt)*) => {
        tracing::info!("✅ {}", format!($fmt, $($arg)*));
    };
}

/// Log a framed banner line.
#[macro_export]
macro_rules! log_banner {
    ($title:expr) => {
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("  {}", $title);
        tracing::info!("═══════════════════════════════════════════════════");
    };
    ($title:expr, $subtitle:expr) => {
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("  {}", $title);
        tracing::info!("  {}", $subtitle);
        tracing::info!("═══════════════════════════════════════════════════");
    };
}
