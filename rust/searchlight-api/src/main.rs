//! Searchlight API - Main Entry Point
//!
//! Serves the HTTP API by default. `ask` and `history` run one search or
//! list the library from the terminal against the same services.

use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use mimalloc::MiMalloc;

use searchlight_api::config::AppConfig;
use searchlight_api::database::LibraryRepository;
use searchlight_api::domain::{LibraryFilter, SearchResults, SearchType, SortOrder};
use searchlight_api::gateway::{IdentityProvider, Principal, PrincipalSlot};
use searchlight_api::logging::init_tracing;
use searchlight_api::runtime::{QueryController, SubmitOutcome, WriteOutcome};
use searchlight_api::server::{build_services, create_app};
use searchlight_api::view::{ExportFormat, View};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "searchlight-api")]
#[command(about = "Searchlight API - AI search assistant backend")]
#[command(version)]
struct Cli {
    /// Log level; overrides `logging.level` from the configuration.
    #[arg(long, env = "RUST_LOG", global = true)]
    log_level: Option<String>,

    /// Config file path.
    #[arg(short, long, env = "SEARCHLIGHT_CONFIG", global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default).
    Serve {
        /// Host to bind to.
        #[arg(long, env = "SEARCHLIGHT_HOST")]
        host: Option<String>,

        /// Port to listen on.
        #[arg(short, long, env = "SEARCHLIGHT_PORT")]
        port: Option<u16>,
    },
    /// Run one search and print the result.
    Ask {
        /// The query.
        query: String,

        /// `search` or `research`.
        #[arg(short = 't', long = "type", default_value = "search")]
        kind: SearchType,

        /// Model label, e.g. "GPT-4o".
        #[arg(short, long)]
        model: Option<String>,

        /// Print an export (`md` or `json`) instead of the text view.
        #[arg(long)]
        export: Option<ExportFormat>,

        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// List the library of a user.
    History {
        /// Only `search` or `research` entries.
        #[arg(short = 't', long = "type")]
        kind: Option<SearchType>,

        /// Oldest first.
        #[arg(long)]
        oldest: bool,

        #[command(flatten)]
        identity: IdentityArgs,
    },
}

#[derive(Args, Debug)]
struct IdentityArgs {
    /// Bearer token to sign in with.
    #[arg(long, env = "SEARCHLIGHT_TOKEN", conflicts_with = "as_email")]
    token: Option<String>,

    /// Act as this email without a token (local use).
    #[arg(long = "as", value_name = "EMAIL")]
    as_email: Option<String>,
}

fn local_principal(email: &str) -> Principal {
    Principal {
        id: format!("local:{email}"),
        email: email.to_string(),
        name: None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.config.as_deref())?;
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, config.logging.json);

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Ask {
            query,
            kind,
            model,
            export,
            identity,
        } => ask(&config, &query, kind, model.as_deref(), export, &identity).await,
        Command::History {
            kind,
            oldest,
            identity,
        } => history(&config, kind, oldest, &identity).await,
    }
}

async fn serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!("Starting Searchlight API v{}", env!("CARGO_PKG_VERSION"));
    let app = create_app(config)?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn ask(
    config: &AppConfig,
    query: &str,
    kind: SearchType,
    model: Option<&str>,
    export: Option<ExportFormat>,
    identity: &IdentityArgs,
) -> anyhow::Result<()> {
    let services = build_services(config)?;
    let principal = resolve_principal(&services.identity, identity)?;
    let controller = QueryController::for_principal(services, principal);

    controller.set_query(query);
    controller.select_type(kind);
    if let Some(model) = model {
        controller.select_model(model)?;
    }

    let outcome = controller.submit().await?;
    report_writes(&outcome);

    match (export, &outcome) {
        (Some(format), SubmitOutcome::Rendered { .. }) => println!("{}", controller.export(format)?),
        _ => print!("{}", View::project(&controller.snapshot()).render_text()),
    }

    if let SubmitOutcome::Errored { error, .. } = outcome {
        anyhow::bail!(error);
    }
    Ok(())
}

async fn history(
    config: &AppConfig,
    kind: Option<SearchType>,
    oldest: bool,
    identity: &IdentityArgs,
) -> anyhow::Result<()> {
    let services = build_services(config)?;
    let principal = resolve_principal(&services.identity, identity)?
        .context("history needs --token or --as")?;

    let filter = LibraryFilter::for_user(&principal.email).with_kind(kind);
    let order = if oldest { SortOrder::Oldest } else { SortOrder::Newest };
    let records = services.library.select(&filter, order).await?;

    if records.is_empty() {
        println!("No searches yet.");
    }
    for record in records {
        let sources = record
            .search_results
            .as_ref()
            .and_then(SearchResults::from_blob)
            .map_or(0, |r| r.web_results.len());
        println!(
            "#{:<5} {}  [{}]  {}  ({} sources, {})",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.kind,
            record.search_input,
            sources,
            record.ai_model.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn resolve_principal(
    provider: &Arc<dyn IdentityProvider>,
    args: &IdentityArgs,
) -> anyhow::Result<Option<Principal>> {
    if let Some(token) = &args.token {
        let slot = PrincipalSlot::new(Arc::clone(provider));
        return Ok(Some(slot.sign_in(token).context("sign-in failed")?));
    }
    Ok(args.as_email.as_deref().map(local_principal))
}

fn report_writes(outcome: &SubmitOutcome) {
    let writes = match outcome {
        SubmitOutcome::Rendered { writes, .. } | SubmitOutcome::Errored { writes, .. } => writes,
        _ => return,
    };
    for write in [&writes.provisional, &writes.enriched].into_iter().flatten() {
        if let WriteOutcome::Failed(failure) = write {
            eprintln!("warning: {failure}");
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
