//! Beacon service entry point.
//!
//! Parses CLI arguments, loads configuration (optional TOML file plus
//! environment), initializes tracing, builds the Axum router and starts the
//! HTTP server.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beacon::config::AppConfig;
use beacon::http::start_server;
use beacon::{create_router, AppState};

/// Beacon: backend service scaffold with cluster-aware health checks
#[derive(Parser, Debug)]
#[command(name = "beacon", version, about)]
struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level filter (e.g., "beacon=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,

    /// Listen host, overrides APP_HOST
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides APP_PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.app.host = host;
    }
    if let Some(port) = args.port {
        config.app.port = port;
    }

    // Initialize tracing with priority: CLI > env > config
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| config.logging.level.clone());

    let filter = tracing_subscriber::EnvFilter::new(&log_filter);
    if config.logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        name = %config.app.name,
        environment = %config.app.environment,
        node_id = config.app.node_id.as_deref().unwrap_or("<hostname>"),
        "Loaded configuration"
    );

    for (component, url) in config.monitoring.endpoints() {
        tracing::info!(component, %url, "Monitoring endpoint configured");
    }
    tracing::debug!(
        stack = %config.monitoring.docker.stack_name,
        compose_project = %config.monitoring.docker.compose_project_name,
        "Docker deployment"
    );

    let state = AppState::new(config.clone());
    let app = create_router(state);

    start_server(app, &config).await?;

    Ok(())
}
