//! # Judge Server
//!
//! Accepts gesture sessions, fans each new session's image out to every
//! configured evaluator in the background and serves the aggregated scores.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use judge_config::{ConfigLoad, ConfigLoader};
use judge_server::{
    create_router,
    infra::{shutdown, startup},
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "judge-server")]
#[command(about = "Session orchestration and evaluator fan-out service")]
struct Cli {
    /// Path to a judge.toml configuration file
    #[arg(short, long, env = "JUDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = cli.env_file {
        loader = loader.with_env_file(path);
    }

    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "judge_server=info,judge_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    info!(
        evaluators = config.evaluators.backends.len(),
        timeout = ?config.evaluators.timeout,
        capture.root = %config.capture.root.display(),
        capture.delay = ?config.capture.delay,
        fanout.max_concurrent = config.fanout.max_concurrent,
        mock.enabled = config.mock.enabled,
        "configuration in effect"
    );

    let config = Arc::new(config);
    let state = startup::build_state(Arc::clone(&config)).await?;
    let orchestrator = Arc::clone(&state.orchestrator);
    let router = create_router(state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Starting judge server on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown::signal())
        .await?;

    if orchestrator.shutdown(config.shutdown.grace).await {
        info!("All background fan-outs finished");
    } else {
        warn!("Exiting after completing unfinished sessions with empty results");
    }

    Ok(())
}
