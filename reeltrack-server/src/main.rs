//! # reeltrack server
//!
//! Runs the daily show update on a timer, drains the show queue on a worker
//! task and exposes progress and notifications over HTTP.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use reeltrack_server::{
    config::{ConfigLoad, ConfigLoader, ConfigLoaderOptions},
    infra::{
        scheduler::run_schedule,
        startup::{Services, build_services},
    },
    routes::create_router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "reeltrack-server")]
#[command(about = "Keeps tracked TV shows fresh with a staleness-driven daily update")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "REELTRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long, env = "REELTRACK_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "REELTRACK_HOST")]
    host: Option<String>,

    /// Run one update as soon as the server starts
    #[arg(long, default_value_t = false)]
    run_now: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let ConfigLoad {
        mut config,
        warnings,
    } = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config,
        env_file: cli.env_file,
    })
    .load()
    .context("failed to load configuration")?;

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if cli.run_now {
        config.schedule.run_on_startup = true;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reeltrack=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = config.metadata.config_path.as_ref() {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    let bind_address = config.server.bind_address();
    let schedule = config.schedule.clone();

    let Services { context, executor } = build_services(config).await?;
    let cancel = CancellationToken::new();

    let worker = tokio::spawn(context.queue().run_worker(executor, cancel.clone()));
    let scheduler = tokio::spawn(run_schedule(context.updater(), schedule, cancel.clone()));

    let router = create_router(context);
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(address = %bind_address, "reeltrack server listening");

    let shutdown = cancel.clone();
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
            _ = shutdown.cancelled() => {}
        }
        shutdown.cancel();
    })
    .await
    .context("server error")?;

    cancel.cancel();
    let (worker, scheduler) = tokio::join!(worker, scheduler);
    worker.context("queue worker panicked")?;
    scheduler.context("update scheduler panicked")?;
    info!("reeltrack server stopped");
    Ok(())
}
