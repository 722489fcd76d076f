//! mbt-server - Media backlog tracker HTTP service
//!
//! Resolves configuration, opens (or creates) the SQLite database and serves
//! the JSON API until Ctrl+C or SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mbt_common::config::{CliOverrides, FileConfig, Settings, ROOT_FOLDER_ENV};
use mbt_common::db::init_database;
use mbt_server::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "mbt_server=info,mbt_common=info,tower_http=info";

/// Command-line arguments for mbt-server
#[derive(Parser, Debug)]
#[command(name = "mbt-server")]
#[command(about = "Media backlog tracker service")]
#[command(version)]
struct Args {
    /// Folder holding the database
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Database file (relative paths are inside the root folder)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long, env = "MBT_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MBT_PORT")]
    port: Option<u16>,

    /// TOML config file (defaults to the platform config directory)
    #[arg(short, long, env = "MBT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => FileConfig::load(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => FileConfig::load_default(),
    };

    let settings = Settings::resolve(
        CliOverrides {
            root_folder: args.root_folder,
            database: args.database,
            bind: args.bind,
            port: args.port,
        },
        file_config,
    );

    // RUST_LOG wins over the config file
    let default_filter = settings
        .log_filter
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any database delay
    info!(
        "Starting mbt-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", settings.root_folder.display());
    info!("Database path: {}", settings.database_path.display());

    let pool = init_database(&settings.database_path)
        .await
        .context("Failed to initialize database")?;

    let app = build_router(AppState::new(pool.clone()));

    let addr = settings.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("mbt-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
