//! qrcard-server - contact QR generator and scan recorder
//!
//! Serves the generator and scanner pages plus the JSON API, persisting
//! scans in either a SQLite database or `.xlsx` workbooks.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qrcard_common::config::{BackendKind, ConfigOverrides, ServiceConfig, TomlConfig};
use qrcard_common::PayloadFormat;
use qrcard_server::{build_router, store, AppState};

/// Command-line arguments for qrcard-server
#[derive(Parser, Debug)]
#[command(name = "qrcard-server")]
#[command(about = "Contact QR code generator and scan recorder")]
#[command(version)]
struct Args {
    /// TOML bootstrap file
    #[arg(short, long, env = "QRCARD_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "QRCARD_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "QRCARD_PORT")]
    port: Option<u16>,

    /// Record store backend: sqlite or sheet
    #[arg(short, long, env = "QRCARD_BACKEND")]
    backend: Option<BackendKind>,

    /// Database connection string for the sqlite backend
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Workbook directory for the sheet backend
    #[arg(long, env = "QRCARD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory for saved QR images
    #[arg(long, env = "QRCARD_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Payload encoding for generated codes: text or json
    #[arg(long, env = "QRCARD_PAYLOAD_FORMAT")]
    payload_format: Option<PayloadFormat>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            backend: self.backend,
            database_url: self.database_url.clone(),
            data_dir: self.data_dir.clone(),
            static_dir: self.static_dir.clone(),
            payload_format: self.payload_format,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let toml = match &args.config {
        Some(path) => TomlConfig::load(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => TomlConfig::default(),
    };

    // RUST_LOG overrides the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting qrcard-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = ServiceConfig::resolve(args.overrides(), toml)
        .context("Invalid configuration")?;

    let store = match store::open_store(&config).await {
        Ok(store) => {
            info!("✓ Record store ready ({})", store.backend_name());
            store
        }
        Err(e) => {
            error!("Failed to open record store: {}", e);
            return Err(e.into());
        }
    };

    let state = AppState::new(store.clone(), &config);
    let app = build_router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("qrcard-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    store.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
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
