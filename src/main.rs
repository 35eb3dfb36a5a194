//! # Session Gate - Main Entry Point
//!
//! Loads configuration, installs logging, and serves the gated API until
//! SIGINT or SIGTERM.

use std::path::Path;
use tokio::signal;
use tracing::{info, warn};

use session_gate::observability::init_logging;
use session_gate::{GateConfig, GateResult, GateServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().await?;
    init_logging(&config.logging);

    info!("Starting session gate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let server = GateServer::new(&config)?;
    info!("Session gate ready on {}", server.bind_addr());

    server.start(shutdown_signal()).await?;

    info!("Session gate shutdown complete");
    Ok(())
}

async fn load_config() -> GateResult<GateConfig> {
    let config_path =
        std::env::var("GATE_CONFIG_PATH").unwrap_or_else(|_| "config/gate.yaml".to_string());

    if !Path::new(&config_path).exists() {
        // Logging is not up yet; this goes to stderr.
        eprintln!("config file {} not found, using defaults and environment", config_path);
        return GateConfig::from_env();
    }

    if config_path.ends_with(".json") {
        GateConfig::load_from_json(&config_path).await
    } else {
        GateConfig::load_from_file(&config_path).await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
