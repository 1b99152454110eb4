//! stratus daemon — reconciles declared cloud accounts against their
//! caching agents and serves the operational API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use stratus_core::config::Config;
use stratus_credentials::definition::StaticDefinitionSource;
use stratus_daemon::daemon::Daemon;
use tracing::{info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    stratus_telemetry::logging::init_logging("stratus-daemon", "info");

    info!(version = env!("CARGO_PKG_VERSION"), "stratus daemon starting");

    let config_path = config_path();
    let config = if config_path.exists() {
        Config::load_from(&config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?
    } else {
        warn!(
            path = %config_path.display(),
            "config file not found, starting with defaults and no accounts"
        );
        Config::default()
    };

    let daemon = if config_path.exists() {
        // Definitions are re-read from the file each cycle.
        Daemon::from_config_file(config, &config_path)?
    } else {
        let accounts = config.credentials.accounts.clone();
        Daemon::with_source(config, Arc::new(StaticDefinitionSource::new(accounts)))?
    };

    // Wire ctrl-c to trigger graceful shutdown.
    let shutdown = daemon.shutdown_handle();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, initiating shutdown");
        shutdown.trigger();
    });

    daemon.run().await
}

/// Config path: `$STRATUS_CONFIG` when set, else `~/.stratus/config.toml`.
fn config_path() -> PathBuf {
    match std::env::var("STRATUS_CONFIG") {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => Config::default_path(),
    }
}
