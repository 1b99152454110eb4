use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use stratus_agents::agent::AgentContext;
use stratus_agents::api::HttpInventoryApi;
use stratus_agents::catalog::AgentCatalog;
use stratus_agents::lifecycle::AgentLifecycleHandler;
use stratus_agents::registry::AgentRegistry;
use stratus_agents::store::{InventoryStore, MemoryInventory};
use stratus_core::config::Config;
use stratus_credentials::definition::{ConfigDefinitionSource, DefinitionSource};
use stratus_credentials::naming::NamerRegistry;
use stratus_credentials::parser::{AccountParser, FileContentResolver};
use stratus_credentials::reconciler::Reconciler;
use stratus_credentials::registry::CredentialsRegistry;
use tracing::{error, info, warn};

use crate::http::{api_router, ApiState};
use crate::shutdown::ShutdownSignal;

// ---------------------------------------------------------------------------
// DaemonIntervals
// ---------------------------------------------------------------------------

/// Configuration for daemon loop intervals.
#[derive(Debug, Clone)]
pub struct DaemonIntervals {
    /// How often a reconciliation cycle runs (default: 60s).
    pub reconcile_secs: u64,
    /// How often operational stats are logged (default: 300s).
    pub stats_secs: u64,
}

impl Default for DaemonIntervals {
    fn default() -> Self {
        Self {
            reconcile_secs: 60,
            stats_secs: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// The stratus background daemon.
///
/// Owns the credentials and agent registries, drives the reconciler on a
/// fixed interval (or on a manual sync trigger), and serves the
/// operational HTTP API. Shuts down gracefully when the `ShutdownSignal`
/// is triggered; the in-flight cycle finishes committing first.
pub struct Daemon {
    config: Config,
    reconciler: Arc<Reconciler>,
    credentials: Arc<CredentialsRegistry>,
    agents: Arc<AgentRegistry>,
    inventory: Arc<MemoryInventory>,
    intervals: DaemonIntervals,
    shutdown: ShutdownSignal,
    sync_tx: flume::Sender<()>,
    sync_rx: flume::Receiver<()>,
}

impl Daemon {
    /// Build a daemon around an explicit definition source.
    pub fn with_source(config: Config, source: Arc<dyn DefinitionSource>) -> Result<Self> {
        let credentials = Arc::new(CredentialsRegistry::new());
        let inventory = Arc::new(MemoryInventory::new());

        let api = HttpInventoryApi::new(
            &config.provider.base_url,
            &config.general.application_name,
            Duration::from_secs(config.provider.request_timeout_secs),
        )
        .context("failed to build inventory API client")?;
        let context = AgentContext::new(
            &config.general.application_name,
            Arc::new(api),
            inventory.clone() as Arc<dyn InventoryStore>,
        );

        let agents = Arc::new(AgentRegistry::new(Duration::from_secs(
            config.agents.poll_interval_secs,
        )));
        let handler = Arc::new(AgentLifecycleHandler::new(
            AgentCatalog::new(config.agents.clone()),
            agents.clone(),
            context,
        ));

        let parser = AccountParser::new(
            Arc::new(FileContentResolver),
            Arc::new(NamerRegistry::new()),
            config.credentials.default_regions.clone(),
        );
        let reconciler = Arc::new(
            Reconciler::new(source, parser, credentials.clone(), handler).with_timeouts(
                Duration::from_secs(config.credentials.fetch_timeout_secs),
                Duration::from_secs(config.credentials.parse_timeout_secs),
            ),
        );

        let intervals = DaemonIntervals {
            reconcile_secs: config.credentials.sync_interval_secs,
            stats_secs: config.daemon.stats_interval_secs,
        };
        let (sync_tx, sync_rx) = flume::bounded(1);

        Ok(Self {
            config,
            reconciler,
            credentials,
            agents,
            inventory,
            intervals,
            shutdown: ShutdownSignal::new(),
            sync_tx,
            sync_rx,
        })
    }

    /// Build a daemon whose definitions are re-read from `config_path` on
    /// every cycle.
    pub fn from_config_file(config: Config, config_path: impl Into<PathBuf>) -> Result<Self> {
        let source = Arc::new(ConfigDefinitionSource::new(config_path));
        Self::with_source(config, source)
    }

    /// Override the default loop intervals.
    pub fn set_intervals(&mut self, intervals: DaemonIntervals) {
        self.intervals = intervals;
    }

    /// Returns a handle that can be used to trigger shutdown from another task.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Send the shutdown signal.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Returns a sender that schedules an immediate reconciliation cycle.
    pub fn sync_handle(&self) -> flume::Sender<()> {
        self.sync_tx.clone()
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn api_state(&self) -> Arc<ApiState> {
        Arc::new(ApiState {
            reconciler: self.reconciler.clone(),
            credentials: self.credentials.clone(),
            agents: self.agents.clone(),
            inventory: self.inventory.clone(),
            sync_tx: self.sync_tx.clone(),
        })
    }

    /// Run the daemon (blocking) on the host/port from config.
    pub async fn run(&self) -> Result<()> {
        let bind_addr = format!("{}:{}", self.config.daemon.host, self.config.daemon.port);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind {bind_addr}"))?;
        self.run_with_listener(listener).await
    }

    /// Run the daemon using a pre-bound listener (blocking).
    ///
    /// The caller may bind to port 0 for an OS-assigned port, which is how
    /// tests avoid collisions.
    pub async fn run_with_listener(&self, listener: tokio::net::TcpListener) -> Result<()> {
        let bind_addr = listener.local_addr()?;
        let router = api_router(self.api_state());
        let api_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "API server error");
            }
        });
        info!(%bind_addr, "operational API listening");

        info!(
            reconcile_secs = self.intervals.reconcile_secs,
            stats_secs = self.intervals.stats_secs,
            "daemon starting driver loop"
        );

        // Initial cycle so declared accounts come up without waiting a tick.
        self.run_cycle_logged().await;

        let mut reconcile_interval =
            tokio::time::interval(Duration::from_secs(self.intervals.reconcile_secs));
        let mut stats_interval =
            tokio::time::interval(Duration::from_secs(self.intervals.stats_secs));

        // Consume the first immediate tick so loops don't all fire at t=0.
        reconcile_interval.tick().await;
        stats_interval.tick().await;

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = reconcile_interval.tick() => {
                    self.run_cycle_logged().await;
                }
                result = self.sync_rx.recv_async() => {
                    match result {
                        Ok(()) => {
                            info!("manual sync requested");
                            self.run_cycle_logged().await;
                        }
                        Err(_) => {
                            warn!("sync channel closed");
                        }
                    }
                }
                _ = stats_interval.tick() => {
                    let accounts = self.credentials.len().await;
                    info!(
                        accounts,
                        agents = self.agents.agent_count(),
                        inventory_documents = self.inventory.document_count(),
                        cycles = self.reconciler.cycles_completed(),
                        "daemon stats"
                    );
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received, stopping driver loop");
                    break;
                }
            }
        }

        self.agents.stop_all();
        api_handle.abort();
        info!("daemon stopped");
        Ok(())
    }

    async fn run_cycle_logged(&self) {
        match self.reconciler.run_cycle().await {
            Ok(report) => {
                if !report.is_noop() {
                    info!(
                        cycle = report.cycle,
                        added = report.added.len(),
                        updated = report.updated.len(),
                        deleted = report.deleted.len(),
                        parse_failures = report.parse_failures.len(),
                        apply_failures = report.apply_failures.len(),
                        "reconciliation applied changes"
                    );
                }
            }
            Err(e) => {
                error!(error = %e, "reconciliation cycle failed, will retry next tick");
            }
        }
    }
}
