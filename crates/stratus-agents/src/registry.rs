use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{AgentId, CachingAgent};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("agent `{agent}` does not belong to account `{account}`")]
    AccountMismatch { account: String, agent: String },
}

// ---------------------------------------------------------------------------
// RegisteredAgent — internal bookkeeping
// ---------------------------------------------------------------------------

struct RegisteredAgent {
    agent: Arc<dyn CachingAgent>,
    instance: Uuid,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// AgentRegistry
// ---------------------------------------------------------------------------

/// Holds the currently running caching agents, keyed by account name.
///
/// Each registered agent runs its own poll loop as a spawned task; removal
/// signals the loop to stop cooperatively. Buckets lock independently, so
/// reads (status queries, other accounts' transitions) proceed while one
/// account is being mutated. The reconciler is the only writer per account
/// at any moment; that ordering is enforced upstream.
pub struct AgentRegistry {
    accounts: DashMap<String, Vec<RegisteredAgent>>,
    poll_interval: Duration,
}

impl AgentRegistry {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            accounts: DashMap::new(),
            poll_interval,
        }
    }

    /// Register a batch of agents under one account and start their loops.
    ///
    /// An agent whose identity is already registered for this account is
    /// skipped (idempotent re-registration). An agent built for a
    /// *different* account rejects the whole batch before anything is
    /// mutated. Returns the number of agents actually started.
    pub fn add(
        &self,
        account: &str,
        agents: Vec<Arc<dyn CachingAgent>>,
    ) -> Result<usize, RegistryError> {
        if let Some(stray) = agents.iter().find(|a| a.id().account != account) {
            return Err(RegistryError::AccountMismatch {
                account: account.to_string(),
                agent: stray.id().to_string(),
            });
        }

        let mut bucket = self.accounts.entry(account.to_string()).or_default();
        let mut started = 0;
        for agent in agents {
            if bucket.iter().any(|existing| existing.agent.id() == agent.id()) {
                warn!(agent = %agent.id(), "agent already registered, skipping duplicate");
                continue;
            }
            let (stop_tx, stop_rx) = watch::channel(false);
            let task = spawn_agent_loop(agent.clone(), self.poll_interval, stop_rx);
            bucket.push(RegisteredAgent {
                agent,
                instance: Uuid::new_v4(),
                stop: stop_tx,
                task,
            });
            started += 1;
        }
        info!(account = %account, agents = started, "agents registered");
        Ok(started)
    }

    /// Atomically remove every agent registered under `account`, stopping
    /// their loops. Returns the removed identities; an unknown account is a
    /// no-op, not an error.
    pub fn remove_for_account(&self, account: &str) -> Vec<AgentId> {
        let Some((_, bucket)) = self.accounts.remove(account) else {
            return Vec::new();
        };
        let mut removed = Vec::with_capacity(bucket.len());
        for registered in bucket {
            let _ = registered.stop.send(true);
            // A loop that has not been polled yet would otherwise still run
            // its first refresh after removal.
            registered.task.abort();
            debug!(
                agent = %registered.agent.id(),
                instance = %registered.instance,
                "agent stopped"
            );
            removed.push(registered.agent.id().clone());
        }
        info!(account = %account, agents = removed.len(), "agents deregistered");
        removed
    }

    /// Identities currently registered for one account.
    pub fn agents_for(&self, account: &str) -> Vec<AgentId> {
        self.accounts
            .get(account)
            .map(|bucket| bucket.iter().map(|r| r.agent.id().clone()).collect())
            .unwrap_or_default()
    }

    pub fn account_names(&self) -> Vec<String> {
        self.accounts.iter().map(|e| e.key().clone()).collect()
    }

    pub fn has_account(&self, account: &str) -> bool {
        self.accounts.contains_key(account)
    }

    /// Total number of registered agents across all accounts.
    pub fn agent_count(&self) -> usize {
        self.accounts.iter().map(|e| e.value().len()).sum()
    }

    /// Signal every agent loop to stop without deregistering anything.
    /// Used on process shutdown.
    pub fn stop_all(&self) {
        let mut stopped = 0;
        for bucket in self.accounts.iter() {
            for registered in bucket.value() {
                let _ = registered.stop.send(true);
                stopped += 1;
            }
        }
        info!(agents = stopped, "all agent loops signalled to stop");
    }
}

/// Drive one agent's refresh loop until its stop signal fires.
///
/// The first refresh happens immediately on registration; a stop signal
/// also cancels a refresh that is still in flight.
fn spawn_agent_loop(
    agent: Arc<dyn CachingAgent>,
    poll_interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = stop_rx.changed() => break,
                result = agent.load() => {
                    if let Err(e) = result {
                        warn!(agent = %agent.id(), error = %e, "inventory load failed");
                    }
                }
            }
        }
        debug!(agent = %agent.id(), "agent loop exited");
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
