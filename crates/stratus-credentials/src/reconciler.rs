use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::credentials::AccountCredentials;
use crate::definition::{DefinitionSource, SourceError};
use crate::events::{EventBus, LifecycleEvent};
use crate::handler::CredentialsLifecycleHandler;
use crate::parser::AccountParser;
use crate::registry::CredentialsRegistry;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Cycle-level failures. Per-account problems never surface here; they are
/// isolated into the [`CycleReport`] and retried on the next tick.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("definition fetch failed: {0}")]
    Fetch(#[from] SourceError),
    #[error("definition fetch timed out after {0:?}")]
    FetchTimeout(Duration),
}

// ---------------------------------------------------------------------------
// CycleReport
// ---------------------------------------------------------------------------

/// Per-account failure recorded during a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct AccountFailure {
    pub account: String,
    pub cause: String,
}

/// Result of a single reconciliation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Monotonic cycle sequence number, starting at 1.
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Accounts whose agents were registered for the first time.
    pub added: Vec<String>,
    /// Accounts whose credentials changed and whose bundles were replaced.
    pub updated: Vec<String>,
    /// Accounts removed from the declaration and fully deregistered.
    pub deleted: Vec<String>,
    /// Accounts present and structurally identical; no events emitted.
    pub unchanged: Vec<String>,
    pub parse_failures: Vec<AccountFailure>,
    /// Lifecycle transitions that failed; their registry commits were
    /// withheld and will be retried next cycle.
    pub apply_failures: Vec<AccountFailure>,
}

impl CycleReport {
    fn new(cycle: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle,
            started_at,
            finished_at: started_at,
            added: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            unchanged: Vec::new(),
            parse_failures: Vec::new(),
            apply_failures: Vec::new(),
        }
    }

    /// Number of lifecycle events this cycle produced.
    pub fn event_count(&self) -> usize {
        self.added.len() + self.updated.len() + self.deleted.len()
    }

    /// True when the cycle changed nothing and reported no failures.
    pub fn is_noop(&self) -> bool {
        self.event_count() == 0 && self.parse_failures.is_empty() && self.apply_failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PARSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives one fetch → parse → diff → apply pass over the declared accounts.
///
/// Cycles are strictly serialized: an internal mutex guarantees a second
/// trigger (timer tick or manual sync) waits until the in-flight cycle has
/// finished committing. The reconciler is the single writer of its
/// [`CredentialsRegistry`].
pub struct Reconciler {
    source: Arc<dyn DefinitionSource>,
    parser: AccountParser,
    registry: Arc<CredentialsRegistry>,
    handler: Arc<dyn CredentialsLifecycleHandler>,
    events: EventBus,
    fetch_timeout: Duration,
    parse_timeout: Duration,
    cycle_guard: Mutex<()>,
    cycles_completed: AtomicU64,
    last_report: RwLock<Option<CycleReport>>,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn DefinitionSource>,
        parser: AccountParser,
        registry: Arc<CredentialsRegistry>,
        handler: Arc<dyn CredentialsLifecycleHandler>,
    ) -> Self {
        Self {
            source,
            parser,
            registry,
            handler,
            events: EventBus::new(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            parse_timeout: DEFAULT_PARSE_TIMEOUT,
            cycle_guard: Mutex::new(()),
            cycles_completed: AtomicU64::new(0),
            last_report: RwLock::new(None),
        }
    }

    /// Override the fetch and per-definition parse timeouts.
    pub fn with_timeouts(mut self, fetch: Duration, parse: Duration) -> Self {
        self.fetch_timeout = fetch;
        self.parse_timeout = parse;
        self
    }

    /// Subscribe to the lifecycle events this reconciler emits.
    pub fn subscribe(&self) -> flume::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> EventBus {
        self.events.clone()
    }

    /// Number of cycles that ran to completion (including no-op cycles).
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    /// Run one full reconciliation cycle.
    ///
    /// A fetch failure aborts the cycle with the registry untouched. All
    /// other failures are isolated per account and recorded in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport, ReconcileError> {
        let _serialized = self.cycle_guard.lock().await;
        let cycle = self.cycles_completed.load(Ordering::Relaxed) + 1;
        let mut report = CycleReport::new(cycle, Utc::now());
        debug!(cycle, "reconciliation cycle starting");

        // -- Fetch -------------------------------------------------------
        let definitions = match timeout(self.fetch_timeout, self.source.load_definitions()).await {
            Ok(Ok(definitions)) => definitions,
            Ok(Err(e)) => {
                warn!(cycle, error = %e, "definition fetch failed, cycle aborted");
                return Err(ReconcileError::Fetch(e));
            }
            Err(_) => {
                warn!(
                    cycle,
                    timeout_secs = self.fetch_timeout.as_secs(),
                    "definition fetch timed out, cycle aborted"
                );
                return Err(ReconcileError::FetchTimeout(self.fetch_timeout));
            }
        };

        // Duplicate names within one fetch: last occurrence wins.
        let mut deduped = BTreeMap::new();
        for definition in definitions {
            if let Some(shadowed) = deduped.insert(definition.name.clone(), definition) {
                warn!(
                    account = %shadowed.name,
                    "duplicate account definition in one fetch, keeping the later occurrence"
                );
            }
        }
        let defined_names: HashSet<String> = deduped.keys().cloned().collect();

        // -- Parse (isolated per definition) -----------------------------
        let mut parsed: BTreeMap<String, Arc<AccountCredentials>> = BTreeMap::new();
        for (name, definition) in &deduped {
            match timeout(self.parse_timeout, self.parser.parse(definition)).await {
                Ok(Ok(credentials)) => {
                    parsed.insert(name.clone(), credentials);
                }
                Ok(Err(e)) => {
                    warn!(account = %name, error = %e, "account definition failed to parse");
                    self.events.publish(LifecycleEvent::ParseFailure {
                        account: name.clone(),
                        cause: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    report.parse_failures.push(AccountFailure {
                        account: name.clone(),
                        cause: e.to_string(),
                    });
                }
                Err(_) => {
                    let cause = format!(
                        "parse timed out after {}s",
                        self.parse_timeout.as_secs()
                    );
                    warn!(account = %name, cause = %cause, "account definition failed to parse");
                    self.events.publish(LifecycleEvent::ParseFailure {
                        account: name.clone(),
                        cause: cause.clone(),
                        timestamp: Utc::now(),
                    });
                    report
                        .parse_failures
                        .push(AccountFailure { account: name.clone(), cause });
                }
            }
        }

        // -- Diff --------------------------------------------------------
        let previous = self.registry.snapshot().await;

        // Deleted means "gone from the declaration", never "failed to
        // parse": a parse failure keeps the last-known-good entry alive.
        let mut deleted: Vec<String> = previous
            .keys()
            .filter(|name| !defined_names.contains(*name))
            .cloned()
            .collect();
        deleted.sort();

        let mut added: Vec<(String, Arc<AccountCredentials>)> = Vec::new();
        let mut updated: Vec<(String, Arc<AccountCredentials>)> = Vec::new();
        for (name, credentials) in &parsed {
            match previous.get(name) {
                None => added.push((name.clone(), credentials.clone())),
                Some(existing) if existing.as_ref() != credentials.as_ref() => {
                    updated.push((name.clone(), credentials.clone()));
                }
                Some(_) => report.unchanged.push(name.clone()),
            }
        }

        // -- Apply: deletes, then updates, then adds ---------------------
        // This ordering is what keeps any account from ever being
        // represented by two live bundles at once.
        for name in deleted {
            match self.handler.on_deleted(&name).await {
                Ok(()) => {
                    self.registry.remove(&name).await;
                    info!(account = %name, "account deleted");
                    self.events.publish(LifecycleEvent::AccountDeleted {
                        account: name.clone(),
                        timestamp: Utc::now(),
                    });
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!(account = %name, error = %e, "delete transition failed, retrying next cycle");
                    report.apply_failures.push(AccountFailure {
                        account: name,
                        cause: e.to_string(),
                    });
                }
            }
        }

        for (name, credentials) in updated {
            match self.handler.on_updated(&credentials).await {
                Ok(()) => {
                    self.registry.commit(credentials).await;
                    info!(account = %name, "account updated");
                    self.events.publish(LifecycleEvent::AccountUpdated {
                        account: name.clone(),
                        timestamp: Utc::now(),
                    });
                    report.updated.push(name);
                }
                Err(e) => {
                    warn!(account = %name, error = %e, "update transition failed, commit withheld");
                    report.apply_failures.push(AccountFailure {
                        account: name,
                        cause: e.to_string(),
                    });
                }
            }
        }

        for (name, credentials) in added {
            match self.handler.on_added(&credentials).await {
                Ok(()) => {
                    self.registry.commit(credentials).await;
                    info!(account = %name, "account added");
                    self.events.publish(LifecycleEvent::AccountAdded {
                        account: name.clone(),
                        timestamp: Utc::now(),
                    });
                    report.added.push(name);
                }
                Err(e) => {
                    warn!(account = %name, error = %e, "add transition failed, commit withheld");
                    report.apply_failures.push(AccountFailure {
                        account: name,
                        cause: e.to_string(),
                    });
                }
            }
        }

        // -- Report ------------------------------------------------------
        report.finished_at = Utc::now();
        self.events.publish(LifecycleEvent::CycleCompleted {
            added: report.added.len(),
            updated: report.updated.len(),
            deleted: report.deleted.len(),
            unchanged: report.unchanged.len(),
            parse_failures: report.parse_failures.len(),
            apply_failures: report.apply_failures.len(),
            timestamp: report.finished_at,
        });
        info!(
            cycle,
            added = report.added.len(),
            updated = report.updated.len(),
            deleted = report.deleted.len(),
            unchanged = report.unchanged.len(),
            parse_failures = report.parse_failures.len(),
            apply_failures = report.apply_failures.len(),
            "reconciliation cycle completed"
        );

        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
