use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use stratus_agents::registry::AgentRegistry;
use stratus_agents::store::{InventoryStore, MemoryInventory};
use stratus_credentials::reconciler::{CycleReport, Reconciler};
use stratus_credentials::registry::CredentialsRegistry;
use tracing::debug;

// ---------------------------------------------------------------------------
// ApiState
// ---------------------------------------------------------------------------

/// Shared state behind the operational HTTP API.
pub struct ApiState {
    pub reconciler: Arc<Reconciler>,
    pub credentials: Arc<CredentialsRegistry>,
    pub agents: Arc<AgentRegistry>,
    pub inventory: Arc<MemoryInventory>,
    /// Hands a manual-sync request to the daemon's serialized driver loop.
    pub sync_tx: flume::Sender<()>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn api_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(get_status))
        .route("/accounts", get(list_accounts))
        .route("/sync", post(trigger_sync))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    cycles_completed: u64,
    accounts: usize,
    agents: usize,
    inventory_documents: usize,
    last_cycle: Option<CycleReport>,
}

async fn get_status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        cycles_completed: state.reconciler.cycles_completed(),
        accounts: state.credentials.len().await,
        agents: state.agents.agent_count(),
        inventory_documents: state.inventory.document_count(),
        last_cycle: state.reconciler.last_report().await,
    })
}

#[derive(Debug, Serialize)]
struct AccountSummary {
    name: String,
    project: String,
    environment: String,
    account_type: String,
    regions: Vec<String>,
    naming_strategy: String,
    agents: usize,
}

async fn list_accounts(State(state): State<Arc<ApiState>>) -> Json<Vec<AccountSummary>> {
    let mut summaries: Vec<AccountSummary> = state
        .credentials
        .snapshot()
        .await
        .values()
        .map(|credentials| AccountSummary {
            name: credentials.name.clone(),
            project: credentials.project.clone(),
            environment: credentials.environment.clone(),
            account_type: credentials.account_type.clone(),
            regions: credentials.regions.clone(),
            naming_strategy: credentials.namer_id().to_string(),
            agents: state.agents.agents_for(&credentials.name).len(),
        })
        .collect();
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    Json(summaries)
}

/// Schedule an immediate reconciliation cycle.
///
/// The request only enqueues the trigger; the driver loop runs the cycle
/// under the same serialization rule as the timer.
async fn trigger_sync(
    State(state): State<Arc<ApiState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.sync_tx.try_send(()) {
        Ok(()) => {
            debug!("manual sync scheduled");
            (StatusCode::ACCEPTED, Json(json!({ "status": "scheduled" })))
        }
        Err(flume::TrySendError::Full(_)) => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "already scheduled" })),
        ),
        Err(flume::TrySendError::Disconnected(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "driver loop is not running" })),
        ),
    }
}
