//! End-to-end lifecycle coverage: a reconciler driving the real agent
//! lifecycle handler, agent registry, and in-memory inventory store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use stratus_agents::agent::AgentContext;
use stratus_agents::api::{ApiError, InventoryApi};
use stratus_agents::catalog::AgentCatalog;
use stratus_agents::lifecycle::AgentLifecycleHandler;
use stratus_agents::registry::AgentRegistry;
use stratus_agents::store::{InventoryStore, MemoryInventory};
use stratus_core::config::{AccountDefinition, AgentsConfig};
use stratus_core::types::AgentCategory;
use stratus_credentials::definition::StaticDefinitionSource;
use stratus_credentials::naming::NamerRegistry;
use stratus_credentials::parser::{AccountParser, ContentResolver, ResolveError};
use stratus_credentials::reconciler::Reconciler;
use stratus_credentials::registry::CredentialsRegistry;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct MapResolver {
    contents: HashMap<String, Vec<u8>>,
}

#[async_trait::async_trait]
impl ContentResolver for MapResolver {
    async fn resolve(&self, path: &str) -> Result<Vec<u8>, ResolveError> {
        self.contents
            .get(path)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(path.to_string()))
    }
}

/// Provider fake: every category lists one document.
struct SingleDocApi;

#[async_trait::async_trait]
impl InventoryApi for SingleDocApi {
    async fn list(
        &self,
        project: &str,
        category: AgentCategory,
        region: Option<&str>,
    ) -> Result<Vec<Value>, ApiError> {
        Ok(vec![serde_json::json!({
            "project": project,
            "category": category.as_str(),
            "region": region,
        })])
    }
}

fn definition(name: &str, project: &str) -> AccountDefinition {
    let mut def = AccountDefinition::new(name, project);
    def.json_key_path = Some("/keys/test.json".into());
    def
}

struct Harness {
    source: Arc<StaticDefinitionSource>,
    credentials: Arc<CredentialsRegistry>,
    agents: Arc<AgentRegistry>,
    store: Arc<MemoryInventory>,
    reconciler: Reconciler,
}

fn harness(initial: Vec<AccountDefinition>, agents_config: AgentsConfig) -> Harness {
    let source = Arc::new(StaticDefinitionSource::new(initial));
    let credentials = Arc::new(CredentialsRegistry::new());
    let store = Arc::new(MemoryInventory::new());
    // Long poll interval: registration still triggers the immediate first
    // load, but no periodic churn during a test.
    let agents = Arc::new(AgentRegistry::new(Duration::from_secs(3600)));

    let context = AgentContext::new(
        "stratus-test",
        Arc::new(SingleDocApi),
        store.clone() as Arc<dyn InventoryStore>,
    );
    let handler = Arc::new(AgentLifecycleHandler::new(
        AgentCatalog::new(agents_config),
        agents.clone(),
        context,
    ));

    let mut contents = HashMap::new();
    contents.insert(
        "/keys/test.json".to_string(),
        br#"{"project_id":"test"}"#.to_vec(),
    );
    let parser = AccountParser::new(
        Arc::new(MapResolver { contents }),
        Arc::new(NamerRegistry::new()),
        vec!["us-central1".into()],
    );

    let reconciler = Reconciler::new(source.clone(), parser, credentials.clone(), handler);
    Harness {
        source,
        credentials,
        agents,
        store,
        reconciler,
    }
}

/// Every account in the credentials registry has exactly its bundle live,
/// and no other account has any agents.
async fn assert_no_gap_at_rest(h: &Harness, expected_bundle_sizes: &[(&str, usize)]) {
    let mut names = h.credentials.names().await;
    names.sort();
    let mut expected_names: Vec<String> = expected_bundle_sizes
        .iter()
        .map(|(n, _)| n.to_string())
        .collect();
    expected_names.sort();
    assert_eq!(names, expected_names);

    let mut registered = h.agents.account_names();
    registered.sort();
    assert_eq!(registered, expected_names);

    for (account, size) in expected_bundle_sizes {
        assert_eq!(
            h.agents.agents_for(account).len(),
            *size,
            "bundle size for {account}"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// Default config + one default region: 8 global agents + 1 subnet agent.
const FULL_BUNDLE: usize = 9;

#[tokio::test]
async fn added_account_gets_exactly_one_bundle() {
    let h = harness(vec![definition("acct1", "p1")], AgentsConfig::default());
    h.reconciler.run_cycle().await.unwrap();
    assert_no_gap_at_rest(&h, &[("acct1", FULL_BUNDLE)]).await;

    let ids = h.agents.agents_for("acct1");
    let subnet: Vec<_> = ids
        .iter()
        .filter(|id| id.category == AgentCategory::Subnet)
        .collect();
    assert_eq!(subnet.len(), 1);
    assert_eq!(subnet[0].region.as_deref(), Some("us-central1"));
}

#[tokio::test]
async fn second_cycle_leaves_agents_untouched() {
    let h = harness(vec![definition("acct1", "p1")], AgentsConfig::default());
    h.reconciler.run_cycle().await.unwrap();
    let before = h.agents.agents_for("acct1");

    let report = h.reconciler.run_cycle().await.unwrap();
    assert!(report.is_noop());
    assert_eq!(h.agents.agents_for("acct1"), before);
}

#[tokio::test]
async fn update_swaps_bundle_without_doubling() {
    let h = harness(vec![definition("acct1", "p1")], AgentsConfig::default());
    h.reconciler.run_cycle().await.unwrap();

    h.source.set(vec![definition("acct1", "p2")]).await;
    let report = h.reconciler.run_cycle().await.unwrap();

    assert_eq!(report.updated, vec!["acct1"]);
    assert_no_gap_at_rest(&h, &[("acct1", FULL_BUNDLE)]).await;
    assert_eq!(h.credentials.get("acct1").await.unwrap().project, "p2");
}

#[tokio::test]
async fn delete_removes_every_agent_and_bucket() {
    let h = harness(vec![definition("acct1", "p1")], AgentsConfig::default());
    h.reconciler.run_cycle().await.unwrap();

    // Let the initial loads land so the store has something to purge.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.store.document_count() > 0);

    h.source.set(Vec::new()).await;
    let report = h.reconciler.run_cycle().await.unwrap();

    assert_eq!(report.deleted, vec!["acct1"]);
    assert_no_gap_at_rest(&h, &[]).await;
    assert_eq!(h.store.document_count(), 0);
}

#[tokio::test]
async fn parse_failure_keeps_existing_agents_running() {
    let h = harness(vec![definition("acct1", "p1")], AgentsConfig::default());
    h.reconciler.run_cycle().await.unwrap();

    let mut broken = definition("acct1", "p1");
    broken.json_key_path = Some("/missing".into());
    h.source.set(vec![broken]).await;
    let report = h.reconciler.run_cycle().await.unwrap();

    assert_eq!(report.parse_failures.len(), 1);
    assert_no_gap_at_rest(&h, &[("acct1", FULL_BUNDLE)]).await;
}

#[tokio::test]
async fn broken_account_does_not_block_healthy_ones() {
    let mut broken = definition("acct2", "p2");
    broken.json_key_path = Some("/missing".into());
    let h = harness(
        vec![definition("acct1", "p1"), broken],
        AgentsConfig::default(),
    );
    h.reconciler.run_cycle().await.unwrap();

    assert_no_gap_at_rest(&h, &[("acct1", FULL_BUNDLE)]).await;
}

#[tokio::test]
async fn disabled_categories_shrink_the_bundle() {
    let mut config = AgentsConfig::default();
    config.categories.subnet = false;
    config.categories.image = false;
    config.categories.certificate = false;
    let h = harness(vec![definition("acct1", "p1")], config);
    h.reconciler.run_cycle().await.unwrap();

    assert_no_gap_at_rest(&h, &[("acct1", 6)]).await;
    let ids = h.agents.agents_for("acct1");
    assert!(ids.iter().all(|id| id.category != AgentCategory::Subnet));
}

#[tokio::test]
async fn multiple_regions_fan_out_subnet_agents() {
    let mut def = definition("acct1", "p1");
    def.regions = vec!["us-east1".into(), "europe-west1".into()];
    let h = harness(vec![def], AgentsConfig::default());
    h.reconciler.run_cycle().await.unwrap();

    // 8 global + 2 regional subnet agents.
    assert_no_gap_at_rest(&h, &[("acct1", 10)]).await;
}

#[tokio::test]
async fn initial_load_populates_inventory() {
    let h = harness(vec![definition("acct1", "p1")], AgentsConfig::default());
    h.reconciler.run_cycle().await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    // One document per agent (the fake lists one per category).
    assert_eq!(h.store.document_count(), FULL_BUNDLE);
}

#[tokio::test]
async fn mixed_transition_batch_settles_correctly() {
    let h = harness(
        vec![definition("keep", "p1"), definition("drop", "p1")],
        AgentsConfig::default(),
    );
    h.reconciler.run_cycle().await.unwrap();

    h.source
        .set(vec![definition("keep", "p2"), definition("fresh", "p1")])
        .await;
    let report = h.reconciler.run_cycle().await.unwrap();

    assert_eq!(report.deleted, vec!["drop"]);
    assert_eq!(report.updated, vec!["keep"]);
    assert_eq!(report.added, vec!["fresh"]);
    assert_no_gap_at_rest(&h, &[("keep", FULL_BUNDLE), ("fresh", FULL_BUNDLE)]).await;
}
