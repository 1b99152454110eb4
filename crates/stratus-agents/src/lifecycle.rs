use std::sync::Arc;

use stratus_credentials::credentials::AccountCredentials;
use stratus_credentials::handler::{CredentialsLifecycleHandler, LifecycleError};
use tracing::info;

use crate::agent::AgentContext;
use crate::catalog::AgentCatalog;
use crate::registry::AgentRegistry;
use crate::store::InventoryStore;

// ---------------------------------------------------------------------------
// AgentLifecycleHandler
// ---------------------------------------------------------------------------

/// Translates account lifecycle transitions into agent registrations.
///
/// An update is remove-then-add: the old bundle is fully deregistered
/// before the fresh one is registered, so the account is never represented
/// by two live bundles. The gap between the two steps is a brief window of
/// stale inventory, which is the accepted trade-off.
pub struct AgentLifecycleHandler {
    catalog: AgentCatalog,
    registry: Arc<AgentRegistry>,
    context: AgentContext,
}

impl AgentLifecycleHandler {
    pub fn new(catalog: AgentCatalog, registry: Arc<AgentRegistry>, context: AgentContext) -> Self {
        Self {
            catalog,
            registry,
            context,
        }
    }

    fn register_bundle(
        &self,
        credentials: &Arc<AccountCredentials>,
    ) -> Result<usize, LifecycleError> {
        let bundle = self.catalog.build_bundle(credentials, &self.context);
        self.registry
            .add(&credentials.name, bundle)
            .map_err(|e| LifecycleError::Registration {
                account: credentials.name.clone(),
                cause: e.to_string(),
            })
    }
}

#[async_trait::async_trait]
impl CredentialsLifecycleHandler for AgentLifecycleHandler {
    async fn on_added(&self, credentials: &Arc<AccountCredentials>) -> Result<(), LifecycleError> {
        let registered = self.register_bundle(credentials)?;
        info!(
            account = %credentials.name,
            agents = registered,
            "caching agents started for new account"
        );
        Ok(())
    }

    async fn on_updated(
        &self,
        credentials: &Arc<AccountCredentials>,
    ) -> Result<(), LifecycleError> {
        let removed = self.registry.remove_for_account(&credentials.name);
        let registered = self.register_bundle(credentials)?;
        info!(
            account = %credentials.name,
            removed = removed.len(),
            registered,
            "caching agents replaced for updated account"
        );
        Ok(())
    }

    async fn on_deleted(&self, name: &str) -> Result<(), LifecycleError> {
        let removed = self.registry.remove_for_account(name);
        let purged = self.context.store.purge_account(name);
        info!(
            account = %name,
            agents = removed.len(),
            inventory_buckets = purged,
            "caching agents removed for deleted account"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::StubApi;
    use crate::store::MemoryInventory;
    use crate::testing::credentials_fixture;
    use std::time::Duration;
    use stratus_core::config::AgentsConfig;

    fn handler() -> (AgentLifecycleHandler, Arc<AgentRegistry>, Arc<MemoryInventory>) {
        let registry = Arc::new(AgentRegistry::new(Duration::from_secs(3600)));
        let store = Arc::new(MemoryInventory::new());
        let context = AgentContext::new(
            "stratus-test",
            Arc::new(StubApi::with_documents(1)),
            store.clone() as Arc<dyn InventoryStore>,
        );
        let handler = AgentLifecycleHandler::new(
            AgentCatalog::new(AgentsConfig::default()),
            registry.clone(),
            context,
        );
        (handler, registry, store)
    }

    #[tokio::test]
    async fn added_registers_the_full_bundle() {
        let (handler, registry, _) = handler();
        let creds = credentials_fixture("acct1", "p1", &["us-east1"]);
        handler.on_added(&creds).await.unwrap();
        // 8 global categories + 1 subnet region.
        assert_eq!(registry.agents_for("acct1").len(), 9);
    }

    #[tokio::test]
    async fn updated_replaces_the_bundle_exactly_once() {
        let (handler, registry, _) = handler();
        let creds = credentials_fixture("acct1", "p1", &["us-east1"]);
        handler.on_added(&creds).await.unwrap();

        let updated = credentials_fixture("acct1", "p2", &["us-east1", "us-west1"]);
        handler.on_updated(&updated).await.unwrap();

        let ids = registry.agents_for("acct1");
        assert_eq!(ids.len(), 10, "old bundle must be gone, new fully present");
        assert_eq!(registry.account_names().len(), 1);
    }

    #[tokio::test]
    async fn deleted_removes_agents_and_purges_inventory() {
        let (handler, registry, store) = handler();
        let creds = credentials_fixture("acct1", "p1", &[]);
        handler.on_added(&creds).await.unwrap();

        // Simulate a previous load having cached something.
        store.put(
            &crate::agent::AgentId::global("acct1", stratus_core::types::AgentCategory::Network),
            vec![serde_json::json!({"name": "vpc"})],
        );

        handler.on_deleted("acct1").await.unwrap();
        assert!(registry.agents_for("acct1").is_empty());
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn deleted_unknown_account_is_quiet() {
        let (handler, registry, _) = handler();
        handler.on_deleted("ghost").await.unwrap();
        assert_eq!(registry.agent_count(), 0);
    }
}
