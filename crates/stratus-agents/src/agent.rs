use std::sync::Arc;

use serde::Serialize;
use stratus_core::types::AgentCategory;
use stratus_credentials::credentials::AccountCredentials;
use tracing::debug;

use crate::api::{ApiError, InventoryApi};
use crate::store::InventoryStore;

// ---------------------------------------------------------------------------
// AgentId
// ---------------------------------------------------------------------------

/// Identity of one caching agent: the account it belongs to, the inventory
/// category it caches, and — for regional categories — the region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AgentId {
    pub account: String,
    pub category: AgentCategory,
    pub region: Option<String>,
}

impl AgentId {
    pub fn global(account: impl Into<String>, category: AgentCategory) -> Self {
        Self {
            account: account.into(),
            category,
            region: None,
        }
    }

    pub fn regional(
        account: impl Into<String>,
        category: AgentCategory,
        region: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            category,
            region: Some(region.into()),
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}/{}/{}", self.account, self.category, region),
            None => write!(f, "{}/{}", self.account, self.category),
        }
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("provider request failed: {0}")]
    Provider(#[from] ApiError),
}

// ---------------------------------------------------------------------------
// CachingAgent trait
// ---------------------------------------------------------------------------

/// One background worker caching one inventory category for one account.
///
/// The agent's only obligations to the lifecycle core are a stable identity
/// and a `load` operation the registry can drive on its own schedule. What
/// a load actually talks to is behind the [`InventoryApi`] boundary.
#[async_trait::async_trait]
pub trait CachingAgent: Send + Sync {
    fn id(&self) -> &AgentId;

    /// Refresh this agent's slice of the inventory cache.
    /// Returns the number of documents cached.
    async fn load(&self) -> Result<usize, AgentError>;
}

// ---------------------------------------------------------------------------
// AgentContext — shared collaborators every agent is built with
// ---------------------------------------------------------------------------

/// The collaborators an agent needs besides its account credentials: the
/// provider API client and the shared inventory store, plus the user-agent
/// string sent on provider calls.
#[derive(Clone)]
pub struct AgentContext {
    pub application_name: String,
    pub api: Arc<dyn InventoryApi>,
    pub store: Arc<dyn InventoryStore>,
}

impl AgentContext {
    pub fn new(
        application_name: impl Into<String>,
        api: Arc<dyn InventoryApi>,
        store: Arc<dyn InventoryStore>,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            api,
            store,
        }
    }
}

// ---------------------------------------------------------------------------
// InventoryCachingAgent
// ---------------------------------------------------------------------------

/// The standard caching agent: lists one category from the provider API and
/// replaces that category's bucket in the shared store.
///
/// One instance exists per enabled category (and per region for regional
/// categories) of every account; the agent holds the account's credentials
/// for the duration of its registration.
pub struct InventoryCachingAgent {
    id: AgentId,
    credentials: Arc<AccountCredentials>,
    api: Arc<dyn InventoryApi>,
    store: Arc<dyn InventoryStore>,
}

impl InventoryCachingAgent {
    pub fn new(id: AgentId, credentials: Arc<AccountCredentials>, context: &AgentContext) -> Self {
        Self {
            id,
            credentials,
            api: context.api.clone(),
            store: context.store.clone(),
        }
    }
}

#[async_trait::async_trait]
impl CachingAgent for InventoryCachingAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    async fn load(&self) -> Result<usize, AgentError> {
        let documents = self
            .api
            .list(
                &self.credentials.project,
                self.id.category,
                self.id.region.as_deref(),
            )
            .await?;
        let count = documents.len();
        self.store.put(&self.id, documents);
        debug!(agent = %self.id, documents = count, "inventory refreshed");
        Ok(count)
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

    #[test]
    fn agent_id_display() {
        let global = AgentId::global("acct1", AgentCategory::Network);
        assert_eq!(global.to_string(), "acct1/network");
        let regional = AgentId::regional("acct1", AgentCategory::Subnet, "us-east1");
        assert_eq!(regional.to_string(), "acct1/subnet/us-east1");
    }

    #[tokio::test]
    async fn load_writes_into_the_store() {
        let api = Arc::new(StubApi::with_documents(3));
        let store = Arc::new(MemoryInventory::new());
        let context = AgentContext::new(
            "stratus-test",
            api.clone(),
            store.clone() as Arc<dyn InventoryStore>,
        );
        let creds = credentials_fixture("acct1", "p1", &["us-east1"]);
        let id = AgentId::global("acct1", AgentCategory::Instance);
        let agent = InventoryCachingAgent::new(id.clone(), creds, &context);

        let count = agent.load().await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(api.calls(), 1);
        assert_eq!(store.get(&id).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn load_surfaces_provider_failures() {
        let api = Arc::new(StubApi::failing());
        let store = Arc::new(MemoryInventory::new());
        let context = AgentContext::new(
            "stratus-test",
            api,
            store.clone() as Arc<dyn InventoryStore>,
        );
        let creds = credentials_fixture("acct1", "p1", &[]);
        let id = AgentId::global("acct1", AgentCategory::Image);
        let agent = InventoryCachingAgent::new(id.clone(), creds, &context);

        assert!(agent.load().await.is_err());
        assert!(store.get(&id).is_none());
    }
}
