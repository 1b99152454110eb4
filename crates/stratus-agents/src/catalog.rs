use std::sync::Arc;

use stratus_core::config::AgentsConfig;
use stratus_core::types::{AgentCategory, AgentScope};
use stratus_credentials::credentials::AccountCredentials;
use tracing::debug;

use crate::agent::{AgentContext, AgentId, CachingAgent, InventoryCachingAgent};

// ---------------------------------------------------------------------------
// AgentCatalog
// ---------------------------------------------------------------------------

/// The declarative agent-bundle table.
///
/// A bundle is computed from an account's credentials plus static
/// configuration, nothing else: the catalog walks [`AgentCategory::ALL`] in
/// order, skips categories the config disables, and fans regional
/// categories out across the account's resolved regions. Two calls with the
/// same inputs produce the same bundle.
pub struct AgentCatalog {
    config: AgentsConfig,
}

impl AgentCatalog {
    pub fn new(config: AgentsConfig) -> Self {
        Self { config }
    }

    /// Categories currently enabled, in bundle order.
    pub fn enabled_categories(&self) -> Vec<AgentCategory> {
        AgentCategory::ALL
            .into_iter()
            .filter(|cat| self.config.categories.enabled(*cat))
            .collect()
    }

    /// The agent identities a bundle for `credentials` would contain.
    pub fn bundle_ids(&self, credentials: &AccountCredentials) -> Vec<AgentId> {
        let mut ids = Vec::new();
        for category in self.enabled_categories() {
            match category.scope() {
                AgentScope::Global => {
                    ids.push(AgentId::global(&credentials.name, category));
                }
                AgentScope::Regional => {
                    for region in &credentials.regions {
                        ids.push(AgentId::regional(&credentials.name, category, region));
                    }
                }
            }
        }
        ids
    }

    /// Construct the full agent bundle for one account.
    pub fn build_bundle(
        &self,
        credentials: &Arc<AccountCredentials>,
        context: &AgentContext,
    ) -> Vec<Arc<dyn CachingAgent>> {
        let bundle: Vec<Arc<dyn CachingAgent>> = self
            .bundle_ids(credentials)
            .into_iter()
            .map(|id| {
                Arc::new(InventoryCachingAgent::new(id, credentials.clone(), context))
                    as Arc<dyn CachingAgent>
            })
            .collect();
        debug!(
            account = %credentials.name,
            agents = bundle.len(),
            "agent bundle computed"
        );
        bundle
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
