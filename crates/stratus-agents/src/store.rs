use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::agent::AgentId;

// ---------------------------------------------------------------------------
// InventoryStore trait
// ---------------------------------------------------------------------------

/// The shared cache caching agents populate.
///
/// Buckets are keyed by agent identity (account + category + region); a
/// `put` replaces the bucket wholesale, which is how a load reflects
/// resource deletions upstream. Reads may come from anywhere at any time.
pub trait InventoryStore: Send + Sync {
    /// Replace one bucket with a freshly fetched document set.
    fn put(&self, id: &AgentId, documents: Vec<Value>);

    /// Current contents of one bucket.
    fn get(&self, id: &AgentId) -> Option<Vec<Value>>;

    /// Drop every bucket belonging to an account. Returns the number of
    /// buckets removed.
    fn purge_account(&self, account: &str) -> usize;

    /// Total number of cached documents across all buckets.
    fn document_count(&self) -> usize;
}

// ---------------------------------------------------------------------------
// MemoryInventory
// ---------------------------------------------------------------------------

/// In-memory [`InventoryStore`] backed by a concurrent map.
#[derive(Default)]
pub struct MemoryInventory {
    buckets: DashMap<AgentId, Vec<Value>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl InventoryStore for MemoryInventory {
    fn put(&self, id: &AgentId, documents: Vec<Value>) {
        self.buckets.insert(id.clone(), documents);
    }

    fn get(&self, id: &AgentId) -> Option<Vec<Value>> {
        self.buckets.get(id).map(|entry| entry.value().clone())
    }

    fn purge_account(&self, account: &str) -> usize {
        let doomed: Vec<AgentId> = self
            .buckets
            .iter()
            .filter(|entry| entry.key().account == account)
            .map(|entry| entry.key().clone())
            .collect();
        let purged = doomed.len();
        for id in doomed {
            self.buckets.remove(&id);
        }
        if purged > 0 {
            debug!(account = %account, buckets = purged, "inventory purged");
        }
        purged
    }

    fn document_count(&self) -> usize {
        self.buckets.iter().map(|entry| entry.value().len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stratus_core::types::AgentCategory;

    fn docs(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({ "i": i })).collect()
    }

    #[test]
    fn put_replaces_bucket_wholesale() {
        let store = MemoryInventory::new();
        let id = AgentId::global("acct1", AgentCategory::Instance);
        store.put(&id, docs(5));
        store.put(&id, docs(2));
        assert_eq!(store.get(&id).unwrap().len(), 2);
        assert_eq!(store.document_count(), 2);
    }

    #[test]
    fn purge_account_removes_only_that_account() {
        let store = MemoryInventory::new();
        store.put(&AgentId::global("acct1", AgentCategory::Network), docs(1));
        store.put(
            &AgentId::regional("acct1", AgentCategory::Subnet, "us-east1"),
            docs(2),
        );
        store.put(&AgentId::global("acct2", AgentCategory::Network), docs(3));

        assert_eq!(store.purge_account("acct1"), 2);
        assert_eq!(store.bucket_count(), 1);
        assert_eq!(store.document_count(), 3);
    }

    #[test]
    fn purge_unknown_account_is_a_noop() {
        let store = MemoryInventory::new();
        assert_eq!(store.purge_account("ghost"), 0);
    }

    #[test]
    fn get_missing_bucket_is_none() {
        let store = MemoryInventory::new();
        assert!(store
            .get(&AgentId::global("acct1", AgentCategory::Image))
            .is_none());
    }
}
