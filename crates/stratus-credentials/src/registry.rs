use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::credentials::AccountCredentials;

/// Authoritative map of account name → current validated credentials.
///
/// Single-writer discipline: only the reconciler commits or removes
/// entries, and it does so strictly between diff and the next cycle.
/// Reads are concurrent and cheap; observers get `Arc` handles that stay
/// valid even if the entry is replaced underneath them.
///
/// Every entry is the most recently *successfully parsed* credentials for
/// that name. A parse failure leaves the existing entry untouched.
pub struct CredentialsRegistry {
    accounts: RwLock<HashMap<String, Arc<AccountCredentials>>>,
}

impl CredentialsRegistry {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<AccountCredentials>> {
        self.accounts.read().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        self.accounts.read().await.keys().cloned().collect()
    }

    /// Full point-in-time view, used by the reconciler's diff.
    pub async fn snapshot(&self) -> HashMap<String, Arc<AccountCredentials>> {
        self.accounts.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    /// Insert or replace the credentials for an account.
    pub async fn commit(&self, credentials: Arc<AccountCredentials>) {
        let name = credentials.name.clone();
        self.accounts.write().await.insert(name.clone(), credentials);
        debug!(account = %name, "credentials committed");
    }

    /// Remove an account, returning its last credentials if present.
    pub async fn remove(&self, name: &str) -> Option<Arc<AccountCredentials>> {
        let removed = self.accounts.write().await.remove(name);
        if removed.is_some() {
            debug!(account = %name, "credentials removed");
        }
        removed
    }
}

impl Default for CredentialsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{ComputeVersion, JsonKey};
    use crate::naming::DefaultNamingStrategy;
    use chrono::Utc;

    fn creds(name: &str, project: &str) -> Arc<AccountCredentials> {
        Arc::new(AccountCredentials {
            name: name.into(),
            environment: name.into(),
            account_type: name.into(),
            project: project.into(),
            compute_version: ComputeVersion::Default,
            json_key: JsonKey::parse(br#"{"project_id":"p"}"#.to_vec()).unwrap(),
            service_account_id: None,
            service_account_project: None,
            image_projects: Vec::new(),
            user_data_file: None,
            regions: Vec::new(),
            namer: Arc::new(DefaultNamingStrategy),
            parsed_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn commit_then_get() {
        let reg = CredentialsRegistry::new();
        reg.commit(creds("acct1", "p1")).await;
        let got = reg.get("acct1").await.unwrap();
        assert_eq!(got.project, "p1");
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn commit_replaces_existing_entry() {
        let reg = CredentialsRegistry::new();
        reg.commit(creds("acct1", "p1")).await;
        reg.commit(creds("acct1", "p2")).await;
        assert_eq!(reg.len().await, 1);
        assert_eq!(reg.get("acct1").await.unwrap().project, "p2");
    }

    #[tokio::test]
    async fn remove_returns_last_credentials() {
        let reg = CredentialsRegistry::new();
        reg.commit(creds("acct1", "p1")).await;
        let removed = reg.remove("acct1").await.unwrap();
        assert_eq!(removed.project, "p1");
        assert!(reg.is_empty().await);
    }

    #[tokio::test]
    async fn remove_missing_is_none() {
        let reg = CredentialsRegistry::new();
        assert!(reg.remove("ghost").await.is_none());
    }

    #[tokio::test]
    async fn snapshot_is_point_in_time() {
        let reg = CredentialsRegistry::new();
        reg.commit(creds("acct1", "p1")).await;
        let snap = reg.snapshot().await;
        reg.commit(creds("acct2", "p2")).await;
        assert_eq!(snap.len(), 1);
        assert_eq!(reg.len().await, 2);
    }

    #[tokio::test]
    async fn old_handles_survive_replacement() {
        let reg = CredentialsRegistry::new();
        reg.commit(creds("acct1", "p1")).await;
        let old = reg.get("acct1").await.unwrap();
        reg.commit(creds("acct1", "p2")).await;
        assert_eq!(old.project, "p1");
    }
}
