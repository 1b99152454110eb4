use std::sync::Arc;

use crate::credentials::AccountCredentials;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("agent registration failed for account `{account}`: {cause}")]
    Registration { account: String, cause: String },
    #[error("agent deregistration failed for account `{account}`: {cause}")]
    Deregistration { account: String, cause: String },
}

impl LifecycleError {
    pub fn account(&self) -> &str {
        match self {
            LifecycleError::Registration { account, .. }
            | LifecycleError::Deregistration { account, .. } => account,
        }
    }
}

// ---------------------------------------------------------------------------
// CredentialsLifecycleHandler trait
// ---------------------------------------------------------------------------

/// Consumes the lifecycle transitions the reconciler's diff produces.
///
/// The reconciler guarantees ordering per account: for one name, callbacks
/// never overlap and arrive in diff order (deletes, then updates, then
/// adds). `on_added` is only invoked when nothing is currently registered
/// for the account; `on_updated` replaces whatever is.
///
/// A returned error blocks the registry commit for that account — the
/// reconciler reports it and retries on the next cycle.
#[async_trait::async_trait]
pub trait CredentialsLifecycleHandler: Send + Sync {
    async fn on_added(&self, credentials: &Arc<AccountCredentials>) -> Result<(), LifecycleError>;

    async fn on_updated(&self, credentials: &Arc<AccountCredentials>)
        -> Result<(), LifecycleError>;

    async fn on_deleted(&self, name: &str) -> Result<(), LifecycleError>;
}

/// Handler that does nothing. Useful for wiring the reconciler in tests
/// that only exercise registry bookkeeping.
#[derive(Debug, Default)]
pub struct NoopLifecycleHandler;

#[async_trait::async_trait]
impl CredentialsLifecycleHandler for NoopLifecycleHandler {
    async fn on_added(&self, _credentials: &Arc<AccountCredentials>) -> Result<(), LifecycleError> {
        Ok(())
    }

    async fn on_updated(
        &self,
        _credentials: &Arc<AccountCredentials>,
    ) -> Result<(), LifecycleError> {
        Ok(())
    }

    async fn on_deleted(&self, _name: &str) -> Result<(), LifecycleError> {
        Ok(())
    }
}
