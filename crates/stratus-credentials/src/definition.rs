use std::path::PathBuf;

use stratus_core::config::{AccountDefinition, Config};
use tokio::sync::RwLock;
use tracing::debug;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("definition source io error: {0}")]
    Io(String),
    #[error("definition source parse error: {0}")]
    Parse(String),
    #[error("definition source unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// DefinitionSource trait
// ---------------------------------------------------------------------------

/// Supplies the full current list of raw account definitions.
///
/// The reconciler calls this once per cycle; the returned list is the
/// complete declaration, so a name missing from it means the operator
/// removed the account.
#[async_trait::async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn load_definitions(&self) -> Result<Vec<AccountDefinition>, SourceError>;
}

// ---------------------------------------------------------------------------
// ConfigDefinitionSource — re-reads the config file each cycle
// ---------------------------------------------------------------------------

/// Reads `[[credentials.accounts]]` from the service's TOML config file on
/// every call, so operator edits land on the next reconciliation tick.
pub struct ConfigDefinitionSource {
    path: PathBuf,
}

impl ConfigDefinitionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait::async_trait]
impl DefinitionSource for ConfigDefinitionSource {
    async fn load_definitions(&self) -> Result<Vec<AccountDefinition>, SourceError> {
        let path = self.path.clone();
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SourceError::Io(format!("{}: {e}", path.display())))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| SourceError::Parse(e.to_string()))?;
        debug!(
            path = %path.display(),
            accounts = cfg.credentials.accounts.len(),
            "loaded account definitions"
        );
        Ok(cfg.credentials.accounts)
    }
}

// ---------------------------------------------------------------------------
// StaticDefinitionSource — in-memory list
// ---------------------------------------------------------------------------

/// An in-memory definition list. Used by tests and by deployments that
/// manage accounts through the operational API instead of a config file.
pub struct StaticDefinitionSource {
    definitions: RwLock<Vec<AccountDefinition>>,
}

impl StaticDefinitionSource {
    pub fn new(definitions: Vec<AccountDefinition>) -> Self {
        Self {
            definitions: RwLock::new(definitions),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Replace the full definition list.
    pub async fn set(&self, definitions: Vec<AccountDefinition>) {
        *self.definitions.write().await = definitions;
    }
}

#[async_trait::async_trait]
impl DefinitionSource for StaticDefinitionSource {
    async fn load_definitions(&self) -> Result<Vec<AccountDefinition>, SourceError> {
        Ok(self.definitions.read().await.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
