use std::collections::HashMap;
use std::sync::Arc;

use stratus_core::types::AgentCategory;
use tracing::debug;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum NamingError {
    #[error("unknown naming strategy: `{0}`")]
    UnknownStrategy(String),
    #[error("duplicate naming strategy: `{0}`")]
    DuplicateStrategy(String),
}

// ---------------------------------------------------------------------------
// NamingStrategy trait
// ---------------------------------------------------------------------------

/// Pluggable policy that derives resource names from account metadata.
///
/// Strategies are registered once at startup and looked up by id when an
/// account definition is parsed; the resolved strategy travels with the
/// account's credentials.
pub trait NamingStrategy: Send + Sync {
    /// Stable id this strategy is registered and looked up under.
    fn id(&self) -> &str;

    /// Derive the cache-facing name for one resource of one account.
    fn derive_name(&self, account: &str, category: AgentCategory, resource: &str) -> String;
}

/// The built-in strategy: `<account>/<category>/<resource>`.
#[derive(Debug, Default)]
pub struct DefaultNamingStrategy;

impl NamingStrategy for DefaultNamingStrategy {
    fn id(&self) -> &str {
        "default"
    }

    fn derive_name(&self, account: &str, category: AgentCategory, resource: &str) -> String {
        format!("{account}/{category}/{resource}")
    }
}

// ---------------------------------------------------------------------------
// NamerRegistry
// ---------------------------------------------------------------------------

/// Registry of naming strategies, keyed by id.
///
/// Always contains the [`DefaultNamingStrategy`]; a lookup with no id
/// resolves to it, a lookup with an unregistered id is an error (the parser
/// turns that into a per-account parse failure).
pub struct NamerRegistry {
    strategies: HashMap<String, Arc<dyn NamingStrategy>>,
    default_id: String,
}

impl NamerRegistry {
    pub fn new() -> Self {
        let default: Arc<dyn NamingStrategy> = Arc::new(DefaultNamingStrategy);
        let default_id = default.id().to_string();
        let mut strategies = HashMap::new();
        strategies.insert(default_id.clone(), default);
        Self {
            strategies,
            default_id,
        }
    }

    /// Register a strategy. Ids must be unique.
    pub fn register(&mut self, strategy: Arc<dyn NamingStrategy>) -> Result<(), NamingError> {
        let id = strategy.id().to_string();
        if self.strategies.contains_key(&id) {
            return Err(NamingError::DuplicateStrategy(id));
        }
        debug!(strategy = %id, "registered naming strategy");
        self.strategies.insert(id, strategy);
        Ok(())
    }

    /// Resolve a strategy id from an account definition. `None` means the
    /// definition did not name one and gets the default.
    pub fn lookup(&self, id: Option<&str>) -> Result<Arc<dyn NamingStrategy>, NamingError> {
        let id = id.unwrap_or(&self.default_id);
        self.strategies
            .get(id)
            .cloned()
            .ok_or_else(|| NamingError::UnknownStrategy(id.to_string()))
    }

    pub fn strategy_ids(&self) -> Vec<&str> {
        self.strategies.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for NamerRegistry {
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

    struct SuffixStrategy;

    impl NamingStrategy for SuffixStrategy {
        fn id(&self) -> &str {
            "suffix"
        }

        fn derive_name(&self, account: &str, _category: AgentCategory, resource: &str) -> String {
            format!("{resource}.{account}")
        }
    }

    #[test]
    fn lookup_none_returns_default() {
        let reg = NamerRegistry::new();
        let namer = reg.lookup(None).unwrap();
        assert_eq!(namer.id(), "default");
    }

    #[test]
    fn default_strategy_derives_path_style_names() {
        let namer = DefaultNamingStrategy;
        assert_eq!(
            namer.derive_name("acct1", AgentCategory::Network, "vpc-main"),
            "acct1/network/vpc-main"
        );
    }

    #[test]
    fn register_and_lookup_custom_strategy() {
        let mut reg = NamerRegistry::new();
        reg.register(Arc::new(SuffixStrategy)).unwrap();
        let namer = reg.lookup(Some("suffix")).unwrap();
        assert_eq!(
            namer.derive_name("acct1", AgentCategory::Image, "base"),
            "base.acct1"
        );
    }

    #[test]
    fn unknown_strategy_is_an_error() {
        let reg = NamerRegistry::new();
        let err = match reg.lookup(Some("nope")) {
            Ok(_) => panic!("expected unknown strategy error"),
            Err(e) => e,
        };
        assert!(matches!(err, NamingError::UnknownStrategy(_)));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut reg = NamerRegistry::new();
        reg.register(Arc::new(SuffixStrategy)).unwrap();
        let err = reg.register(Arc::new(SuffixStrategy)).unwrap_err();
        assert!(matches!(err, NamingError::DuplicateStrategy(_)));
    }
}
