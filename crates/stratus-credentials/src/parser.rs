use std::sync::Arc;

use chrono::Utc;
use stratus_core::config::AccountDefinition;
use tracing::debug;

use crate::credentials::{AccountCredentials, ComputeVersion, JsonKey};
use crate::naming::{NamerRegistry, NamingError};

// ---------------------------------------------------------------------------
// ContentResolver — external key-material lookup
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("content not found: `{0}`")]
    NotFound(String),
    #[error("content io error: {0}")]
    Io(String),
}

/// Resolves a reference path to raw content bytes.
///
/// The parser is side-effect-free apart from calls through this trait.
#[async_trait::async_trait]
pub trait ContentResolver: Send + Sync {
    async fn resolve(&self, path: &str) -> Result<Vec<u8>, ResolveError>;
}

/// Resolves references against the local filesystem.
#[derive(Debug, Default)]
pub struct FileContentResolver;

#[async_trait::async_trait]
impl ContentResolver for FileContentResolver {
    async fn resolve(&self, path: &str) -> Result<Vec<u8>, ResolveError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ResolveError::NotFound(path.to_string()))
            }
            Err(e) => Err(ResolveError::Io(format!("{path}: {e}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// ParseError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("account `{name}` is missing required field `{field}`")]
    MissingField { name: String, field: &'static str },
    #[error("failed to resolve key material for account `{name}`: {source}")]
    KeyMaterial {
        name: String,
        #[source]
        source: ResolveError,
    },
    #[error("key material for account `{name}` is invalid: {cause}")]
    InvalidKey { name: String, cause: String },
    #[error("account `{name}` references unknown naming strategy `{strategy}`")]
    UnknownNamingStrategy { name: String, strategy: String },
}

impl ParseError {
    /// The account the failure belongs to.
    pub fn account(&self) -> &str {
        match self {
            ParseError::MissingField { name, .. }
            | ParseError::KeyMaterial { name, .. }
            | ParseError::InvalidKey { name, .. }
            | ParseError::UnknownNamingStrategy { name, .. } => name,
        }
    }
}

// ---------------------------------------------------------------------------
// AccountParser
// ---------------------------------------------------------------------------

/// Turns raw [`AccountDefinition`]s into validated [`AccountCredentials`].
///
/// A failure is scoped to the one definition being parsed; the reconciler
/// treats it as "no change" for that account, never as a delete.
pub struct AccountParser {
    resolver: Arc<dyn ContentResolver>,
    namers: Arc<NamerRegistry>,
    default_regions: Vec<String>,
}

impl AccountParser {
    pub fn new(
        resolver: Arc<dyn ContentResolver>,
        namers: Arc<NamerRegistry>,
        default_regions: Vec<String>,
    ) -> Self {
        Self {
            resolver,
            namers,
            default_regions,
        }
    }

    pub async fn parse(
        &self,
        definition: &AccountDefinition,
    ) -> Result<Arc<AccountCredentials>, ParseError> {
        let name = definition.name.trim();
        if name.is_empty() {
            return Err(ParseError::MissingField {
                name: definition.name.clone(),
                field: "name",
            });
        }
        if definition.project.trim().is_empty() {
            return Err(ParseError::MissingField {
                name: name.to_string(),
                field: "project",
            });
        }

        let key_path = definition
            .json_key_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ParseError::MissingField {
                name: name.to_string(),
                field: "json_key_path",
            })?;

        let raw = self
            .resolver
            .resolve(key_path)
            .await
            .map_err(|source| ParseError::KeyMaterial {
                name: name.to_string(),
                source,
            })?;
        let json_key = JsonKey::parse(raw).map_err(|cause| ParseError::InvalidKey {
            name: name.to_string(),
            cause,
        })?;

        let namer = self
            .namers
            .lookup(definition.naming_strategy.as_deref())
            .map_err(|e| {
                let (NamingError::UnknownStrategy(strategy)
                | NamingError::DuplicateStrategy(strategy)) = e;
                ParseError::UnknownNamingStrategy {
                    name: name.to_string(),
                    strategy,
                }
            })?;

        let regions = if definition.regions.is_empty() {
            self.default_regions.clone()
        } else {
            definition.regions.clone()
        };

        let environment = non_empty(&definition.environment).unwrap_or(name).to_string();
        let account_type = non_empty(&definition.account_type).unwrap_or(name).to_string();

        let credentials = AccountCredentials {
            name: name.to_string(),
            environment,
            account_type,
            project: definition.project.clone(),
            compute_version: if definition.alpha_listed {
                ComputeVersion::Alpha
            } else {
                ComputeVersion::Default
            },
            json_key,
            service_account_id: definition.service_account_id.clone(),
            service_account_project: definition.service_account_project.clone(),
            image_projects: definition.image_projects.clone(),
            user_data_file: definition.user_data_file.clone(),
            regions,
            namer,
            parsed_at: Utc::now(),
        };

        debug!(
            account = %credentials.name,
            project = %credentials.project,
            regions = credentials.regions.len(),
            namer = credentials.namer_id(),
            "parsed account credentials"
        );
        Ok(Arc::new(credentials))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Resolver backed by an in-memory path → bytes map.
    pub(crate) struct MapResolver {
        contents: HashMap<String, Vec<u8>>,
    }

    impl MapResolver {
        pub(crate) fn new(entries: &[(&str, &[u8])]) -> Self {
            Self {
                contents: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
            }
        }
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

    fn parser(default_regions: Vec<String>) -> AccountParser {
        let resolver = MapResolver::new(&[("/keys/acct1.json", br#"{"project_id":"p1"}"#)]);
        AccountParser::new(
            Arc::new(resolver),
            Arc::new(NamerRegistry::new()),
            default_regions,
        )
    }

    fn definition() -> AccountDefinition {
        let mut def = AccountDefinition::new("acct1", "p1");
        def.json_key_path = Some("/keys/acct1.json".into());
        def
    }

    #[tokio::test]
    async fn parse_enriches_defaults_from_name() {
        let creds = parser(vec![]).parse(&definition()).await.unwrap();
        assert_eq!(creds.name, "acct1");
        assert_eq!(creds.environment, "acct1");
        assert_eq!(creds.account_type, "acct1");
        assert_eq!(creds.compute_version, ComputeVersion::Default);
        assert_eq!(creds.namer_id(), "default");
    }

    #[tokio::test]
    async fn explicit_environment_and_type_survive() {
        let mut def = definition();
        def.environment = Some("prod".into());
        def.account_type = Some("service".into());
        let creds = parser(vec![]).parse(&def).await.unwrap();
        assert_eq!(creds.environment, "prod");
        assert_eq!(creds.account_type, "service");
    }

    #[tokio::test]
    async fn empty_region_list_falls_back_to_defaults() {
        let creds = parser(vec!["us-central1".into(), "us-east1".into()])
            .parse(&definition())
            .await
            .unwrap();
        assert_eq!(creds.regions, vec!["us-central1", "us-east1"]);
    }

    #[tokio::test]
    async fn declared_regions_are_used_verbatim() {
        let mut def = definition();
        def.regions = vec!["europe-west1".into()];
        let creds = parser(vec!["us-central1".into()]).parse(&def).await.unwrap();
        assert_eq!(creds.regions, vec!["europe-west1"]);
    }

    #[tokio::test]
    async fn alpha_listed_selects_alpha_surface() {
        let mut def = definition();
        def.alpha_listed = true;
        let creds = parser(vec![]).parse(&def).await.unwrap();
        assert_eq!(creds.compute_version, ComputeVersion::Alpha);
    }

    #[tokio::test]
    async fn missing_project_fails() {
        let mut def = definition();
        def.project = String::new();
        let err = parser(vec![]).parse(&def).await.unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "project", .. }));
        assert_eq!(err.account(), "acct1");
    }

    #[tokio::test]
    async fn missing_key_path_fails() {
        let mut def = definition();
        def.json_key_path = None;
        let err = parser(vec![]).parse(&def).await.unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingField { field: "json_key_path", .. }
        ));
    }

    #[tokio::test]
    async fn unreadable_key_material_fails() {
        let mut def = definition();
        def.json_key_path = Some("/missing".into());
        let err = parser(vec![]).parse(&def).await.unwrap_err();
        assert!(matches!(err, ParseError::KeyMaterial { .. }));
    }

    #[tokio::test]
    async fn garbage_key_material_fails() {
        let resolver = MapResolver::new(&[("/keys/bad.json", b"not json" as &[u8])]);
        let parser = AccountParser::new(
            Arc::new(resolver),
            Arc::new(NamerRegistry::new()),
            Vec::new(),
        );
        let mut def = definition();
        def.json_key_path = Some("/keys/bad.json".into());
        let err = parser.parse(&def).await.unwrap_err();
        assert!(matches!(err, ParseError::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn unknown_naming_strategy_fails() {
        let mut def = definition();
        def.naming_strategy = Some("exotic".into());
        let err = parser(vec![]).parse(&def).await.unwrap_err();
        assert!(matches!(err, ParseError::UnknownNamingStrategy { .. }));
    }

    #[tokio::test]
    async fn file_resolver_distinguishes_not_found() {
        let resolver = FileContentResolver;
        let err = resolver.resolve("/definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[tokio::test]
    async fn file_resolver_reads_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");
        std::fs::write(&path, br#"{"project_id":"p"}"#).unwrap();
        let resolver = FileContentResolver;
        let bytes = resolver.resolve(path.to_str().unwrap()).await.unwrap();
        assert!(!bytes.is_empty());
    }
}
