use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::naming::NamingStrategy;

// ---------------------------------------------------------------------------
// ComputeVersion
// ---------------------------------------------------------------------------

/// Which provider API surface the account's agents talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeVersion {
    Default,
    Alpha,
}

// ---------------------------------------------------------------------------
// JsonKey — resolved service-account key material
// ---------------------------------------------------------------------------

/// Key material resolved from an account's `json_key_path`.
///
/// The raw bytes are kept verbatim for the provider client; the fields a
/// service-account key usually carries are surfaced when present.
#[derive(Clone, PartialEq, Eq)]
pub struct JsonKey {
    raw: Vec<u8>,
    pub project_id: Option<String>,
    pub client_email: Option<String>,
}

#[derive(Deserialize)]
struct JsonKeyFields {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    client_email: Option<String>,
}

impl JsonKey {
    /// Parse key material. The bytes must be a JSON object; `project_id`
    /// and `client_email` are optional within it.
    pub fn parse(raw: Vec<u8>) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("key material is empty".to_string());
        }
        let fields: JsonKeyFields =
            serde_json::from_slice(&raw).map_err(|e| format!("not valid JSON: {e}"))?;
        Ok(Self {
            raw,
            project_id: fields.project_id,
            client_email: fields.client_email,
        })
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

// Key material never appears in logs; Debug shows its shape only.
impl std::fmt::Debug for JsonKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonKey")
            .field("bytes", &self.raw.len())
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// AccountCredentials — validated, enriched account
// ---------------------------------------------------------------------------

/// The validated counterpart of an account definition.
///
/// Built exactly once per successful parse and immutable afterwards; the
/// registries hand out `Arc`s of it. Structural equality (ignoring the
/// parse timestamp) is what decides updated-vs-unchanged during a diff.
pub struct AccountCredentials {
    pub name: String,
    pub environment: String,
    pub account_type: String,
    pub project: String,
    pub compute_version: ComputeVersion,
    pub json_key: JsonKey,
    pub service_account_id: Option<String>,
    pub service_account_project: Option<String>,
    pub image_projects: Vec<String>,
    pub user_data_file: Option<String>,
    /// Resolved region list: the definition's own, or the global defaults.
    pub regions: Vec<String>,
    pub namer: Arc<dyn NamingStrategy>,
    pub parsed_at: DateTime<Utc>,
}

impl AccountCredentials {
    /// Id of the naming strategy this account resolved to.
    pub fn namer_id(&self) -> &str {
        self.namer.id()
    }
}

impl PartialEq for AccountCredentials {
    fn eq(&self, other: &Self) -> bool {
        // `parsed_at` is bookkeeping and the namer compares by id; everything
        // else is structural.
        self.name == other.name
            && self.environment == other.environment
            && self.account_type == other.account_type
            && self.project == other.project
            && self.compute_version == other.compute_version
            && self.json_key == other.json_key
            && self.service_account_id == other.service_account_id
            && self.service_account_project == other.service_account_project
            && self.image_projects == other.image_projects
            && self.user_data_file == other.user_data_file
            && self.regions == other.regions
            && self.namer.id() == other.namer.id()
    }
}

impl Eq for AccountCredentials {}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("name", &self.name)
            .field("environment", &self.environment)
            .field("account_type", &self.account_type)
            .field("project", &self.project)
            .field("compute_version", &self.compute_version)
            .field("json_key", &self.json_key)
            .field("regions", &self.regions)
            .field("namer", &self.namer.id())
            .field("parsed_at", &self.parsed_at)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
