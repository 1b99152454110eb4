use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::AgentCategory;

/// Top-level configuration loaded from `~/.stratus/config.toml`.
///
/// Account definitions live in `[[credentials.accounts]]`; the daemon
/// re-reads them on every reconciliation cycle, so operator edits take
/// effect on the next tick without a restart.
///
/// **Security**: key material is never stored here. Accounts carry a
/// *reference* to a key file; the bytes are resolved at parse time and kept
/// in memory only.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl Config {
    /// Load config from `~/.stratus/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Default config location: `~/.stratus/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".stratus")
            .join("config.toml")
    }

    /// Semantic validation for settings that are not expressible via types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.application_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "general.application_name must not be empty".into(),
            ));
        }
        if self.credentials.sync_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "credentials.sync_interval_secs must be greater than zero".into(),
            ));
        }
        if self.credentials.fetch_timeout_secs == 0 || self.credentials.parse_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "credentials timeouts must be greater than zero".into(),
            ));
        }
        if self.agents.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "agents.poll_interval_secs must be greater than zero".into(),
            ));
        }
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "provider.base_url must not be empty".into(),
            ));
        }
        // Duplicate account names are legal here: the reconciler resolves
        // them with a last-occurrence-wins rule.
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// [general]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Application name sent as the user agent on provider calls.
    #[serde(default = "default_application_name")]
    pub application_name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
        }
    }
}

fn default_application_name() -> String {
    "stratus".to_string()
}

// ---------------------------------------------------------------------------
// [credentials] — account definitions and reconciliation settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Regions applied to accounts that do not declare their own.
    #[serde(default)]
    pub default_regions: Vec<String>,
    /// Seconds between reconciliation cycles.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    /// Timeout for fetching the definition list, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Per-definition parse timeout, in seconds.
    #[serde(default = "default_parse_timeout_secs")]
    pub parse_timeout_secs: u64,
    /// The declared account list. This is the definition source of record.
    #[serde(default)]
    pub accounts: Vec<AccountDefinition>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            default_regions: Vec::new(),
            sync_interval_secs: default_sync_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            parse_timeout_secs: default_parse_timeout_secs(),
            accounts: Vec::new(),
        }
    }
}

fn default_sync_interval_secs() -> u64 {
    60
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_parse_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// AccountDefinition — raw, unvalidated per-account record
// ---------------------------------------------------------------------------

/// One declared account, exactly as the operator wrote it.
///
/// Validation and enrichment happen at parse time; this struct stays an
/// untouched snapshot of the configuration for the duration of a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDefinition {
    /// Unique account name; the sole identity key across the registries.
    pub name: String,
    /// Cloud project the account maps to.
    #[serde(default)]
    pub project: String,
    /// Path to the service-account key file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_key_path: Option<String>,
    /// Regions this account manages; empty means "use the global defaults".
    #[serde(default)]
    pub regions: Vec<String>,
    /// Id of a registered naming strategy; unset means the default strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naming_strategy: Option<String>,
    /// Deployment environment label; defaults to the account name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Account-type label; defaults to the account name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    /// Service account to impersonate, when delegation is in use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_project: Option<String>,
    /// Extra projects whose images this account may list.
    #[serde(default)]
    pub image_projects: Vec<String>,
    /// Opt in to the alpha compute API surface.
    #[serde(default)]
    pub alpha_listed: bool,
    /// Optional user-data template file for instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_file: Option<String>,
}

impl AccountDefinition {
    /// Minimal definition used widely in tests and examples.
    pub fn new(name: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project: project.into(),
            json_key_path: None,
            regions: Vec::new(),
            naming_strategy: None,
            environment: None,
            account_type: None,
            service_account_id: None,
            service_account_project: None,
            image_projects: Vec::new(),
            alpha_listed: false,
            user_data_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// [agents]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Seconds between an agent's inventory refreshes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Per-category enable flags; everything defaults to on.
    #[serde(default)]
    pub categories: CategoriesConfig,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            categories: CategoriesConfig::default(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

/// Feature flags for each caching category. Disabling a category is a
/// configuration change; no code edit is involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesConfig {
    #[serde(default = "default_true")]
    pub security_policy: bool,
    #[serde(default = "default_true")]
    pub health_check: bool,
    #[serde(default = "default_true")]
    pub load_balancer_backend: bool,
    #[serde(default = "default_true")]
    pub address: bool,
    #[serde(default = "default_true")]
    pub certificate: bool,
    #[serde(default = "default_true")]
    pub image: bool,
    #[serde(default = "default_true")]
    pub instance: bool,
    #[serde(default = "default_true")]
    pub network: bool,
    #[serde(default = "default_true")]
    pub subnet: bool,
}

impl CategoriesConfig {
    /// Whether agents for `category` should be part of an account's bundle.
    pub fn enabled(&self, category: AgentCategory) -> bool {
        match category {
            AgentCategory::SecurityPolicy => self.security_policy,
            AgentCategory::HealthCheck => self.health_check,
            AgentCategory::LoadBalancerBackend => self.load_balancer_backend,
            AgentCategory::Address => self.address,
            AgentCategory::Certificate => self.certificate,
            AgentCategory::Image => self.image,
            AgentCategory::Instance => self.instance,
            AgentCategory::Network => self.network,
            AgentCategory::Subnet => self.subnet,
        }
    }
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            security_policy: true,
            health_check: true,
            load_balancer_backend: true,
            address: true,
            certificate: true,
            image: true,
            instance: true,
            network: true,
            subnet: true,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// [provider]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the inventory API agents poll.
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    /// Per-request timeout, in seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            request_timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_provider_base_url() -> String {
    "http://127.0.0.1:8400".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    15
}

// ---------------------------------------------------------------------------
// [daemon]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_daemon_host")]
    pub host: String,
    #[serde(default = "default_daemon_port")]
    pub port: u16,
    /// Seconds between operational stats log lines.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_daemon_host(),
            port: default_daemon_port(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

fn default_daemon_host() -> String {
    "127.0.0.1".to_string()
}

fn default_daemon_port() -> u16 {
    8087
}

fn default_stats_interval_secs() -> u64 {
    300
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
