use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AgentCategory
// ---------------------------------------------------------------------------

/// The inventory categories a caching agent can be responsible for.
///
/// One agent caches exactly one category for one account (and, for regional
/// categories, one region). The declarative ordering of [`AgentCategory::ALL`]
/// is the order agents are constructed in when a bundle is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentCategory {
    SecurityPolicy,
    HealthCheck,
    LoadBalancerBackend,
    Address,
    Certificate,
    Image,
    Instance,
    Network,
    Subnet,
}

impl AgentCategory {
    /// Every category, in bundle construction order.
    pub const ALL: [AgentCategory; 9] = [
        AgentCategory::SecurityPolicy,
        AgentCategory::HealthCheck,
        AgentCategory::LoadBalancerBackend,
        AgentCategory::Address,
        AgentCategory::Certificate,
        AgentCategory::Image,
        AgentCategory::Instance,
        AgentCategory::Network,
        AgentCategory::Subnet,
    ];

    /// Stable kebab-case name, used in agent ids, URLs, and config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentCategory::SecurityPolicy => "security-policy",
            AgentCategory::HealthCheck => "health-check",
            AgentCategory::LoadBalancerBackend => "load-balancer-backend",
            AgentCategory::Address => "address",
            AgentCategory::Certificate => "certificate",
            AgentCategory::Image => "image",
            AgentCategory::Instance => "instance",
            AgentCategory::Network => "network",
            AgentCategory::Subnet => "subnet",
        }
    }

    /// Whether agents for this category are created once per account or once
    /// per resolved region.
    pub fn scope(&self) -> AgentScope {
        match self {
            AgentCategory::Subnet => AgentScope::Regional,
            _ => AgentScope::Global,
        }
    }
}

impl std::fmt::Display for AgentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AgentScope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentScope {
    /// One agent per account.
    Global,
    /// One agent per account and region.
    Regional,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
