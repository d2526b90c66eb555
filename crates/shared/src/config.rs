//! Configuration types for Conduit

use crate::error::{ConduitError, Result};
use crate::role::{Permission, Role};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default ceiling for a request's resource limit
pub const DEFAULT_MAX_RESOURCE_LIMIT: u64 = 500_000;

/// Absolute upper bound the configurable ceiling may be raised to
pub const RESOURCE_LIMIT_HARD_CAP: u64 = 2_500_000;

/// Default number of events retained by the audit log
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

fn default_max_resource_limit() -> u64 {
    DEFAULT_MAX_RESOURCE_LIMIT
}

fn default_audit_capacity() -> usize {
    DEFAULT_AUDIT_CAPACITY
}

fn default_active() -> bool {
    true
}

/// Oracle-facing settings of the execution bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeSettings {
    /// Highest resource limit a request may ask for
    #[serde(default = "default_max_resource_limit")]
    pub max_resource_limit: u64,

    /// Off-chain computation source run by the oracle network
    #[serde(default)]
    pub source: String,

    /// Oracle subscription the bridge bills against
    #[serde(default)]
    pub subscription_id: u64,

    /// Oracle network identifier
    #[serde(default)]
    pub don_id: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            max_resource_limit: DEFAULT_MAX_RESOURCE_LIMIT,
            source: String::new(),
            subscription_id: 0,
            don_id: String::new(),
        }
    }
}

impl BridgeSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_resource_limit == 0 || self.max_resource_limit > RESOURCE_LIMIT_HARD_CAP {
            return Err(ConduitError::InvalidLimit {
                limit: self.max_resource_limit,
                max: RESOURCE_LIMIT_HARD_CAP,
            });
        }
        Ok(())
    }
}

/// Agent onboarding entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    pub address: Address,

    pub agent_type: String,

    #[serde(default)]
    pub permissions: Vec<Permission>,

    #[serde(default = "default_active")]
    pub active: bool,
}

/// Deployment configuration (conduit.yaml / conduit.json)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConduitConfig {
    /// Root admin account, granted ADMIN at construction
    pub root_admin: Address,

    /// Bridge owner (defaults to the root admin)
    #[serde(default)]
    pub owner: Option<Address>,

    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,

    #[serde(default)]
    pub bridge: BridgeSettings,

    /// Initial role grants
    #[serde(default)]
    pub grants: BTreeMap<Role, Vec<Address>>,

    /// Agents onboarded at initialization
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

impl ConduitConfig {
    pub fn new(root_admin: Address) -> Self {
        Self {
            root_admin,
            owner: None,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            bridge: BridgeSettings::default(),
            grants: BTreeMap::new(),
            agents: Vec::new(),
        }
    }

    /// Load configuration from a YAML or JSON file (by extension)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        let config = if is_yaml {
            Self::from_yaml_str(&content)?
        } else {
            Self::from_json_str(&content)?
        };
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Effective bridge owner
    pub fn owner(&self) -> Address {
        self.owner.unwrap_or(self.root_admin)
    }

    pub fn validate(&self) -> Result<()> {
        if self.root_admin.is_zero() {
            return Err(ConduitError::Config("rootAdmin must not be the zero address".to_string()));
        }
        if self.owner.is_some_and(|owner| owner.is_zero()) {
            return Err(ConduitError::Config("owner must not be the zero address".to_string()));
        }
        if self.audit_capacity == 0 {
            return Err(ConduitError::Config("auditCapacity must be positive".to_string()));
        }
        self.bridge.validate()?;

        for (role, accounts) in &self.grants {
            if accounts.iter().any(|a| a.is_zero()) {
                return Err(ConduitError::Config(format!(
                    "grant of {} contains the zero address",
                    role
                )));
            }
        }
        for agent in &self.agents {
            if agent.address.is_zero() {
                return Err(ConduitError::Config("agent address must not be zero".to_string()));
            }
        }
        Ok(())
    }
}
