//! Role and permission enumerations
//!
//! Both sets are closed. Each member also has an opaque 32-byte identifier,
//! and lookups by identifier or by name reject anything outside the set.

use crate::error::{ConduitError, EntityKind, Result};
use crate::types::tag_digest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque fixed-size role identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleId([u8; 32]);

impl RoleId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoleId({})", self)
    }
}

impl From<[u8; 32]> for RoleId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// System role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    StrategyAdmin,
    AgentAdmin,
    Pauser,
    Executor,
    Emergency,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::StrategyAdmin,
        Role::AgentAdmin,
        Role::Pauser,
        Role::Executor,
        Role::Emergency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::StrategyAdmin => "STRATEGY_ADMIN",
            Role::AgentAdmin => "AGENT_ADMIN",
            Role::Pauser => "PAUSER",
            Role::Executor => "EXECUTOR",
            Role::Emergency => "EMERGENCY",
        }
    }

    pub fn id(&self) -> RoleId {
        RoleId(tag_digest(&format!("{}_ROLE", self.name())))
    }

    /// Resolve an opaque identifier back to a known role
    pub fn from_id(id: &RoleId) -> Result<Role> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.id() == *id)
            .ok_or_else(|| ConduitError::not_found(EntityKind::Role, id))
    }

    /// Admin role in the default hierarchy
    pub fn default_admin(&self) -> Role {
        match self {
            Role::Executor => Role::StrategyAdmin,
            _ => Role::Admin,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = ConduitError;

    /// Accepts `strategy_admin`, `STRATEGY_ADMIN` and `STRATEGY_ADMIN_ROLE`
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.to_ascii_uppercase();
        let name = upper.strip_suffix("_ROLE").unwrap_or(&upper);
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.name() == name)
            .ok_or_else(|| ConduitError::not_found(EntityKind::Role, s))
    }
}

/// Opaque fixed-size permission identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionId([u8; 32]);

impl PermissionId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermissionId({})", self)
    }
}

/// Strategy-scoped permission held by a registered agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Execute,
    Manage,
}

impl Permission {
    pub const ALL: [Permission; 2] = [Permission::Execute, Permission::Manage];

    pub fn name(&self) -> &'static str {
        match self {
            Permission::Execute => "EXECUTE",
            Permission::Manage => "MANAGE",
        }
    }

    pub fn id(&self) -> PermissionId {
        PermissionId(tag_digest(&format!("{}_PERMISSION", self.name())))
    }

    pub fn from_id(id: &PermissionId) -> Option<Permission> {
        Permission::ALL.iter().copied().find(|p| p.id() == *id)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Permission {
    type Err = ConduitError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.to_ascii_uppercase();
        let name = upper.strip_suffix("_PERMISSION").unwrap_or(&upper);
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.name() == name)
            .ok_or_else(|| ConduitError::InvalidArgument(format!("Unknown permission '{}'", s)))
    }
}
