//! AgentRegistry - Recognized agents and their strategy-scoped permissions
//!
//! Agent permissions are a separate axis from roles: roles only decide who
//! may act as registrar.

use crate::access_controller::AccessController;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    log_fields, Address, ConduitError, ConduitEvent, EntityKind, EventSink, Logger, Permission,
    Result, Role,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const REGISTRAR_ROLES: [Role; 2] = [Role::AgentAdmin, Role::Admin];

/// Registered agent record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub address: Address,
    pub agent_type: String,
    pub permissions: BTreeSet<Permission>,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Whether the agent currently holds `permission`. Inactive agents hold nothing.
    pub fn allows(&self, permission: Permission) -> bool {
        self.active && self.permissions.contains(&permission)
    }
}

/// AgentRegistry owns agent records
pub struct AgentRegistry {
    agents: RwLock<BTreeMap<Address, Agent>>,
    access: Arc<AccessController>,
    events: Arc<dyn EventSink>,
    logger: Arc<dyn Logger>,
}

impl AgentRegistry {
    pub fn new(
        access: Arc<AccessController>,
        events: Arc<dyn EventSink>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            agents: RwLock::new(BTreeMap::new()),
            access,
            events,
            logger,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Address, Agent>>> {
        self.agents
            .read()
            .map_err(|_| ConduitError::Internal("agent table lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Address, Agent>>> {
        self.agents
            .write()
            .map_err(|_| ConduitError::Internal("agent table lock poisoned".to_string()))
    }

    fn ensure_registrar(&self, operation: &str, caller: Address) -> Result<()> {
        if self.access.has_any_role(&REGISTRAR_ROLES, &caller) {
            return Ok(());
        }
        self.logger.warn(
            &format!("{} denied", operation),
            Some(&log_fields([("caller", caller.to_string())])),
        );
        Err(ConduitError::unauthorized(caller, "AGENT_ADMIN or ADMIN role"))
    }

    /// Register a new agent with an empty permission set
    pub fn register_agent(&self, caller: Address, address: Address, agent_type: &str) -> Result<()> {
        if address.is_zero() {
            return Err(ConduitError::ZeroAddress("agent"));
        }
        if agent_type.is_empty() {
            return Err(ConduitError::EmptyIdentifier);
        }
        self.ensure_registrar("register_agent", caller)?;

        let mut agents = self.write()?;
        if agents.contains_key(&address) {
            return Err(ConduitError::already_registered(EntityKind::Agent, address));
        }

        let now = Utc::now();
        agents.insert(
            address,
            Agent {
                address,
                agent_type: agent_type.to_string(),
                permissions: BTreeSet::new(),
                active: true,
                registered_at: now,
                updated_at: now,
            },
        );
        self.events.emit(ConduitEvent::AgentRegistered {
            agent: address,
            agent_type: agent_type.to_string(),
        });
        drop(agents);

        self.logger.info(
            "Agent registered",
            Some(&log_fields([
                ("agent", address.to_string()),
                ("type", agent_type.to_string()),
            ])),
        );
        Ok(())
    }

    /// Replace the agent's permission set wholesale
    pub fn update_agent_permissions(
        &self,
        caller: Address,
        address: Address,
        permissions: &[Permission],
    ) -> Result<()> {
        self.ensure_registrar("update_agent_permissions", caller)?;

        let mut agents = self.write()?;
        let agent = agents
            .get_mut(&address)
            .ok_or_else(|| ConduitError::not_found(EntityKind::Agent, address))?;

        agent.permissions = permissions.iter().copied().collect();
        agent.updated_at = Utc::now();
        let stored: Vec<Permission> = agent.permissions.iter().copied().collect();
        let names = stored.iter().map(|p| p.name()).collect::<Vec<_>>().join(",");
        self.events.emit(ConduitEvent::AgentPermissionsUpdated {
            agent: address,
            permissions: stored,
        });
        drop(agents);

        self.logger.info(
            "Agent permissions updated",
            Some(&log_fields([
                ("agent", address.to_string()),
                ("permissions", names),
            ])),
        );
        Ok(())
    }

    /// Activate or deactivate an agent without touching its permissions
    pub fn set_agent_active(&self, caller: Address, address: Address, active: bool) -> Result<()> {
        self.ensure_registrar("set_agent_active", caller)?;

        let mut agents = self.write()?;
        let agent = agents
            .get_mut(&address)
            .ok_or_else(|| ConduitError::not_found(EntityKind::Agent, address))?;
        if agent.active == active {
            return Ok(());
        }
        agent.active = active;
        agent.updated_at = Utc::now();
        self.events.emit(ConduitEvent::AgentStatusChanged {
            agent: address,
            active,
        });
        drop(agents);

        self.logger.info(
            if active { "Agent activated" } else { "Agent deactivated" },
            Some(&log_fields([("agent", address.to_string())])),
        );
        Ok(())
    }

    // ========== Queries ==========

    /// Read-only permission check. Unknown or inactive agents answer false.
    pub fn has_permission(&self, address: &Address, permission: Permission) -> bool {
        self.read()
            .map(|agents| {
                agents
                    .get(address)
                    .map(|a| a.allows(permission))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.read()
            .map(|agents| agents.contains_key(address))
            .unwrap_or(false)
    }

    pub fn get_agent(&self, address: &Address) -> Result<Agent> {
        self.read()?
            .get(address)
            .cloned()
            .ok_or_else(|| ConduitError::not_found(EntityKind::Agent, address))
    }

    /// Addresses of all registered agents
    pub fn agents(&self) -> Result<Vec<Address>> {
        Ok(self.read()?.keys().copied().collect())
    }

    pub fn snapshot(&self) -> Result<Vec<Agent>> {
        Ok(self.read()?.values().cloned().collect())
    }

    pub fn access(&self) -> &Arc<AccessController> {
        &self.access
    }
}
