//! StrategyRouter - Strategy registry and permission-gated dispatch
//!
//! Strategies are never removed. Each one is either active or paused and
//! can move between the two freely.

use crate::handler::{ExecutionContext, StrategyHandler};
use chrono::{DateTime, Utc};
use rbac::{AccessController, AgentRegistry};
use serde::{Deserialize, Serialize};
use shared::{
    log_fields, Address, ConduitError, ConduitEvent, EntityKind, EventSink, Logger, Permission,
    Result, Role, StrategyId,
};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const MANAGE_ROLES: [Role; 2] = [Role::Admin, Role::StrategyAdmin];

/// Strategy record as exposed by the read API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: StrategyId,
    pub implementation: Address,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub executions: u64,
    pub last_executed_at: Option<DateTime<Utc>>,
}

struct StrategyEntry {
    record: Strategy,
    handler: Arc<dyn StrategyHandler>,
}

/// StrategyRouter owns the strategy registry
pub struct StrategyRouter {
    strategies: RwLock<BTreeMap<StrategyId, StrategyEntry>>,
    agents: Arc<AgentRegistry>,
    access: Arc<AccessController>,
    events: Arc<dyn EventSink>,
    logger: Arc<dyn Logger>,
}

impl StrategyRouter {
    pub fn new(
        agents: Arc<AgentRegistry>,
        events: Arc<dyn EventSink>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let access = agents.access().clone();
        Self {
            strategies: RwLock::new(BTreeMap::new()),
            agents,
            access,
            events,
            logger,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<StrategyId, StrategyEntry>>> {
        self.strategies
            .read()
            .map_err(|_| ConduitError::Internal("strategy table lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<StrategyId, StrategyEntry>>> {
        self.strategies
            .write()
            .map_err(|_| ConduitError::Internal("strategy table lock poisoned".to_string()))
    }

    // ========== Authorization ==========

    /// ADMIN or STRATEGY_ADMIN role, or an agent holding MANAGE
    pub fn can_manage(&self, account: &Address) -> bool {
        self.access.has_any_role(&MANAGE_ROLES, account)
            || self.agents.has_permission(account, Permission::Manage)
    }

    /// An agent holding EXECUTE, or an account holding the EXECUTOR role
    pub fn can_execute(&self, account: &Address) -> bool {
        self.agents.has_permission(account, Permission::Execute)
            || self.access.has_role(Role::Executor, account)
    }

    fn ensure_manager(&self, operation: &str, caller: Address) -> Result<()> {
        if self.can_manage(&caller) {
            return Ok(());
        }
        self.logger.warn(
            &format!("{} denied", operation),
            Some(&log_fields([("caller", caller.to_string())])),
        );
        Err(ConduitError::unauthorized(
            caller,
            "ADMIN or STRATEGY_ADMIN role, or MANAGE permission",
        ))
    }

    // ========== Registry Management ==========

    /// Register a new strategy. It starts active.
    pub fn register_strategy(
        &self,
        caller: Address,
        id: &str,
        handler: Arc<dyn StrategyHandler>,
    ) -> Result<()> {
        let id = StrategyId::new(id)?;
        let implementation = handler.address();
        if implementation.is_zero() {
            return Err(ConduitError::ZeroAddress("strategy implementation"));
        }
        self.ensure_manager("register_strategy", caller)?;

        let mut strategies = self.write()?;
        if strategies.contains_key(&id) {
            return Err(ConduitError::already_registered(EntityKind::Strategy, &id));
        }

        let now = Utc::now();
        strategies.insert(
            id.clone(),
            StrategyEntry {
                record: Strategy {
                    id: id.clone(),
                    implementation,
                    active: true,
                    registered_at: now,
                    updated_at: now,
                    executions: 0,
                    last_executed_at: None,
                },
                handler,
            },
        );
        self.events.emit(ConduitEvent::StrategyRegistered {
            id: id.clone(),
            implementation,
        });
        drop(strategies);

        self.logger.info(
            &format!("Strategy '{}' registered", id),
            Some(&log_fields([("implementation", implementation.to_string())])),
        );
        Ok(())
    }

    /// Swap the implementation, keeping the id and active flag
    pub fn update_strategy(
        &self,
        caller: Address,
        id: &str,
        handler: Arc<dyn StrategyHandler>,
    ) -> Result<()> {
        let new_implementation = handler.address();
        if new_implementation.is_zero() {
            return Err(ConduitError::ZeroAddress("strategy implementation"));
        }
        self.ensure_manager("update_strategy", caller)?;

        let mut strategies = self.write()?;
        let entry = strategies
            .get_mut(id)
            .ok_or_else(|| ConduitError::not_found(EntityKind::Strategy, id))?;

        let old_implementation = entry.record.implementation;
        entry.record.implementation = new_implementation;
        entry.record.updated_at = Utc::now();
        entry.handler = handler;
        let id = entry.record.id.clone();
        self.events.emit(ConduitEvent::StrategyUpdated {
            id: id.clone(),
            old_implementation,
            new_implementation,
        });
        drop(strategies);

        self.logger.info(
            &format!("Strategy '{}' updated", id),
            Some(&log_fields([
                ("old_implementation", old_implementation.to_string()),
                ("new_implementation", new_implementation.to_string()),
            ])),
        );
        Ok(())
    }

    pub fn pause_strategy(&self, caller: Address, id: &str) -> Result<()> {
        self.set_active("pause_strategy", caller, id, false)
    }

    pub fn unpause_strategy(&self, caller: Address, id: &str) -> Result<()> {
        self.set_active("unpause_strategy", caller, id, true)
    }

    fn set_active(&self, operation: &str, caller: Address, id: &str, active: bool) -> Result<()> {
        self.ensure_manager(operation, caller)?;

        let mut strategies = self.write()?;
        let entry = strategies
            .get_mut(id)
            .ok_or_else(|| ConduitError::not_found(EntityKind::Strategy, id))?;
        if entry.record.active == active {
            return Ok(());
        }
        entry.record.active = active;
        entry.record.updated_at = Utc::now();
        let id = entry.record.id.clone();
        self.events.emit(ConduitEvent::StrategyStatusChanged {
            id: id.clone(),
            active,
        });
        drop(strategies);

        self.logger.info(
            &format!(
                "Strategy '{}' {}",
                id,
                if active { "unpaused" } else { "paused" }
            ),
            Some(&log_fields([("caller", caller.to_string())])),
        );
        Ok(())
    }

    // ========== Execution ==========

    /// Execute a registered strategy on behalf of `caller`
    ///
    /// Checks run in order: existence, system pause, strategy pause,
    /// caller authorization. A handler failure becomes `ExecutionFailed`.
    pub fn execute_strategy(&self, caller: Address, id: &str, data: &[u8]) -> Result<Vec<u8>> {
        let (strategy, handler) = {
            let strategies = self.read()?;
            let entry = strategies
                .get(id)
                .ok_or_else(|| ConduitError::not_found(EntityKind::Strategy, id))?;

            self.access.ensure_not_paused()?;
            if !entry.record.active {
                self.logger.warn(
                    &format!("Execution of paused strategy '{}' rejected", id),
                    Some(&log_fields([("caller", caller.to_string())])),
                );
                return Err(ConduitError::Paused(format!("strategy '{}'", id)));
            }
            (entry.record.id.clone(), entry.handler.clone())
        };

        if !self.can_execute(&caller) {
            self.logger.warn(
                "execute_strategy denied",
                Some(&log_fields([
                    ("caller", caller.to_string()),
                    ("strategy", strategy.to_string()),
                ])),
            );
            return Err(ConduitError::unauthorized(
                caller,
                "EXECUTE permission or EXECUTOR role",
            ));
        }

        let ctx = ExecutionContext {
            strategy: strategy.clone(),
            caller,
        };
        let output = handler.execute(&ctx, data).map_err(|reason| {
            self.logger.warn(
                &format!("Strategy '{}' failed", strategy),
                Some(&log_fields([
                    ("caller", caller.to_string()),
                    ("reason", reason.clone()),
                ])),
            );
            ConduitError::ExecutionFailed {
                strategy: strategy.to_string(),
                reason,
            }
        })?;

        {
            let mut strategies = self.write()?;
            if let Some(entry) = strategies.get_mut(id) {
                entry.record.executions += 1;
                entry.record.last_executed_at = Some(Utc::now());
            }
            self.events.emit(ConduitEvent::StrategyExecuted {
                id: strategy.clone(),
                caller,
                success: true,
            });
        }

        self.logger.info(
            &format!("Strategy '{}' executed", strategy),
            Some(&log_fields([("caller", caller.to_string())])),
        );
        Ok(output)
    }

    /// Pre-flight check. False for unknown or paused strategies, never an error.
    pub fn validate_operation(&self, id: &str, data: &[u8]) -> bool {
        let handler = match self.read() {
            Ok(strategies) => match strategies.get(id) {
                Some(entry) if entry.record.active => entry.handler.clone(),
                _ => return false,
            },
            Err(_) => return false,
        };
        handler.validate(data)
    }

    // ========== Queries ==========

    pub fn is_active(&self, id: &str) -> Result<bool> {
        self.read()?
            .get(id)
            .map(|e| e.record.active)
            .ok_or_else(|| ConduitError::not_found(EntityKind::Strategy, id))
    }

    pub fn implementation_of(&self, id: &str) -> Result<Address> {
        self.read()?
            .get(id)
            .map(|e| e.record.implementation)
            .ok_or_else(|| ConduitError::not_found(EntityKind::Strategy, id))
    }

    pub fn get_strategy(&self, id: &str) -> Result<Strategy> {
        self.read()?
            .get(id)
            .map(|e| e.record.clone())
            .ok_or_else(|| ConduitError::not_found(EntityKind::Strategy, id))
    }

    /// Registered strategy ids, sorted
    pub fn strategies(&self) -> Result<Vec<StrategyId>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    pub fn snapshot(&self) -> Result<Vec<Strategy>> {
        Ok(self.read()?.values().map(|e| e.record.clone()).collect())
    }

    pub fn agents(&self) -> &Arc<AgentRegistry> {
        &self.agents
    }

    pub fn access(&self) -> &Arc<AccessController> {
        &self.access
    }
}
