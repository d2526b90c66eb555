//! ConduitCore - Central wiring of the authorization and dispatch core

use audit::{EventLog, EventStats};
use bridge::{ExecutionBridge, ExecutionRequest};
use rbac::{AccessController, Agent, AgentRegistry, RoleTable};
use router::{Strategy, StrategyRouter};
use serde::{Deserialize, Serialize};
use shared::{
    log_fields, Address, ConduitConfig, ConduitError, EntityKind, Logger, Result, Role,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The four persisted tables in one serializable view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    pub roles: RoleTable,
    pub agents: Vec<Agent>,
    pub strategies: Vec<Strategy>,
    pub requests: Vec<ExecutionRequest>,
}

/// What `initialize` applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitReport {
    pub grants: usize,
    pub agents: usize,
}

/// ConduitCore - owns every component over one shared event log
pub struct ConduitCore {
    logger: Arc<dyn Logger>,
    events: Arc<EventLog>,
    access: Arc<AccessController>,
    agents: Arc<AgentRegistry>,
    router: Arc<StrategyRouter>,
    bridge: Arc<ExecutionBridge>,
    initialized: AtomicBool,
}

impl ConduitCore {
    /// Build all components from the deployment config
    ///
    /// Only construction-time fields are used here (root admin, owner,
    /// audit capacity, bridge settings). Grants and agents are applied by
    /// [`ConduitCore::initialize`].
    pub fn new(config: &ConduitConfig, logger: Arc<dyn Logger>) -> Result<Self> {
        config.validate()?;

        let events = Arc::new(EventLog::new(config.audit_capacity));
        let access = Arc::new(AccessController::new(
            config.root_admin,
            events.clone(),
            logger.clone(),
        )?);
        let agents = Arc::new(AgentRegistry::new(
            access.clone(),
            events.clone(),
            logger.clone(),
        ));
        let router = Arc::new(StrategyRouter::new(
            agents.clone(),
            events.clone(),
            logger.clone(),
        ));
        let bridge = Arc::new(ExecutionBridge::new(
            config.owner(),
            config.bridge.clone(),
            router.clone(),
            events.clone(),
            logger.clone(),
        )?);

        Ok(Self {
            logger,
            events,
            access,
            agents,
            router,
            bridge,
            initialized: AtomicBool::new(false),
        })
    }

    /// Construct and initialize with the root admin as the acting account
    pub fn bootstrap(config: &ConduitConfig, logger: Arc<dyn Logger>) -> Result<Self> {
        let core = Self::new(config, logger)?;
        core.initialize(config.root_admin, config)?;
        Ok(core)
    }

    /// Apply role grants and agent onboarding. Runs at most once.
    ///
    /// Grants are applied closest-to-root first so that a grant of
    /// STRATEGY_ADMIN to `caller` makes a later EXECUTOR grant possible.
    /// The whole config is checked against a simulated role table before
    /// anything is applied; a rejected config leaves no state behind and
    /// does not consume the one-shot.
    pub fn initialize(&self, caller: Address, config: &ConduitConfig) -> Result<InitReport> {
        config.validate()?;
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ConduitError::AlreadyInitialized("conduit core".to_string()));
        }

        let grants = match self.plan_grants(caller, config) {
            Ok(grants) => grants,
            Err(e) => {
                self.initialized.store(false, Ordering::SeqCst);
                self.logger.warn(
                    "Conduit core initialization rejected",
                    Some(&log_fields([
                        ("caller", caller.to_string()),
                        ("reason", e.to_string()),
                    ])),
                );
                return Err(e);
            }
        };

        let mut report = InitReport::default();
        for (role, account) in grants {
            if self.access.grant_role(caller, role, account)? {
                report.grants += 1;
            }
        }

        for agent in &config.agents {
            self.agents.register_agent(caller, agent.address, &agent.agent_type)?;
            if !agent.permissions.is_empty() {
                self.agents
                    .update_agent_permissions(caller, agent.address, &agent.permissions)?;
            }
            if !agent.active {
                self.agents.set_agent_active(caller, agent.address, false)?;
            }
            report.agents += 1;
        }

        self.logger.info(
            "Conduit core initialized",
            Some(&log_fields([
                ("grants", report.grants.to_string()),
                ("agents", report.agents.to_string()),
            ])),
        );
        Ok(report)
    }

    /// Dry run of `initialize`: order the grants and check that each grant and
    /// each agent would be accepted, without touching any component.
    fn plan_grants(&self, caller: Address, config: &ConduitConfig) -> Result<Vec<(Role, Address)>> {
        let table = self.access.snapshot()?;
        let mut members: HashMap<Role, BTreeSet<Address>> = table
            .roles
            .iter()
            .map(|e| (e.role, e.members.iter().copied().collect()))
            .collect();
        let admins: HashMap<Role, Role> = table.roles.iter().map(|e| (e.role, e.admin)).collect();

        let mut depth = HashMap::new();
        for role in Role::ALL {
            depth.insert(role, self.access.admin_chain(role)?.len());
        }
        let mut grants: Vec<(Role, Address)> = config
            .grants
            .iter()
            .flat_map(|(role, accounts)| accounts.iter().map(move |a| (*role, *a)))
            .collect();
        grants.sort_by_key(|(role, _)| depth.get(role).copied().unwrap_or(usize::MAX));

        let holds = |members: &HashMap<Role, BTreeSet<Address>>, role: Role| {
            members.get(&role).map(|m| m.contains(&caller)).unwrap_or(false)
        };

        for (role, account) in &grants {
            if account.is_zero() {
                return Err(ConduitError::ZeroAddress("account"));
            }
            let admin = admins.get(role).copied().unwrap_or_else(|| role.default_admin());
            if !holds(&members, admin) {
                return Err(ConduitError::unauthorized(
                    caller,
                    format!("{} role (admin of {})", admin, role),
                ));
            }
            members.entry(*role).or_default().insert(*account);
        }

        if !config.agents.is_empty()
            && !holds(&members, Role::AgentAdmin)
            && !holds(&members, Role::Admin)
        {
            return Err(ConduitError::unauthorized(caller, "AGENT_ADMIN or ADMIN role"));
        }
        let mut seen = BTreeSet::new();
        for agent in &config.agents {
            if agent.address.is_zero() {
                return Err(ConduitError::ZeroAddress("agent"));
            }
            if agent.agent_type.is_empty() {
                return Err(ConduitError::EmptyIdentifier);
            }
            if !seen.insert(agent.address) || self.agents.is_registered(&agent.address) {
                return Err(ConduitError::already_registered(EntityKind::Agent, agent.address));
            }
        }

        Ok(grants)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    // ========== Components ==========

    pub fn access(&self) -> &Arc<AccessController> {
        &self.access
    }

    pub fn agents(&self) -> &Arc<AgentRegistry> {
        &self.agents
    }

    pub fn router(&self) -> &Arc<StrategyRouter> {
        &self.router
    }

    pub fn bridge(&self) -> &Arc<ExecutionBridge> {
        &self.bridge
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    // ========== Read Surface ==========

    pub fn snapshot(&self) -> Result<SystemSnapshot> {
        Ok(SystemSnapshot {
            roles: self.access.snapshot()?,
            agents: self.agents.snapshot()?,
            strategies: self.router.snapshot()?,
            requests: self.bridge.snapshot()?,
        })
    }

    /// Get audit statistics
    pub fn audit_stats(&self) -> EventStats {
        self.events.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge::{RequestStatus, StrategyAction};
    use router::{ExecutionContext, FnHandler};
    use shared::{
        AgentSpec, ConduitEvent, ErrorKind, EventCategory, NullLogger, Permission, StrategyId,
    };
    use std::io::Write;

    const ROOT: Address = Address::repeat_byte(0x11);
    const PAUSER: Address = Address::repeat_byte(0x22);
    const AGENT: Address = Address::repeat_byte(0x33);
    const OPERATOR: Address = Address::repeat_byte(0x44);
    const IMPL: Address = Address::repeat_byte(0x58);

    fn create_logger() -> Arc<dyn Logger> {
        Arc::new(NullLogger)
    }

    fn create_test_config() -> ConduitConfig {
        let mut config = ConduitConfig::new(ROOT);
        config.grants.insert(Role::Pauser, vec![PAUSER]);
        config.grants.insert(Role::Executor, vec![OPERATOR]);
        config.grants.insert(Role::StrategyAdmin, vec![ROOT]);
        config.agents.push(AgentSpec {
            address: AGENT,
            agent_type: "yield_optimizer".to_string(),
            permissions: vec![Permission::Execute],
            active: true,
        });
        config
    }

    fn register_yield(core: &ConduitCore) {
        let handler = FnHandler::new(IMPL, |_: &ExecutionContext, data: &[u8]| Ok(data.to_vec()));
        core.router()
            .register_strategy(ROOT, "YIELD", Arc::new(handler))
            .unwrap();
    }

    // ============== Construction Tests ==============

    #[test]
    fn test_core_creation() {
        let core = ConduitCore::new(&create_test_config(), create_logger()).unwrap();

        assert!(!core.is_initialized());
        assert!(core.access().has_role(Role::Admin, &ROOT));
        assert_eq!(core.bridge().owner().unwrap(), ROOT);
        assert_eq!(core.events().max_entries(), shared::DEFAULT_AUDIT_CAPACITY);
    }

    #[test]
    fn test_core_rejects_invalid_config() {
        let config = ConduitConfig::new(Address::ZERO);
        let err = ConduitCore::new(&config, create_logger()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_separate_owner() {
        let mut config = create_test_config();
        config.owner = Some(PAUSER);
        let core = ConduitCore::new(&config, create_logger()).unwrap();
        assert_eq!(core.bridge().owner().unwrap(), PAUSER);
    }

    // ============== Initialization Tests ==============

    #[test]
    fn test_initialize_applies_grants_and_agents() {
        let config = create_test_config();
        let core = ConduitCore::new(&config, create_logger()).unwrap();

        let report = core.initialize(ROOT, &config).unwrap();

        assert_eq!(report, InitReport { grants: 3, agents: 1 });
        assert!(core.access().has_role(Role::Pauser, &PAUSER));
        // EXECUTOR needs STRATEGY_ADMIN, granted earlier in the same pass
        assert!(core.access().has_role(Role::Executor, &OPERATOR));
        assert!(core.agents().has_permission(&AGENT, Permission::Execute));
        assert!(core.is_initialized());
    }

    #[test]
    fn test_initialize_twice_fails() {
        let config = create_test_config();
        let core = ConduitCore::bootstrap(&config, create_logger()).unwrap();

        let err = core.initialize(ROOT, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyInitialized);
    }

    #[test]
    fn test_initialize_by_unauthorized_caller() {
        let config = create_test_config();
        let core = ConduitCore::new(&config, create_logger()).unwrap();

        let err = core.initialize(AGENT, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(!core.access().has_role(Role::Pauser, &PAUSER));
    }

    #[test]
    fn test_rejected_initialize_leaves_no_residue() {
        // EXECUTOR is administered by STRATEGY_ADMIN, which nobody is granted
        let mut config = create_test_config();
        config.grants.remove(&Role::StrategyAdmin);
        let core = ConduitCore::new(&config, create_logger()).unwrap();
        let before = core.events().stats().total_entries;

        let err = core.initialize(ROOT, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(!core.access().has_role(Role::Pauser, &PAUSER));
        assert!(!core.agents().is_registered(&AGENT));
        assert!(!core.is_initialized());
        assert_eq!(core.events().stats().total_entries, before);

        // A corrected config can still be applied
        let report = core.initialize(ROOT, &create_test_config()).unwrap();
        assert_eq!(report, InitReport { grants: 3, agents: 1 });
        assert!(core.access().has_role(Role::Executor, &OPERATOR));
        assert!(core.is_initialized());
    }

    #[test]
    fn test_duplicate_agent_in_config_is_rejected_up_front() {
        let mut config = create_test_config();
        let duplicate = config.agents[0].clone();
        config.agents.push(duplicate);
        let core = ConduitCore::new(&config, create_logger()).unwrap();

        let err = core.initialize(ROOT, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyRegistered);
        assert!(!core.access().has_role(Role::Pauser, &PAUSER));
        assert!(!core.agents().is_registered(&AGENT));
        assert!(!core.is_initialized());
    }

    #[test]
    fn test_inactive_agent_from_config() {
        let mut config = create_test_config();
        config.agents[0].active = false;
        let core = ConduitCore::bootstrap(&config, create_logger()).unwrap();

        let agent = core.agents().get_agent(&AGENT).unwrap();
        assert!(!agent.active);
        assert!(!core.agents().has_permission(&AGENT, Permission::Execute));
    }

    #[test]
    fn test_bootstrap_from_yaml_file() {
        let yaml = r#"
rootAdmin: "0x1111111111111111111111111111111111111111"
auditCapacity: 64
bridge:
  maxResourceLimit: 300000
grants:
  PAUSER: ["0x2222222222222222222222222222222222222222"]
agents:
  - address: "0x3333333333333333333333333333333333333333"
    agentType: yield_optimizer
    permissions: [EXECUTE]
"#;
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = ConduitConfig::from_file(file.path()).unwrap();
        let core = ConduitCore::bootstrap(&config, create_logger()).unwrap();

        assert_eq!(core.events().max_entries(), 64);
        assert_eq!(core.bridge().settings().unwrap().max_resource_limit, 300_000);
        assert!(core.agents().has_permission(&AGENT, Permission::Execute));
    }

    // ============== End-to-End Tests ==============

    #[test]
    fn test_submit_process_forward_flow() {
        let core = ConduitCore::bootstrap(&create_test_config(), create_logger()).unwrap();
        register_yield(&core);

        let id = core
            .bridge()
            .submit_strategy_request(AGENT, AGENT, "YIELD", b"rebalance", 500_000)
            .unwrap();
        let result = StrategyAction::new(None, b"deposit").encode().unwrap();
        let outcome = core.bridge().process_response(AGENT, &id, &result).unwrap();

        assert_eq!(outcome.output, Some(b"deposit".to_vec()));
        assert_eq!(outcome.request.status, RequestStatus::Completed);
        assert_eq!(core.router().get_strategy("YIELD").unwrap().executions, 1);

        let events = core.events().events();
        assert!(events.contains(&ConduitEvent::StrategyExecuted {
            id: StrategyId::new("YIELD").unwrap(),
            caller: AGENT,
            success: true,
        }));
        assert!(events.contains(&ConduitEvent::ResponseProcessed {
            id,
            requester: AGENT,
            success: true,
        }));
    }

    #[test]
    fn test_system_pause_end_to_end() {
        let core = ConduitCore::bootstrap(&create_test_config(), create_logger()).unwrap();
        register_yield(&core);
        core.access().pause(PAUSER).unwrap();

        let err = core
            .bridge()
            .submit_request(AGENT, AGENT, b"x", 1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Paused);
        let err = core.router().execute_strategy(AGENT, "YIELD", b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Paused);

        core.access().unpause(PAUSER).unwrap();
        core.router().execute_strategy(AGENT, "YIELD", b"x").unwrap();
    }

    #[test]
    fn test_snapshot_covers_all_tables() {
        let core = ConduitCore::bootstrap(&create_test_config(), create_logger()).unwrap();
        register_yield(&core);
        core.bridge().submit_request(OPERATOR, AGENT, b"x", 10).unwrap();

        let snapshot = core.snapshot().unwrap();
        assert_eq!(snapshot.roles.root_admin, ROOT);
        assert_eq!(snapshot.agents.len(), 1);
        assert_eq!(snapshot.strategies.len(), 1);
        assert_eq!(snapshot.requests.len(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["requests"][0]["submittedBy"], OPERATOR.to_string());

        let back: SystemSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_audit_stats_by_category() {
        let core = ConduitCore::bootstrap(&create_test_config(), create_logger()).unwrap();
        register_yield(&core);

        let stats = core.audit_stats();
        // Admin grant at construction + three grants
        assert_eq!(stats.by_category.get(&EventCategory::Access), Some(&4));
        // Registration + permission update
        assert_eq!(stats.by_category.get(&EventCategory::Agent), Some(&2));
        assert_eq!(stats.by_category.get(&EventCategory::Strategy), Some(&1));
    }

    // ============== Red Team Security Tests ==============

    mod red_team {
        use super::*;

        #[test]
        fn red_team_replayed_initialize_cannot_add_grants() {
            let config = create_test_config();
            let core = ConduitCore::bootstrap(&config, create_logger()).unwrap();

            let mut hostile = config.clone();
            hostile.grants.insert(Role::Admin, vec![AGENT]);
            let err = core.initialize(ROOT, &hostile).unwrap_err();

            assert_eq!(err.kind(), ErrorKind::AlreadyInitialized);
            assert!(!core.access().has_role(Role::Admin, &AGENT));
        }

        #[test]
        fn red_team_agent_cannot_self_complete_other_request() {
            let core = ConduitCore::bootstrap(&create_test_config(), create_logger()).unwrap();
            let id = core.bridge().submit_request(AGENT, AGENT, b"x", 10).unwrap();

            let err = core.bridge().process_response(OPERATOR, &id, b"R").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
        }
    }
}
