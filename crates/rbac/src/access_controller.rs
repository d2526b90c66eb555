//! AccessController - Role membership, admin hierarchy and system pause

use serde::{Deserialize, Serialize};
use shared::{
    log_fields, Address, ConduitError, ConduitEvent, EventSink, Logger, Result, Role,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct AccessState {
    members: HashMap<Role, BTreeSet<Address>>,
    admins: HashMap<Role, Role>,
    root_admin: Address,
    paused: bool,
}

impl AccessState {
    fn holds(&self, role: Role, account: &Address) -> bool {
        self.members
            .get(&role)
            .map(|m| m.contains(account))
            .unwrap_or(false)
    }

    fn admin_of(&self, role: Role) -> Role {
        self.admins.get(&role).copied().unwrap_or_else(|| role.default_admin())
    }
}

/// Walk the admin relation from `role` until a self-administered role is found.
///
/// Returns `None` if no such role is reached within `Role::ALL.len()` hops.
fn resolve_admin_chain(admins: &HashMap<Role, Role>, role: Role) -> Option<Vec<Role>> {
    let mut chain = vec![role];
    let mut current = role;

    for _ in 0..Role::ALL.len() {
        let next = admins.get(&current).copied().unwrap_or_else(|| current.default_admin());
        if next == current {
            return Some(chain);
        }
        chain.push(next);
        current = next;
    }

    None
}

/// One row of the role table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleEntry {
    pub role: Role,
    pub admin: Role,
    pub members: Vec<Address>,
}

/// Read-only view of the whole role table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleTable {
    pub root_admin: Address,
    pub paused: bool,
    pub roles: Vec<RoleEntry>,
}

/// AccessController owns the role → account mapping
pub struct AccessController {
    state: RwLock<AccessState>,
    events: Arc<dyn EventSink>,
    logger: Arc<dyn Logger>,
}

impl AccessController {
    /// Create a new AccessController with `root_admin` holding ADMIN
    pub fn new(
        root_admin: Address,
        events: Arc<dyn EventSink>,
        logger: Arc<dyn Logger>,
    ) -> Result<Self> {
        if root_admin.is_zero() {
            return Err(ConduitError::InvalidArgument(
                "initial admin must not be the zero address".to_string(),
            ));
        }

        let admins = Role::ALL.iter().map(|r| (*r, r.default_admin())).collect();
        let mut members: HashMap<Role, BTreeSet<Address>> = HashMap::new();
        members.entry(Role::Admin).or_default().insert(root_admin);

        let controller = Self {
            state: RwLock::new(AccessState {
                members,
                admins,
                root_admin,
                paused: false,
            }),
            events,
            logger,
        };

        controller.events.emit(ConduitEvent::RoleGranted {
            role: Role::Admin,
            account: root_admin,
            sender: root_admin,
        });
        controller.logger.info(
            "Access controller initialized",
            Some(&log_fields([("root_admin", root_admin.to_string())])),
        );

        Ok(controller)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, AccessState>> {
        self.state
            .read()
            .map_err(|_| ConduitError::Internal("access state lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, AccessState>> {
        self.state
            .write()
            .map_err(|_| ConduitError::Internal("access state lock poisoned".to_string()))
    }

    fn deny(&self, operation: &str, caller: Address, requirement: String) -> ConduitError {
        self.logger.warn(
            &format!("{} denied", operation),
            Some(&log_fields([
                ("caller", caller.to_string()),
                ("requires", requirement.clone()),
            ])),
        );
        ConduitError::unauthorized(caller, requirement)
    }

    // ========== Role Administration ==========

    /// Grant `role` to `account`. Returns whether membership changed.
    pub fn grant_role(&self, caller: Address, role: Role, account: Address) -> Result<bool> {
        if account.is_zero() {
            return Err(ConduitError::ZeroAddress("account"));
        }

        let mut state = self.write()?;
        let admin = state.admin_of(role);
        if !state.holds(admin, &caller) {
            return Err(self.deny("grant_role", caller, format!("{} role (admin of {})", admin, role)));
        }

        let changed = state.members.entry(role).or_default().insert(account);
        if changed {
            self.events.emit(ConduitEvent::RoleGranted {
                role,
                account,
                sender: caller,
            });
            drop(state);
            self.logger.info(
                &format!("Role '{}' granted", role),
                Some(&log_fields([
                    ("account", account.to_string()),
                    ("sender", caller.to_string()),
                ])),
            );
        }
        Ok(changed)
    }

    /// Revoke `role` from `account`. Returns whether membership changed.
    pub fn revoke_role(&self, caller: Address, role: Role, account: Address) -> Result<bool> {
        let mut state = self.write()?;
        let admin = state.admin_of(role);
        if !state.holds(admin, &caller) {
            return Err(self.deny("revoke_role", caller, format!("{} role (admin of {})", admin, role)));
        }
        if role == Role::Admin && account == state.root_admin {
            return Err(ConduitError::InvalidArgument(
                "the root admin cannot lose the ADMIN role; transfer it first".to_string(),
            ));
        }

        let changed = state
            .members
            .get_mut(&role)
            .map(|m| m.remove(&account))
            .unwrap_or(false);
        if changed {
            self.events.emit(ConduitEvent::RoleRevoked {
                role,
                account,
                sender: caller,
            });
            drop(state);
            self.logger.info(
                &format!("Role '{}' revoked", role),
                Some(&log_fields([
                    ("account", account.to_string()),
                    ("sender", caller.to_string()),
                ])),
            );
        }
        Ok(changed)
    }

    /// Drop a role held by the caller itself
    pub fn renounce_role(&self, caller: Address, role: Role) -> Result<bool> {
        let mut state = self.write()?;
        if role == Role::Admin && caller == state.root_admin {
            return Err(ConduitError::InvalidArgument(
                "the root admin cannot renounce the ADMIN role".to_string(),
            ));
        }

        let changed = state
            .members
            .get_mut(&role)
            .map(|m| m.remove(&caller))
            .unwrap_or(false);
        if changed {
            self.events.emit(ConduitEvent::RoleRevoked {
                role,
                account: caller,
                sender: caller,
            });
        }
        Ok(changed)
    }

    /// Change the admin role of `role`. Restricted to ADMIN holders.
    pub fn set_role_admin(&self, caller: Address, role: Role, new_admin: Role) -> Result<()> {
        let mut state = self.write()?;
        if !state.holds(Role::Admin, &caller) {
            return Err(self.deny("set_role_admin", caller, format!("{} role", Role::Admin)));
        }

        let mut candidate = state.admins.clone();
        candidate.insert(role, new_admin);
        if let Some(stuck) = Role::ALL
            .iter()
            .copied()
            .find(|r| resolve_admin_chain(&candidate, *r).is_none())
        {
            return Err(ConduitError::InvalidArgument(format!(
                "setting {} as admin of {} leaves {} without a root admin",
                new_admin, role, stuck
            )));
        }

        let previous_admin = state.admin_of(role);
        state.admins = candidate;
        self.events.emit(ConduitEvent::RoleAdminChanged {
            role,
            previous_admin,
            new_admin,
        });
        drop(state);

        self.logger.info(
            &format!("Admin of '{}' changed", role),
            Some(&log_fields([
                ("previous_admin", previous_admin.to_string()),
                ("new_admin", new_admin.to_string()),
            ])),
        );
        Ok(())
    }

    /// Move the root admin distinction to another account
    pub fn transfer_root_admin(&self, caller: Address, new_root: Address) -> Result<()> {
        if new_root.is_zero() {
            return Err(ConduitError::ZeroAddress("root admin"));
        }

        let mut state = self.write()?;
        if caller != state.root_admin {
            return Err(self.deny("transfer_root_admin", caller, "root admin".to_string()));
        }

        let previous = state.root_admin;
        let granted = state.members.entry(Role::Admin).or_default().insert(new_root);
        state.root_admin = new_root;
        if granted {
            self.events.emit(ConduitEvent::RoleGranted {
                role: Role::Admin,
                account: new_root,
                sender: caller,
            });
        }
        self.events.emit(ConduitEvent::RootAdminTransferred {
            previous,
            new: new_root,
        });
        drop(state);

        self.logger.info(
            "Root admin transferred",
            Some(&log_fields([
                ("previous", previous.to_string()),
                ("new", new_root.to_string()),
            ])),
        );
        Ok(())
    }

    // ========== System Pause ==========

    /// Pause the system. PAUSER only.
    pub fn pause(&self, caller: Address) -> Result<()> {
        let mut state = self.write()?;
        if !state.holds(Role::Pauser, &caller) {
            return Err(self.deny("pause", caller, format!("{} role", Role::Pauser)));
        }
        if state.paused {
            return Err(ConduitError::AlreadyProcessed("system pause".to_string()));
        }
        state.paused = true;
        self.events.emit(ConduitEvent::SystemPaused { account: caller });
        drop(state);

        self.logger.warn(
            "System paused",
            Some(&log_fields([("account", caller.to_string())])),
        );
        Ok(())
    }

    /// Lift the system pause. PAUSER only.
    pub fn unpause(&self, caller: Address) -> Result<()> {
        let mut state = self.write()?;
        if !state.holds(Role::Pauser, &caller) {
            return Err(self.deny("unpause", caller, format!("{} role", Role::Pauser)));
        }
        if !state.paused {
            return Err(ConduitError::AlreadyProcessed("system unpause".to_string()));
        }
        state.paused = false;
        self.events.emit(ConduitEvent::SystemUnpaused { account: caller });
        drop(state);

        self.logger.info(
            "System unpaused",
            Some(&log_fields([("account", caller.to_string())])),
        );
        Ok(())
    }

    /// Whether the system is paused. A poisoned lock reads as paused.
    pub fn is_paused(&self) -> bool {
        self.read().map(|s| s.paused).unwrap_or(true)
    }

    pub fn ensure_not_paused(&self) -> Result<()> {
        if self.read()?.paused {
            return Err(ConduitError::Paused("system".to_string()));
        }
        Ok(())
    }

    // ========== Queries ==========

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.read().map(|s| s.holds(role, account)).unwrap_or(false)
    }

    /// True if `account` holds at least one of `roles` (false for an empty slice)
    pub fn has_any_role(&self, roles: &[Role], account: &Address) -> bool {
        self.read()
            .map(|s| roles.iter().any(|r| s.holds(*r, account)))
            .unwrap_or(false)
    }

    /// True if `account` holds every role in `roles` (true for an empty slice)
    pub fn has_all_roles(&self, roles: &[Role], account: &Address) -> bool {
        self.read()
            .map(|s| roles.iter().all(|r| s.holds(*r, account)))
            .unwrap_or(false)
    }

    pub fn admin_of(&self, role: Role) -> Result<Role> {
        Ok(self.read()?.admin_of(role))
    }

    /// Admin chain from `role` up to its self-administered root, inclusive
    pub fn admin_chain(&self, role: Role) -> Result<Vec<Role>> {
        let state = self.read()?;
        resolve_admin_chain(&state.admins, role).ok_or_else(|| {
            ConduitError::Internal(format!("admin hierarchy of {} does not resolve", role))
        })
    }

    pub fn root_admin(&self) -> Result<Address> {
        Ok(self.read()?.root_admin)
    }

    pub fn members(&self, role: Role) -> Result<Vec<Address>> {
        let state = self.read()?;
        Ok(state
            .members
            .get(&role)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default())
    }

    pub fn roles_of(&self, account: &Address) -> Result<Vec<Role>> {
        let state = self.read()?;
        Ok(Role::ALL
            .iter()
            .copied()
            .filter(|r| state.holds(*r, account))
            .collect())
    }

    pub fn snapshot(&self) -> Result<RoleTable> {
        let state = self.read()?;
        let roles = Role::ALL
            .iter()
            .map(|role| RoleEntry {
                role: *role,
                admin: state.admin_of(*role),
                members: state
                    .members
                    .get(role)
                    .map(|m| m.iter().copied().collect())
                    .unwrap_or_default(),
            })
            .collect();

        Ok(RoleTable {
            root_admin: state.root_admin,
            paused: state.paused,
            roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit::EventLog;
    use shared::{ErrorKind, NullLogger};

    const ROOT: Address = Address::repeat_byte(0x01);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);

    fn setup() -> (AccessController, Arc<EventLog>) {
        let log = Arc::new(EventLog::default());
        let controller = AccessController::new(ROOT, log.clone(), Arc::new(NullLogger)).unwrap();
        (controller, log)
    }

    // ============== Construction Tests ==============

    #[test]
    fn test_construction_grants_admin() {
        let (controller, log) = setup();

        assert!(controller.has_role(Role::Admin, &ROOT));
        assert_eq!(controller.root_admin().unwrap(), ROOT);
        assert!(!controller.is_paused());
        assert_eq!(log.stats().total_entries, 1);
    }

    #[test]
    fn test_construction_rejects_zero_admin() {
        let log = Arc::new(EventLog::default());
        let result = AccessController::new(Address::ZERO, log.clone(), Arc::new(NullLogger));

        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InvalidArgument));
        // No state created, nothing emitted
        assert_eq!(log.stats().total_entries, 0);
    }

    // ============== Grant / Revoke Tests ==============

    #[test]
    fn test_admin_can_grant_and_revoke() {
        let (controller, log) = setup();

        assert!(controller.grant_role(ROOT, Role::Pauser, ALICE).unwrap());
        assert!(controller.has_role(Role::Pauser, &ALICE));

        assert!(controller.revoke_role(ROOT, Role::Pauser, ALICE).unwrap());
        assert!(!controller.has_role(Role::Pauser, &ALICE));

        let events = log.events();
        assert!(events.contains(&ConduitEvent::RoleGranted {
            role: Role::Pauser,
            account: ALICE,
            sender: ROOT,
        }));
        assert!(events.contains(&ConduitEvent::RoleRevoked {
            role: Role::Pauser,
            account: ALICE,
            sender: ROOT,
        }));
    }

    #[test]
    fn test_grant_requires_admin_role_for_every_role() {
        let (controller, _) = setup();

        for role in Role::ALL {
            let err = controller.grant_role(BOB, role, ALICE).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthorized, "grant of {} by outsider", role);

            let err = controller.revoke_role(BOB, role, ALICE).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthorized, "revoke of {} by outsider", role);
        }
    }

    #[test]
    fn test_executor_administered_by_strategy_admin() {
        let (controller, _) = setup();
        controller.grant_role(ROOT, Role::StrategyAdmin, ALICE).unwrap();

        // ALICE (STRATEGY_ADMIN) administers EXECUTOR
        assert!(controller.grant_role(ALICE, Role::Executor, BOB).unwrap());
        assert!(controller.has_role(Role::Executor, &BOB));

        // ROOT holds ADMIN but not STRATEGY_ADMIN
        let err = controller.revoke_role(ROOT, Role::Executor, BOB).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        // ALICE cannot grant roles administered by ADMIN
        let err = controller.grant_role(ALICE, Role::Pauser, BOB).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_duplicate_grant_is_noop() {
        let (controller, log) = setup();

        assert!(controller.grant_role(ROOT, Role::Pauser, ALICE).unwrap());
        assert!(!controller.grant_role(ROOT, Role::Pauser, ALICE).unwrap());

        // construction + one grant
        assert_eq!(log.stats().total_entries, 2);
    }

    #[test]
    fn test_grant_to_zero_address() {
        let (controller, _) = setup();
        let err = controller.grant_role(ROOT, Role::Pauser, Address::ZERO).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ZeroAddress);
    }

    #[test]
    fn test_root_admin_cannot_be_revoked() {
        let (controller, _) = setup();
        controller.grant_role(ROOT, Role::Admin, ALICE).unwrap();

        let err = controller.revoke_role(ALICE, Role::Admin, ROOT).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(controller.has_role(Role::Admin, &ROOT));

        let err = controller.renounce_role(ROOT, Role::Admin).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_renounce_own_role() {
        let (controller, _) = setup();
        controller.grant_role(ROOT, Role::Emergency, ALICE).unwrap();

        assert!(controller.renounce_role(ALICE, Role::Emergency).unwrap());
        assert!(!controller.has_role(Role::Emergency, &ALICE));
        assert!(!controller.renounce_role(ALICE, Role::Emergency).unwrap());
    }

    #[test]
    fn test_transfer_root_admin() {
        let (controller, _) = setup();

        let err = controller.transfer_root_admin(ROOT, Address::ZERO).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ZeroAddress);

        let err = controller.transfer_root_admin(ALICE, BOB).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        controller.transfer_root_admin(ROOT, ALICE).unwrap();
        assert_eq!(controller.root_admin().unwrap(), ALICE);
        assert!(controller.has_role(Role::Admin, &ALICE));

        // The previous root is now an ordinary admin and may be revoked
        assert!(controller.revoke_role(ALICE, Role::Admin, ROOT).unwrap());
    }

    // ============== Role Admin Hierarchy Tests ==============

    #[test]
    fn test_default_admin_chain() {
        let (controller, _) = setup();

        assert_eq!(
            controller.admin_chain(Role::Executor).unwrap(),
            vec![Role::Executor, Role::StrategyAdmin, Role::Admin]
        );
        assert_eq!(controller.admin_chain(Role::Admin).unwrap(), vec![Role::Admin]);
    }

    #[test]
    fn test_set_role_admin_emits_old_and_new() {
        let (controller, log) = setup();

        controller.set_role_admin(ROOT, Role::Pauser, Role::Emergency).unwrap();

        assert_eq!(controller.admin_of(Role::Pauser).unwrap(), Role::Emergency);
        assert!(log.events().contains(&ConduitEvent::RoleAdminChanged {
            role: Role::Pauser,
            previous_admin: Role::Admin,
            new_admin: Role::Emergency,
        }));

        // EMERGENCY holders now administer PAUSER
        controller.grant_role(ROOT, Role::Emergency, ALICE).unwrap();
        assert!(controller.grant_role(ALICE, Role::Pauser, BOB).unwrap());
    }

    #[test]
    fn test_set_role_admin_requires_admin() {
        let (controller, _) = setup();
        controller.grant_role(ROOT, Role::StrategyAdmin, ALICE).unwrap();

        let err = controller.set_role_admin(ALICE, Role::Executor, Role::Pauser).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_set_role_admin_rejects_cycle() {
        let (controller, log) = setup();
        let before = log.stats().total_entries;

        // ADMIN -> PAUSER -> ADMIN has no self-administered root
        let err = controller.set_role_admin(ROOT, Role::Admin, Role::Pauser).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(controller.admin_of(Role::Admin).unwrap(), Role::Admin);
        assert_eq!(log.stats().total_entries, before);
    }

    #[test]
    fn test_every_role_resolves_after_valid_change() {
        let (controller, _) = setup();
        controller.set_role_admin(ROOT, Role::AgentAdmin, Role::StrategyAdmin).unwrap();

        for role in Role::ALL {
            let chain = controller.admin_chain(role).unwrap();
            assert!(chain.len() <= Role::ALL.len());
            assert_eq!(*chain.last().unwrap(), Role::Admin);
        }
    }

    // ============== Query Tests ==============

    #[test]
    fn test_has_any_and_all_roles() {
        let (controller, _) = setup();
        controller.grant_role(ROOT, Role::Pauser, ALICE).unwrap();

        assert!(controller.has_any_role(&[Role::Pauser, Role::Emergency], &ALICE));
        assert!(!controller.has_all_roles(&[Role::Pauser, Role::Emergency], &ALICE));
        assert!(controller.has_all_roles(&[Role::Pauser], &ALICE));

        assert!(!controller.has_any_role(&[], &ALICE));
        assert!(controller.has_all_roles(&[], &ALICE));
    }

    #[test]
    fn test_members_and_roles_of() {
        let (controller, _) = setup();
        controller.grant_role(ROOT, Role::Pauser, ALICE).unwrap();
        controller.grant_role(ROOT, Role::Pauser, BOB).unwrap();
        controller.grant_role(ROOT, Role::Emergency, ALICE).unwrap();

        assert_eq!(controller.members(Role::Pauser).unwrap().len(), 2);
        assert_eq!(
            controller.roles_of(&ALICE).unwrap(),
            vec![Role::Pauser, Role::Emergency]
        );
        assert!(controller.roles_of(&Address::repeat_byte(0x99)).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot() {
        let (controller, _) = setup();
        controller.grant_role(ROOT, Role::Pauser, ALICE).unwrap();

        let table = controller.snapshot().unwrap();
        assert_eq!(table.root_admin, ROOT);
        assert_eq!(table.roles.len(), Role::ALL.len());

        let pauser = table.roles.iter().find(|e| e.role == Role::Pauser).unwrap();
        assert_eq!(pauser.members, vec![ALICE]);
        assert_eq!(pauser.admin, Role::Admin);

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["rootAdmin"], ROOT.to_string());
    }

    // ============== Pause Tests ==============

    #[test]
    fn test_pause_requires_pauser() {
        let (controller, _) = setup();

        // ADMIN alone cannot pause
        let err = controller.pause(ROOT).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        controller.grant_role(ROOT, Role::Pauser, ALICE).unwrap();
        controller.pause(ALICE).unwrap();
        assert!(controller.is_paused());
        assert_eq!(controller.ensure_not_paused().unwrap_err().kind(), ErrorKind::Paused);

        controller.unpause(ALICE).unwrap();
        assert!(!controller.is_paused());
        assert!(controller.ensure_not_paused().is_ok());
    }

    #[test]
    fn test_emergency_alone_cannot_pause() {
        let (controller, log) = setup();
        controller.grant_role(ROOT, Role::Emergency, BOB).unwrap();
        let before = log.stats().total_entries;

        let err = controller.pause(BOB).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(!controller.is_paused());
        assert_eq!(log.stats().total_entries, before);

        controller.grant_role(ROOT, Role::Pauser, ALICE).unwrap();
        controller.pause(ALICE).unwrap();
        let err = controller.unpause(BOB).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(controller.is_paused());
    }

    // ============== Concurrency Tests ==============

    #[test]
    fn test_event_order_matches_membership_under_contention() {
        for _ in 0..50 {
            let (controller, log) = setup();
            let controller = Arc::new(controller);

            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let controller = controller.clone();
                    std::thread::spawn(move || {
                        for _ in 0..25 {
                            if i % 2 == 0 {
                                controller.grant_role(ROOT, Role::Pauser, ALICE).unwrap();
                            } else {
                                controller.revoke_role(ROOT, Role::Pauser, ALICE).unwrap();
                            }
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            // Replaying the audit trail must land on the live membership
            let mut replayed = false;
            for event in log.events() {
                match event {
                    ConduitEvent::RoleGranted {
                        role: Role::Pauser,
                        account,
                        ..
                    } if account == ALICE => {
                        assert!(!replayed, "grant recorded while already a member");
                        replayed = true;
                    }
                    ConduitEvent::RoleRevoked {
                        role: Role::Pauser,
                        account,
                        ..
                    } if account == ALICE => {
                        assert!(replayed, "revoke recorded while not a member");
                        replayed = false;
                    }
                    _ => {}
                }
            }
            assert_eq!(replayed, controller.has_role(Role::Pauser, &ALICE));
        }
    }

    #[test]
    fn test_duplicate_pause_transitions() {
        let (controller, _) = setup();
        controller.grant_role(ROOT, Role::Pauser, ALICE).unwrap();

        let err = controller.unpause(ALICE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyProcessed);

        controller.pause(ALICE).unwrap();
        let err = controller.pause(ALICE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyProcessed);
    }

    // ============== Red Team Security Tests ==============

    mod red_team {
        use super::*;

        #[test]
        fn red_team_self_grant_without_admin() {
            let (controller, _) = setup();

            let err = controller.grant_role(ALICE, Role::Admin, ALICE).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
            assert!(!controller.has_role(Role::Admin, &ALICE));
        }

        #[test]
        fn red_team_revoked_admin_loses_power() {
            let (controller, _) = setup();
            controller.grant_role(ROOT, Role::Admin, ALICE).unwrap();
            controller.revoke_role(ROOT, Role::Admin, ALICE).unwrap();

            let err = controller.grant_role(ALICE, Role::Pauser, BOB).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
        }

        #[test]
        fn red_team_zero_address_caller_is_nobody() {
            let (controller, _) = setup();

            let err = controller.grant_role(Address::ZERO, Role::Pauser, ALICE).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
        }

        #[test]
        fn red_team_emergency_cannot_reassign_hierarchy() {
            let (controller, _) = setup();
            controller.grant_role(ROOT, Role::Emergency, ALICE).unwrap();

            let err = controller
                .set_role_admin(ALICE, Role::Pauser, Role::Emergency)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
            assert_eq!(controller.admin_of(Role::Pauser).unwrap(), Role::Admin);
        }
    }
}
