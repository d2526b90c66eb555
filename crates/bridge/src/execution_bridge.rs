//! ExecutionBridge - Request/response correlation between agents and the oracle
//!
//! The request table and both pending indexes live behind one mutex. Every
//! transition (submit, cancel, process) holds it for its whole duration,
//! including the forwarded strategy call, so no caller ever observes a
//! half-applied transition. Strategy handlers must not call back into the
//! bridge.

use crate::request::{ExecutionRequest, RequestStatus, StrategyAction};
use chrono::Utc;
use router::StrategyRouter;
use serde::Serialize;
use shared::{
    log_fields, Address, BridgeSettings, ConduitError, ConduitEvent, EntityKind, EventSink,
    Logger, Permission, RequestId, Result, Role, StrategyId, RESOURCE_LIMIT_HARD_CAP,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Result of a successful `process_response`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOutcome {
    pub request: ExecutionRequest,
    /// Strategy the decoded action was forwarded to
    pub forwarded: Option<StrategyId>,
    /// Output of the forwarded execution
    pub output: Option<Vec<u8>>,
}

#[derive(Debug)]
struct BridgeState {
    requests: HashMap<RequestId, ExecutionRequest>,
    pending: Vec<RequestId>,
    pending_by_requester: HashMap<Address, Vec<RequestId>>,
    nonce: u64,
    owner: Address,
    settings: BridgeSettings,
}

impl BridgeState {
    fn index(&mut self, id: RequestId, requester: Address) {
        self.pending.push(id);
        self.pending_by_requester.entry(requester).or_default().push(id);
    }

    fn unindex(&mut self, id: &RequestId, requester: &Address) {
        self.pending.retain(|p| p != id);
        if let Some(ids) = self.pending_by_requester.get_mut(requester) {
            ids.retain(|p| p != id);
            if ids.is_empty() {
                self.pending_by_requester.remove(requester);
            }
        }
    }

    /// Pending requests in submission order, derived from the canonical table
    fn derive_indexes(&self) -> (Vec<RequestId>, HashMap<Address, Vec<RequestId>>) {
        let mut pending: Vec<&ExecutionRequest> =
            self.requests.values().filter(|r| r.is_pending()).collect();
        pending.sort_by_key(|r| r.nonce);

        let mut by_requester: HashMap<Address, Vec<RequestId>> = HashMap::new();
        for request in &pending {
            by_requester.entry(request.requester).or_default().push(request.id);
        }
        (pending.iter().map(|r| r.id).collect(), by_requester)
    }

    fn finish(
        &mut self,
        id: &RequestId,
        status: RequestStatus,
        success: Option<bool>,
        result: Option<Vec<u8>>,
        error: Option<Vec<u8>>,
    ) -> Result<ExecutionRequest> {
        let request = self
            .requests
            .get_mut(id)
            .ok_or_else(|| ConduitError::not_found(EntityKind::Request, id))?;
        request.status = status;
        request.success = success;
        request.result = result;
        request.error = error;
        request.completed_at = Some(Utc::now());

        let finished = request.clone();
        self.unindex(id, &finished.requester);
        Ok(finished)
    }
}

/// ExecutionBridge owns execution requests and their pending indexes
pub struct ExecutionBridge {
    state: Mutex<BridgeState>,
    router: Arc<StrategyRouter>,
    events: Arc<dyn EventSink>,
    logger: Arc<dyn Logger>,
}

impl ExecutionBridge {
    pub fn new(
        owner: Address,
        settings: BridgeSettings,
        router: Arc<StrategyRouter>,
        events: Arc<dyn EventSink>,
        logger: Arc<dyn Logger>,
    ) -> Result<Self> {
        if owner.is_zero() {
            return Err(ConduitError::ZeroAddress("bridge owner"));
        }
        settings.validate()?;

        logger.info(
            "Execution bridge initialized",
            Some(&log_fields([
                ("owner", owner.to_string()),
                ("max_resource_limit", settings.max_resource_limit.to_string()),
            ])),
        );

        Ok(Self {
            state: Mutex::new(BridgeState {
                requests: HashMap::new(),
                pending: Vec::new(),
                pending_by_requester: HashMap::new(),
                nonce: 0,
                owner,
                settings,
            }),
            router,
            events,
            logger,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, BridgeState>> {
        self.state
            .lock()
            .map_err(|_| ConduitError::Internal("bridge state lock poisoned".to_string()))
    }

    fn reject(&self, operation: &str, error: ConduitError) -> ConduitError {
        self.logger.warn(
            &format!("{} rejected", operation),
            Some(&log_fields([
                ("kind", format!("{:?}", error.kind())),
                ("reason", error.to_string()),
            ])),
        );
        error
    }

    // ========== Submission ==========

    /// Submit a request on behalf of `agent`
    ///
    /// The agent must hold EXECUTE. The caller must be the agent itself or
    /// hold the EXECUTOR role.
    pub fn submit_request(
        &self,
        caller: Address,
        agent: Address,
        payload: &[u8],
        resource_limit: u64,
    ) -> Result<RequestId> {
        self.submit(caller, agent, None, payload, resource_limit)
    }

    /// Submit a request targeting a registered strategy
    pub fn submit_strategy_request(
        &self,
        caller: Address,
        agent: Address,
        strategy: &str,
        payload: &[u8],
        resource_limit: u64,
    ) -> Result<RequestId> {
        self.submit(caller, agent, Some(strategy), payload, resource_limit)
    }

    fn submit(
        &self,
        caller: Address,
        agent: Address,
        strategy: Option<&str>,
        payload: &[u8],
        resource_limit: u64,
    ) -> Result<RequestId> {
        if agent.is_zero() {
            return Err(self.reject("submit_request", ConduitError::ZeroAddress("agent")));
        }
        let strategy = strategy.map(StrategyId::new).transpose()?;
        if payload.is_empty() {
            return Err(self.reject("submit_request", ConduitError::EmptyPayload));
        }

        let mut state = self.lock()?;
        let max = state.settings.max_resource_limit;
        if resource_limit == 0 || resource_limit > max {
            return Err(self.reject(
                "submit_request",
                ConduitError::InvalidLimit {
                    limit: resource_limit,
                    max,
                },
            ));
        }

        self.ensure_can_submit(caller, agent)?;
        self.router
            .access()
            .ensure_not_paused()
            .map_err(|e| self.reject("submit_request", e))?;
        if let Some(strategy) = &strategy {
            self.ensure_strategy_accepts(strategy, payload)?;
        }

        state.nonce += 1;
        let nonce = state.nonce;
        let now = Utc::now();
        let id = RequestId::derive(&agent, nonce, now.timestamp_nanos_opt().unwrap_or_default());
        if state.requests.contains_key(&id) {
            return Err(ConduitError::Internal(format!("request id {} collided", id)));
        }

        state.requests.insert(
            id,
            ExecutionRequest {
                id,
                nonce,
                requester: agent,
                submitted_by: caller,
                strategy: strategy.clone(),
                payload: payload.to_vec(),
                resource_limit,
                status: RequestStatus::Pending,
                success: None,
                result: None,
                error: None,
                created_at: now,
                completed_at: None,
            },
        );
        state.index(id, agent);

        self.events.emit(ConduitEvent::RequestSubmitted {
            id,
            requester: agent,
            strategy,
            resource_limit,
        });
        self.logger.info(
            "Execution request submitted",
            Some(&log_fields([
                ("id", id.to_string()),
                ("requester", agent.to_string()),
                ("resource_limit", resource_limit.to_string()),
            ])),
        );
        Ok(id)
    }

    fn ensure_can_submit(&self, caller: Address, agent: Address) -> Result<()> {
        let agent_ok = self
            .router
            .agents()
            .has_permission(&agent, Permission::Execute);
        let caller_ok = caller == agent || self.router.access().has_role(Role::Executor, &caller);
        if agent_ok && caller_ok {
            return Ok(());
        }

        let requirement = if agent_ok {
            format!("caller == {} or EXECUTOR role", agent)
        } else {
            format!("agent {} with EXECUTE permission", agent)
        };
        Err(self.reject(
            "submit_request",
            ConduitError::unauthorized(caller, requirement),
        ))
    }

    fn ensure_strategy_accepts(&self, strategy: &StrategyId, payload: &[u8]) -> Result<()> {
        if self.router.validate_operation(strategy.as_str(), payload) {
            return Ok(());
        }
        let active = self
            .router
            .is_active(strategy.as_str())
            .map_err(|e| self.reject("submit_request", e))?;
        let error = if active {
            ConduitError::InvalidArgument(format!("payload rejected by strategy '{}'", strategy))
        } else {
            ConduitError::Paused(format!("strategy '{}'", strategy))
        };
        Err(self.reject("submit_request", error))
    }

    // ========== Completion ==========

    fn pending_request<'a>(
        &self,
        state: &'a BridgeState,
        operation: &str,
        caller: Address,
        id: &RequestId,
    ) -> Result<&'a ExecutionRequest> {
        let request = state
            .requests
            .get(id)
            .ok_or_else(|| self.reject(operation, ConduitError::not_found(EntityKind::Request, id)))?;
        if request.requester != caller {
            return Err(self.reject(
                operation,
                ConduitError::unauthorized(caller, format!("original requester {}", request.requester)),
            ));
        }
        if request.status.is_terminal() {
            return Err(self.reject(
                operation,
                ConduitError::AlreadyProcessed(format!("request {} ({})", id, request.status)),
            ));
        }
        Ok(request)
    }

    /// Cancel a pending request. Only the requester may cancel.
    pub fn cancel_request(&self, caller: Address, id: &RequestId) -> Result<()> {
        let mut state = self.lock()?;
        self.pending_request(&state, "cancel_request", caller, id)?;
        let request = state.finish(id, RequestStatus::Cancelled, None, None, None)?;

        self.events.emit(ConduitEvent::RequestCancelled {
            id: *id,
            requester: request.requester,
        });
        self.logger.info(
            "Execution request cancelled",
            Some(&log_fields([("id", id.to_string())])),
        );
        Ok(())
    }

    /// Complete a pending request with the oracle result
    ///
    /// A result that decodes as a [`StrategyAction`] with a resolvable target
    /// is forwarded to the router with the requester as caller. If that
    /// fails the request stays pending and the error is returned.
    pub fn process_response(
        &self,
        caller: Address,
        id: &RequestId,
        result: &[u8],
    ) -> Result<ResponseOutcome> {
        let mut state = self.lock()?;
        let request = self.pending_request(&state, "process_response", caller, id)?;
        let requester = request.requester;
        let target = request.strategy.clone();

        let mut forwarded = None;
        let mut output = None;
        if let Some(action) = StrategyAction::decode(result) {
            if let (Some(named), Some(target)) = (&action.strategy, &target) {
                if named != target {
                    return Err(self.reject(
                        "process_response",
                        ConduitError::InvalidArgument(format!(
                            "response names strategy '{}' but request {} targets '{}'",
                            named, id, target
                        )),
                    ));
                }
            }
            if let Some(strategy) = action.strategy.clone().or(target) {
                let data = action
                    .data_bytes()
                    .map_err(|e| self.reject("process_response", e))?;
                let out = self
                    .router
                    .execute_strategy(requester, strategy.as_str(), &data)
                    .map_err(|e| self.reject("process_response", e))?;
                forwarded = Some(strategy);
                output = Some(out);
            }
        }

        let request = state.finish(
            id,
            RequestStatus::Completed,
            Some(true),
            Some(result.to_vec()),
            None,
        )?;

        self.events.emit(ConduitEvent::ResponseProcessed {
            id: *id,
            requester,
            success: true,
        });
        self.logger.info(
            "Execution response processed",
            Some(&log_fields([
                ("id", id.to_string()),
                (
                    "forwarded",
                    forwarded.as_ref().map(|s| s.to_string()).unwrap_or_default(),
                ),
            ])),
        );

        Ok(ResponseOutcome {
            request,
            forwarded,
            output,
        })
    }

    /// Complete a pending request as failed. Nothing is forwarded.
    pub fn process_error_response(
        &self,
        caller: Address,
        id: &RequestId,
        error: &[u8],
    ) -> Result<ExecutionRequest> {
        let mut state = self.lock()?;
        let requester = self
            .pending_request(&state, "process_error_response", caller, id)?
            .requester;
        let request = state.finish(
            id,
            RequestStatus::Completed,
            Some(false),
            None,
            Some(error.to_vec()),
        )?;

        self.events.emit(ConduitEvent::ResponseProcessed {
            id: *id,
            requester,
            success: false,
        });
        self.logger.warn(
            "Execution request failed off-chain",
            Some(&log_fields([
                ("id", id.to_string()),
                ("error", String::from_utf8_lossy(error).into_owned()),
            ])),
        );
        Ok(request)
    }

    // ========== Administration ==========

    fn ensure_owner(&self, state: &BridgeState, operation: &str, caller: Address) -> Result<()> {
        if caller == state.owner {
            return Ok(());
        }
        Err(self.reject(operation, ConduitError::unauthorized(caller, "bridge owner")))
    }

    /// Change the resource-limit ceiling. In-flight requests keep their limit.
    pub fn update_resource_limit(&self, caller: Address, max_resource_limit: u64) -> Result<()> {
        if max_resource_limit == 0 || max_resource_limit > RESOURCE_LIMIT_HARD_CAP {
            return Err(self.reject(
                "update_resource_limit",
                ConduitError::InvalidLimit {
                    limit: max_resource_limit,
                    max: RESOURCE_LIMIT_HARD_CAP,
                },
            ));
        }

        let mut state = self.lock()?;
        self.ensure_owner(&state, "update_resource_limit", caller)?;
        let old = state.settings.max_resource_limit;
        state.settings.max_resource_limit = max_resource_limit;

        self.events.emit(ConduitEvent::ResourceLimitUpdated {
            old,
            new: max_resource_limit,
        });
        self.logger.info(
            "Resource limit updated",
            Some(&log_fields([
                ("old", old.to_string()),
                ("new", max_resource_limit.to_string()),
            ])),
        );
        Ok(())
    }

    /// Replace the off-chain computation source
    pub fn update_source(&self, caller: Address, source: &str) -> Result<()> {
        if source.is_empty() {
            return Err(self.reject("update_source", ConduitError::EmptyPayload));
        }

        let mut state = self.lock()?;
        self.ensure_owner(&state, "update_source", caller)?;
        state.settings.source = source.to_string();

        self.events.emit(ConduitEvent::SourceUpdated { sender: caller });
        self.logger.info(
            "Computation source updated",
            Some(&log_fields([("bytes", source.len().to_string())])),
        );
        Ok(())
    }

    pub fn update_subscription(
        &self,
        caller: Address,
        subscription_id: u64,
        don_id: &str,
    ) -> Result<()> {
        let mut state = self.lock()?;
        self.ensure_owner(&state, "update_subscription", caller)?;
        state.settings.subscription_id = subscription_id;
        state.settings.don_id = don_id.to_string();

        self.events.emit(ConduitEvent::SubscriptionUpdated {
            subscription_id,
            don_id: don_id.to_string(),
        });
        self.logger.info(
            "Oracle subscription updated",
            Some(&log_fields([
                ("subscription_id", subscription_id.to_string()),
                ("don_id", don_id.to_string()),
            ])),
        );
        Ok(())
    }

    pub fn transfer_ownership(&self, caller: Address, new_owner: Address) -> Result<()> {
        if new_owner.is_zero() {
            return Err(self.reject("transfer_ownership", ConduitError::ZeroAddress("bridge owner")));
        }

        let mut state = self.lock()?;
        self.ensure_owner(&state, "transfer_ownership", caller)?;
        let previous = state.owner;
        state.owner = new_owner;

        self.events.emit(ConduitEvent::OwnershipTransferred {
            previous,
            new: new_owner,
        });
        self.logger.info(
            "Bridge ownership transferred",
            Some(&log_fields([
                ("previous", previous.to_string()),
                ("new", new_owner.to_string()),
            ])),
        );
        Ok(())
    }

    // ========== Queries ==========

    pub fn get_request_status(&self, id: &RequestId) -> Result<RequestStatus> {
        self.lock()?
            .requests
            .get(id)
            .map(|r| r.status)
            .ok_or_else(|| ConduitError::not_found(EntityKind::Request, id))
    }

    pub fn get_request(&self, id: &RequestId) -> Result<ExecutionRequest> {
        self.lock()?
            .requests
            .get(id)
            .cloned()
            .ok_or_else(|| ConduitError::not_found(EntityKind::Request, id))
    }

    /// Pending request ids of `requester`, in submission order
    pub fn get_requests_by_requester(&self, requester: &Address) -> Result<Vec<RequestId>> {
        Ok(self
            .lock()?
            .pending_by_requester
            .get(requester)
            .cloned()
            .unwrap_or_default())
    }

    /// All pending request ids, in submission order
    pub fn get_active_requests(&self) -> Result<Vec<RequestId>> {
        Ok(self.lock()?.pending.clone())
    }

    pub fn get_active_requests_count(&self) -> Result<usize> {
        Ok(self.lock()?.pending.len())
    }

    pub fn settings(&self) -> Result<BridgeSettings> {
        Ok(self.lock()?.settings.clone())
    }

    pub fn owner(&self) -> Result<Address> {
        Ok(self.lock()?.owner)
    }

    /// Recompute both pending indexes from the request table and compare
    pub fn verify_indexes(&self) -> Result<()> {
        let state = self.lock()?;
        let (pending, by_requester) = state.derive_indexes();

        if pending != state.pending {
            return Err(ConduitError::Internal(format!(
                "global pending index diverged: {} indexed, {} pending",
                state.pending.len(),
                pending.len()
            )));
        }
        if by_requester != state.pending_by_requester {
            return Err(ConduitError::Internal(
                "per-requester pending index diverged".to_string(),
            ));
        }
        Ok(())
    }

    /// Every request ever submitted, in submission order
    pub fn snapshot(&self) -> Result<Vec<ExecutionRequest>> {
        let state = self.lock()?;
        let mut requests: Vec<ExecutionRequest> = state.requests.values().cloned().collect();
        requests.sort_by_key(|r| r.nonce);
        Ok(requests)
    }

    pub fn router(&self) -> &Arc<StrategyRouter> {
        &self.router
    }
}
