//! Events emitted on every state change

use crate::role::{Permission, Role};
use crate::types::{Address, RequestId, StrategyId};
use serde::{Deserialize, Serialize};

/// A state change observed by the outside world
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConduitEvent {
    RoleGranted {
        role: Role,
        account: Address,
        sender: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
        sender: Address,
    },
    RoleAdminChanged {
        role: Role,
        previous_admin: Role,
        new_admin: Role,
    },
    RootAdminTransferred {
        previous: Address,
        new: Address,
    },
    SystemPaused {
        account: Address,
    },
    SystemUnpaused {
        account: Address,
    },
    AgentRegistered {
        agent: Address,
        agent_type: String,
    },
    AgentPermissionsUpdated {
        agent: Address,
        permissions: Vec<Permission>,
    },
    AgentStatusChanged {
        agent: Address,
        active: bool,
    },
    StrategyRegistered {
        id: StrategyId,
        implementation: Address,
    },
    StrategyUpdated {
        id: StrategyId,
        old_implementation: Address,
        new_implementation: Address,
    },
    StrategyStatusChanged {
        id: StrategyId,
        active: bool,
    },
    StrategyExecuted {
        id: StrategyId,
        caller: Address,
        success: bool,
    },
    RequestSubmitted {
        id: RequestId,
        requester: Address,
        strategy: Option<StrategyId>,
        resource_limit: u64,
    },
    RequestCancelled {
        id: RequestId,
        requester: Address,
    },
    ResponseProcessed {
        id: RequestId,
        requester: Address,
        success: bool,
    },
    ResourceLimitUpdated {
        old: u64,
        new: u64,
    },
    SourceUpdated {
        sender: Address,
    },
    SubscriptionUpdated {
        subscription_id: u64,
        don_id: String,
    },
    OwnershipTransferred {
        previous: Address,
        new: Address,
    },
}

/// Coarse grouping of events for audit statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Access,
    Agent,
    Strategy,
    Request,
    Settings,
}

impl ConduitEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            ConduitEvent::RoleGranted { .. }
            | ConduitEvent::RoleRevoked { .. }
            | ConduitEvent::RoleAdminChanged { .. }
            | ConduitEvent::RootAdminTransferred { .. }
            | ConduitEvent::SystemPaused { .. }
            | ConduitEvent::SystemUnpaused { .. } => EventCategory::Access,
            ConduitEvent::AgentRegistered { .. }
            | ConduitEvent::AgentPermissionsUpdated { .. }
            | ConduitEvent::AgentStatusChanged { .. } => EventCategory::Agent,
            ConduitEvent::StrategyRegistered { .. }
            | ConduitEvent::StrategyUpdated { .. }
            | ConduitEvent::StrategyStatusChanged { .. }
            | ConduitEvent::StrategyExecuted { .. } => EventCategory::Strategy,
            ConduitEvent::RequestSubmitted { .. }
            | ConduitEvent::RequestCancelled { .. }
            | ConduitEvent::ResponseProcessed { .. } => EventCategory::Request,
            ConduitEvent::ResourceLimitUpdated { .. }
            | ConduitEvent::SourceUpdated { .. }
            | ConduitEvent::SubscriptionUpdated { .. }
            | ConduitEvent::OwnershipTransferred { .. } => EventCategory::Settings,
        }
    }
}

/// Event sink interface for dependency injection
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ConduitEvent);
}

/// Sink that drops every event
#[derive(Debug, Clone, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: ConduitEvent) {}
}
