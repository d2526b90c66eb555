//! # Conduit Core
//!
//! Integration layer with ConduitCore: one event log, one logger, every
//! component wired together and bootstrapped from a deployment manifest.

mod conduit_core;

pub use conduit_core::{ConduitCore, InitReport, SystemSnapshot};

// Re-export dependencies
pub use audit::{EventLog, EventRecord, EventStats};
pub use bridge::{ExecutionBridge, ExecutionRequest, RequestStatus, ResponseOutcome, StrategyAction};
pub use rbac::{AccessController, Agent, AgentRegistry, RoleEntry, RoleTable};
pub use router::{ExecutionContext, FnHandler, Strategy, StrategyHandler, StrategyRouter};
