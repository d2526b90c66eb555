//! # Conduit Bridge
//!
//! Tracks execution requests from submission to asynchronous completion
//! and forwards decoded strategy actions to the router.

pub mod execution_bridge;
pub mod request;

pub use execution_bridge::{ExecutionBridge, ResponseOutcome};
pub use request::{ExecutionRequest, RequestStatus, StrategyAction};
