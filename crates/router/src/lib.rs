//! # Conduit Router
//!
//! Strategy registry with active/paused status and permission-gated
//! registration, update and execution.

pub mod handler;
pub mod strategy_router;

pub use handler::{ExecutionContext, FnHandler, StrategyHandler};
pub use strategy_router::{Strategy, StrategyRouter};
