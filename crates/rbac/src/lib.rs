//! # Conduit RBAC
//!
//! Role-Based Access Control for Conduit.
//!
//! ## Components
//!
//! - `AccessController` - Role membership, admin hierarchy and the system pause flag
//! - `AgentRegistry` - Registered agents and their strategy-scoped permissions

pub mod access_controller;
pub mod agent_registry;

pub use access_controller::{AccessController, RoleEntry, RoleTable};
pub use agent_registry::{Agent, AgentRegistry};
