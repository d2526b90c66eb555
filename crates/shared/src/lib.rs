//! # Conduit Shared
//!
//! Common types and interfaces used across all Conduit crates.

pub mod config;
pub mod error;
pub mod event;
pub mod logger;
pub mod role;
pub mod types;

// Re-exports
pub use config::*;
pub use error::*;
pub use event::*;
pub use logger::*;
pub use role::*;
pub use types::*;
