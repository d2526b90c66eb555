//! # Conduit Audit
//!
//! Event log that records every state change emitted by the Conduit components.

mod event_log;

pub use event_log::{EventLog, EventRecord, EventStats};
