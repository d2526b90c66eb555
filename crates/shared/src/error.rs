//! Error types for Conduit

use crate::types::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of entity an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Role,
    Agent,
    Strategy,
    Request,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Role => "Role",
            EntityKind::Agent => "Agent",
            EntityKind::Strategy => "Strategy",
            EntityKind::Request => "Request",
        };
        f.write_str(name)
    }
}

/// Error thrown when the caller lacks the required role or permission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Account {caller} is not authorized: requires {requirement}")]
pub struct UnauthorizedError {
    pub caller: Address,
    pub requirement: String,
}

/// General Conduit error type
#[derive(Debug, Error)]
pub enum ConduitError {
    #[error(transparent)]
    Unauthorized(#[from] UnauthorizedError),

    #[error("Zero address supplied for {0}")]
    ZeroAddress(&'static str),

    #[error("Identifier must not be empty")]
    EmptyIdentifier,

    #[error("Payload must not be empty")]
    EmptyPayload,

    #[error("Resource limit {limit} is outside the accepted range 1..={max}")]
    InvalidLimit { limit: u64, max: u64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{kind} '{id}' is already registered")]
    AlreadyRegistered { kind: EntityKind, id: String },

    #[error("{0} has already been processed")]
    AlreadyProcessed(String),

    #[error("{0} is already initialized")]
    AlreadyInitialized(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("Operation blocked: {0} is paused")]
    Paused(String),

    #[error("Strategy '{strategy}' execution failed: {reason}")]
    ExecutionFailed { strategy: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Flat failure kind, used for display and matching without string parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    ZeroAddress,
    EmptyIdentifier,
    EmptyPayload,
    InvalidLimit,
    InvalidArgument,
    AlreadyRegistered,
    AlreadyProcessed,
    AlreadyInitialized,
    NotFound,
    Paused,
    ExecutionFailed,
    Config,
    Internal,
}

impl ConduitError {
    pub fn unauthorized(caller: Address, requirement: impl Into<String>) -> Self {
        UnauthorizedError {
            caller,
            requirement: requirement.into(),
        }
        .into()
    }

    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        ConduitError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn already_registered(kind: EntityKind, id: impl ToString) -> Self {
        ConduitError::AlreadyRegistered {
            kind,
            id: id.to_string(),
        }
    }

    /// The failure kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConduitError::Unauthorized(_) => ErrorKind::Unauthorized,
            ConduitError::ZeroAddress(_) => ErrorKind::ZeroAddress,
            ConduitError::EmptyIdentifier => ErrorKind::EmptyIdentifier,
            ConduitError::EmptyPayload => ErrorKind::EmptyPayload,
            ConduitError::InvalidLimit { .. } => ErrorKind::InvalidLimit,
            ConduitError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ConduitError::AlreadyRegistered { .. } => ErrorKind::AlreadyRegistered,
            ConduitError::AlreadyProcessed(_) => ErrorKind::AlreadyProcessed,
            ConduitError::AlreadyInitialized(_) => ErrorKind::AlreadyInitialized,
            ConduitError::NotFound { .. } => ErrorKind::NotFound,
            ConduitError::Paused(_) => ErrorKind::Paused,
            ConduitError::ExecutionFailed { .. } => ErrorKind::ExecutionFailed,
            ConduitError::Config(_)
            | ConduitError::Io(_)
            | ConduitError::Json(_)
            | ConduitError::Yaml(_) => ErrorKind::Config,
            ConduitError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConduitError>;
