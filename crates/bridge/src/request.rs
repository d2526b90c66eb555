//! Execution request records and the strategy action wire format

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{Address, ConduitError, RequestId, Result, StrategyId};

/// Request lifecycle. Pending is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Tracked unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub id: RequestId,
    pub nonce: u64,
    pub requester: Address,
    /// Account that called submit; differs from `requester` for operator relays
    pub submitted_by: Address,
    pub strategy: Option<StrategyId>,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    pub resource_limit: u64,
    pub status: RequestStatus,
    pub success: Option<bool>,
    #[serde(default, with = "hex_bytes_opt")]
    pub result: Option<Vec<u8>>,
    #[serde(default, with = "hex_bytes_opt")]
    pub error: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// Action an oracle response may carry
///
/// ```json
/// { "strategy": "YIELD", "data": "0x6465706f736974" }
/// ```
///
/// `strategy` may be omitted when the request was submitted for a
/// specific strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyAction {
    #[serde(default)]
    pub strategy: Option<StrategyId>,
    pub data: String,
}

impl StrategyAction {
    pub fn new(strategy: Option<StrategyId>, data: &[u8]) -> Self {
        Self {
            strategy,
            data: format!("0x{}", hex::encode(data)),
        }
    }

    /// Decode a response payload. Anything that is not an action yields `None`.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        serde_json::from_slice(payload).ok()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Raw bytes behind the hex `data` field
    pub fn data_bytes(&self) -> Result<Vec<u8>> {
        let raw = self.data.strip_prefix("0x").unwrap_or(&self.data);
        hex::decode(raw).map_err(|e| {
            ConduitError::InvalidArgument(format!("strategy action data is not hex: {}", e))
        })
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        hex::decode(raw.strip_prefix("0x").unwrap_or(&raw)).map_err(serde::de::Error::custom)
    }
}

mod hex_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => super::hex_bytes::serialize(bytes, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|raw| hex::decode(raw.strip_prefix("0x").unwrap_or(&raw)))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
