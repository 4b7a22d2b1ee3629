//! Server responses and JSON-RPC errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Member, ProtocolError, Result};

/// Error object returned by the server (or synthesised by the channel when
/// the request never made it there).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Code used for failures that happened before the server answered.
    pub const TRANSPORT: i64 = -32000;

    /// Error with the given code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    /// The request could not be delivered or timed out locally.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(Self::TRANSPORT, message)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Extract the member list from a `joinRoom` response.
///
/// The server answers with `{ "value": [member, ...] }`. An explicit `null`
/// is accepted as an empty room.
pub fn parse_join_room(response: &Value) -> Result<Vec<Member>> {
    const METHOD: &str = "joinRoom";

    let value = response.get("value").ok_or_else(|| ProtocolError::missing(METHOD, "value"))?;
    if value.is_null() {
        return Ok(Vec::new());
    }

    Vec::<Member>::deserialize(value).map_err(|e| ProtocolError::malformed(METHOD, e))
}

/// Extract the SDP answer from a `publishVideo` or `receiveVideoFrom`
/// response.
pub fn parse_sdp_answer(method: &str, response: &Value) -> Result<String> {
    match response.get("sdpAnswer") {
        Some(Value::String(sdp)) => Ok(sdp.clone()),
        Some(other) => String::deserialize(other).map_err(|e| ProtocolError::malformed(method, e)),
        None => Err(ProtocolError::missing(method, "sdpAnswer")),
    }
}
