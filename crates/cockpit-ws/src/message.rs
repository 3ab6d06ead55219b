//! Push channel message types.
//!
//! Outbound: a single subscription request sent on every successful open.
//! Inbound: JSON objects carrying any subset of snapshot fields, optionally
//! tagged `"type": "update"`.

use crate::error::{WsError, WsResult};
use cockpit_core::DecodedPatch;
use cockpit_core::SnapshotPatch;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Channels requested when none are configured.
pub const DEFAULT_CHANNELS: [&str; 5] = ["metrics", "equity", "positions", "trades", "reasoning"];

/// Subscription request sent after each open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    #[serde(rename = "type")]
    pub request_type: String,
    pub channels: Vec<String>,
}

impl SubscribeRequest {
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            request_type: "subscribe".to_string(),
            channels: channels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn to_json(&self) -> WsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for SubscribeRequest {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNELS)
    }
}

/// A parsed inbound frame.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// Snapshot update, possibly with per-field rejections.
    Update(DecodedPatch),
    /// Well-formed message of a type this client does not consume.
    Ignored(String),
}

impl InboundMessage {
    pub fn patch(&self) -> Option<&SnapshotPatch> {
        match self {
            Self::Update(decoded) => Some(&decoded.patch),
            Self::Ignored(_) => None,
        }
    }
}

/// Parse one text frame.
///
/// Errors mean the whole frame is unusable (not JSON, not an object). Invalid
/// individual fields surface as rejections inside [`InboundMessage::Update`].
pub fn parse_inbound(text: &str) -> WsResult<InboundMessage> {
    let value: Value = serde_json::from_str(text)?;
    let object = value
        .as_object()
        .ok_or_else(|| WsError::ParseError("expected a JSON object".to_string()))?;

    match object.get("type") {
        None => Ok(InboundMessage::Update(SnapshotPatch::decode(&value))),
        Some(Value::String(kind)) if kind == "update" => {
            Ok(InboundMessage::Update(SnapshotPatch::decode(&value)))
        }
        Some(Value::String(kind)) => Ok(InboundMessage::Ignored(kind.clone())),
        Some(other) => Err(WsError::ParseError(format!(
            "message type must be a string, got {other}"
        ))),
    }
}
