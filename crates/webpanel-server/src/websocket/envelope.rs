//! Wire envelope: `{"type": <string>, "data": <any>}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound heartbeat request.
pub const PING: &str = "ping";
/// Inbound request for a stats snapshot.
pub const GET_SYSTEM_INFO: &str = "get_system_info";
/// Inbound request for recorder status.
pub const GET_CAMERA_STATUS: &str = "get_camera_status";
/// Outbound heartbeat reply.
pub const PONG: &str = "pong";
/// Outbound stats snapshot.
pub const SYSTEM_INFO: &str = "system_info";
/// Outbound recorder status.
pub const CAMERA_STATUS: &str = "camera_status";

/// An application message. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload; shape depends on `kind`.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Build an envelope from a tag and an already-built payload.
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Build an envelope from any serializable payload.
    pub fn with_payload<T: Serialize>(kind: &str, payload: &T) -> serde_json::Result<Self> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// Reply to a `ping`, echoing its data.
    pub fn pong(data: Value) -> Self {
        Self::new(PONG, data)
    }

    /// Parse an inbound text frame.
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Encode once for transport; the result is shared across recipients.
    pub fn encode(&self) -> serde_json::Result<Arc<String>> {
        serde_json::to_string(self).map(Arc::new)
    }

    /// Classify the inbound type tag.
    pub fn inbound_kind(&self) -> InboundKind {
        InboundKind::from_tag(&self.kind)
    }
}

/// Inbound message types the router acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboundKind {
    /// `ping`
    Ping,
    /// `get_system_info`
    GetSystemInfo,
    /// `get_camera_status`
    GetCameraStatus,
    /// Anything else.
    Unknown,
}

impl InboundKind {
    /// Map a wire tag to a kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            PING => Self::Ping,
            GET_SYSTEM_INFO => Self::GetSystemInfo,
            GET_CAMERA_STATUS => Self::GetCameraStatus,
            _ => Self::Unknown,
        }
    }
}
