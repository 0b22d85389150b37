//! Event payloads pushed by the cloud over the event stream.
//!
//! Every payload is a JSON object tagged by a `type` field. The client
//! treats domain payloads as opaque data to hand to the consumer; only
//! `system` events carry meaning for the connection lifecycle.

use serde::{Deserialize, Serialize};

use crate::constants::{
    SUBTYPE_COULD_NOT_REFRESH_TOKEN, SUBTYPE_TOKEN_EXPIRED, SYSTEM_CODE_UNAUTHORIZED,
};

/// Errors from parsing a raw stream payload.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event has no type tag")]
    MissingType,
}

/// A named entity reference carried inside domain events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: String,
    pub name: String,
}

/// A zone (top-level grouping of nodes and rooms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRef {
    pub id: String,
    pub name: String,
    pub uid: u32,
}

/// A switchable node inside a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: String,
    pub name: String,
    pub uid: u32,
    #[serde(rename = "switchState", skip_serializing_if = "Option::is_none")]
    pub switch_state: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Connection-lifecycle signalling from the cloud (or from the client
/// itself, for synthetic recovery-failure events).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub code: i32,
    #[serde(rename = "subType", skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SystemEvent {
    /// Whether the cloud is reporting that the bearer token expired.
    pub fn is_token_expired(&self) -> bool {
        self.code == SYSTEM_CODE_UNAUTHORIZED
            && self.sub_type.as_deref() == Some(SUBTYPE_TOKEN_EXPIRED)
    }

    /// The synthetic event delivered when automatic re-authentication
    /// cannot produce a fresh token.
    pub fn could_not_refresh_token() -> Self {
        Self {
            code: SYSTEM_CODE_UNAUTHORIZED,
            sub_type: Some(SUBTYPE_COULD_NOT_REFRESH_TOKEN.to_string()),
            message: Some("automatic token refresh failed; log in again".to_string()),
        }
    }
}

/// Keep-alive ping emitted periodically by the cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<u64>,
}

/// Presence transition sub-types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceKind {
    #[serde(rename = "enterZone")]
    EnterZone,
    #[serde(rename = "exitZone")]
    ExitZone,
    #[serde(rename = "enterRoom")]
    EnterRoom,
    #[serde(rename = "exitRoom")]
    ExitRoom,
    /// Forward compatibility: unknown sub-types deserialize here.
    #[serde(other)]
    Unknown,
}

/// A user entering or leaving a zone or room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEvent {
    #[serde(rename = "subType")]
    pub sub_type: PresenceKind,
    pub user: ItemRef,
    pub zone: ZoneRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<ItemRef>,
}

/// Command sub-types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    #[serde(rename = "switchNode")]
    SwitchNode,
    #[serde(other)]
    Unknown,
}

/// A command issued against a node, observed on the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    #[serde(rename = "subType")]
    pub sub_type: CommandKind,
    pub zone: ZoneRef,
    pub node: NodeRef,
}

/// Which collection a data change touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataScope {
    #[serde(rename = "users")]
    Users,
    #[serde(rename = "zones")]
    Zones,
    #[serde(rename = "nodes")]
    Nodes,
    #[serde(rename = "rooms")]
    Rooms,
    #[serde(other)]
    Unknown,
}

/// The kind of mutation behind a data change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOperation {
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "delete")]
    Delete,
    #[serde(other)]
    Unknown,
}

/// Cloud-side data mutation relevant to the subscribed account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataChangeEvent {
    #[serde(rename = "subType")]
    pub sub_type: DataScope,
    pub operation: ChangeOperation,
    pub zone: ZoneRef,
    #[serde(rename = "changedItem")]
    pub changed_item: ItemRef,
}

/// Everything the cloud can push on the event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    System(SystemEvent),
    Ping(PingEvent),
    Presence(PresenceEvent),
    Command(CommandEvent),
    DataChange(DataChangeEvent),
    /// Forward compatibility: payloads with an unrecognized type tag are
    /// passed through untyped.
    Unknown(serde_json::Value),
}

impl SseEvent {
    /// Parses a raw stream payload into a typed event.
    ///
    /// A payload with a recognized tag but a malformed body is an error; a
    /// payload with an unrecognized tag passes through as [`Self::Unknown`].
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let tag = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(ParseError::MissingType)?;

        match tag {
            "system" => Ok(Self::System(serde_json::from_value(value)?)),
            "ping" => Ok(Self::Ping(serde_json::from_value(value)?)),
            "presence" => Ok(Self::Presence(serde_json::from_value(value)?)),
            "command" => Ok(Self::Command(serde_json::from_value(value)?)),
            "dataChange" => Ok(Self::DataChange(serde_json::from_value(value)?)),
            _ => Ok(Self::Unknown(value)),
        }
    }
}
