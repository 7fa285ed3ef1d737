//! Relay event format
//!
//! All frames are JSON text of the form `{"event": <name>, "data": <payload>}`.
//! Message payloads and chat metadata are opaque to the relay; they are
//! produced and consumed by the collaborator store and the clients.

use super::{ChatId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events a client may send to the relay
///
/// Anything that fails to parse into one of these is dropped silently;
/// the protocol is fire-and-forget and the relay never closes a
/// connection over a malformed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Bind the calling connection to a user identity
    #[serde(rename = "setup")]
    Setup(UserId),

    /// Add the calling connection to a chat room
    #[serde(rename = "joinChat")]
    JoinChat(ChatId),

    /// Fan a freshly persisted message out to room + recipients
    #[serde(rename = "message:send")]
    MessageSend(SendPayload),

    /// Announce a newly created group chat to its members
    #[serde(rename = "group:created")]
    GroupCreated(Value),
}

impl ClientEvent {
    /// Deserialize from a JSON text frame
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Wire name of the event
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::JoinChat(_) => "joinChat",
            Self::MessageSend(_) => "message:send",
            Self::GroupCreated(_) => "group:created",
        }
    }
}

/// Payload of an inbound `message:send`
///
/// Every field defaults so that a partial payload still parses; the
/// dispatcher validates and drops rather than erroring back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendPayload {
    /// Target chat room
    pub chat_id: ChatId,
    /// The persisted message, opaque to the relay
    pub message: Value,
    /// User ids to reach through presence, typically all members but the sender
    pub recipients: Vec<UserId>,
    /// Optional chat metadata for first-touch hydration on the client
    pub chat: Option<Value>,
}

impl SendPayload {
    /// A send without a chat id or message body is dropped
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.chat_id.is_empty() && !self.message.is_null()
    }
}

/// Events the relay delivers to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A message delivered to a room viewer or a recipient's connection
    #[serde(rename = "message:receive")]
    MessageReceive(MessageEnvelope),

    /// A new group chat announced to one of its members
    #[serde(rename = "group:created")]
    GroupCreated(Value),
}

impl ServerEvent {
    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name of the event
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageReceive(_) => "message:receive",
            Self::GroupCreated(_) => "group:created",
        }
    }
}

/// The unit fanned out to target connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub chat_id: ChatId,
    pub message: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<Value>,
}

impl MessageEnvelope {
    /// Build the `message:receive` envelope for a validated send
    #[must_use]
    pub fn from_send(payload: &SendPayload) -> Self {
        Self {
            chat_id: payload.chat_id.clone(),
            message: payload.message.clone(),
            chat: payload.chat.clone(),
        }
    }
}

/// Extract the member id list from a `group:created` chat object
///
/// Returns `None` unless `members` is an array of strings; the caller
/// drops the event in that case.
#[must_use]
pub fn group_member_ids(chat: &Value) -> Option<Vec<UserId>> {
    chat.get("members")?
        .as_array()?
        .iter()
        .map(|m| m.as_str().map(UserId::from))
        .collect()
}
