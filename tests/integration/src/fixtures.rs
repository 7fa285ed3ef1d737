//! Test fixtures
//!
//! Builders for the opaque payloads the collaborator store would normally
//! produce.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A persisted-message payload with a unique id
pub fn message_payload(sender_id: &str, text: &str) -> Value {
    let id = MESSAGE_COUNTER.fetch_add(1, Ordering::SeqCst);
    json!({
        "_id": format!("msg-{id}"),
        "senderId": sender_id,
        "text": text,
        "createdAt": "2024-01-01T00:00:00Z",
    })
}

/// Chat metadata as the store returns it
pub fn chat_metadata(chat_id: &str, members: &[&str], is_group: bool) -> Value {
    json!({
        "_id": chat_id,
        "isGroup": is_group,
        "members": members,
    })
}

/// Payload for a `message:send` frame
pub fn send_payload(chat_id: &str, message: Value, recipients: &[&str], chat: Option<Value>) -> Value {
    let mut payload = json!({
        "chatId": chat_id,
        "message": message,
        "recipients": recipients,
    });
    if let Some(chat) = chat {
        payload["chat"] = chat;
    }
    payload
}

/// A group chat object for `group:created`
pub fn group_chat(chat_id: &str, name: &str, members: &[&str]) -> Value {
    json!({
        "_id": chat_id,
        "name": name,
        "isGroup": true,
        "members": members,
    })
}
