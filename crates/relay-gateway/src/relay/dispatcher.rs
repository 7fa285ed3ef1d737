//! Event dispatcher
//!
//! One logical event stream per connection: the socket's receive loop
//! feeds events here in arrival order. The protocol is fire-and-forget —
//! nothing in this module surfaces an error to the sending connection,
//! and malformed input is dropped, never fatal.

use crate::connection::{Connection, ConnectionManager};
use crate::protocol::{group_member_ids, ClientEvent, MessageEnvelope, SendPayload, ServerEvent};
use serde_json::Value;
use std::sync::Arc;

/// Routes inbound client events to the right handler
pub struct RelayDispatcher;

impl RelayDispatcher {
    /// Handle one inbound event from a connection
    pub async fn dispatch(
        manager: &ConnectionManager,
        connection: &Arc<Connection>,
        event: ClientEvent,
    ) {
        tracing::trace!(
            connection_id = %connection.connection_id(),
            event = event.name(),
            "Dispatching event"
        );

        match event {
            ClientEvent::Setup(user_id) => {
                if user_id.is_empty() {
                    tracing::debug!(
                        connection_id = %connection.connection_id(),
                        "Dropping setup with empty user id"
                    );
                    return;
                }
                manager.bind_user(connection.connection_id(), user_id).await;
            }
            ClientEvent::JoinChat(chat_id) => {
                if chat_id.is_empty() {
                    tracing::debug!(
                        connection_id = %connection.connection_id(),
                        "Dropping join with empty chat id"
                    );
                    return;
                }
                manager.join_room(connection.connection_id(), chat_id).await;
            }
            ClientEvent::MessageSend(payload) => {
                Self::message_send(manager, connection, payload);
            }
            ClientEvent::GroupCreated(chat) => {
                Self::group_created(manager, connection, chat);
            }
        }
    }

    /// Fan a message out to its room and its recipients
    ///
    /// Step 1 reaches connections with the chat open; step 2 reaches every
    /// connection of every listed recipient, covering users whose room
    /// join hasn't landed yet. A connection present in both sets receives
    /// the envelope twice — clients dedup by message id, and completeness
    /// wins over exactly-once.
    fn message_send(
        manager: &ConnectionManager,
        connection: &Arc<Connection>,
        payload: SendPayload,
    ) {
        if !payload.is_valid() {
            tracing::debug!(
                connection_id = %connection.connection_id(),
                "Dropping send without chat id or message"
            );
            return;
        }

        let envelope = ServerEvent::MessageReceive(MessageEnvelope::from_send(&payload));

        let room_sent = manager.send_to_room(&payload.chat_id, &envelope);

        let mut presence_sent = 0;
        for user_id in &payload.recipients {
            if user_id.is_empty() {
                continue;
            }
            presence_sent += manager.send_to_user(user_id, &envelope);
        }

        tracing::debug!(
            chat_id = %payload.chat_id,
            room_sent = room_sent,
            presence_sent = presence_sent,
            "Message fanned out"
        );
    }

    /// Broadcast a new group chat to every member's connections
    ///
    /// Room-independent: nobody has joined the new room's socket yet, so
    /// delivery goes through presence only.
    fn group_created(manager: &ConnectionManager, connection: &Arc<Connection>, chat: Value) {
        let Some(members) = group_member_ids(&chat) else {
            tracing::debug!(
                connection_id = %connection.connection_id(),
                "Dropping group announcement without a member list"
            );
            return;
        };

        let event = ServerEvent::GroupCreated(chat);
        let mut sent = 0;
        for user_id in &members {
            sent += manager.send_to_user(user_id, &event);
        }

        tracing::debug!(members = members.len(), sent = sent, "Group announced");
    }
}
