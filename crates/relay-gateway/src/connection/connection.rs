//! Individual WebSocket connection
//!
//! Represents a single transport session and its state. The connection
//! record is owned by the session lifecycle; the presence and room
//! indexes only hold its id.

use crate::protocol::{ChatId, ServerEvent, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};

/// Connection lifecycle state
///
/// `Bound` is entered on the first successful `setup`; joining or leaving
/// rooms does not change it. `TornDown` is terminal and reached exactly
/// once, on the transport disconnect signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection established, no user identity yet
    Unbound,
    /// Bound to a user via `setup`
    Bound,
    /// Transport disconnected, bookkeeping cleaned up
    TornDown,
}

/// A single live transport session
pub struct Connection {
    /// Unique connection id, minted at accept time
    connection_id: String,

    /// Bound user id (None until `setup`)
    user_id: RwLock<Option<UserId>>,

    /// Current lifecycle state
    state: RwLock<ConnectionState>,

    /// Channel to the task writing frames to the WebSocket
    sender: mpsc::Sender<ServerEvent>,

    /// Chat rooms this connection has joined
    rooms: RwLock<HashSet<ChatId>>,

    /// Connection creation time
    created_at: Instant,
}

impl Connection {
    /// Create a new connection
    pub fn new(connection_id: String, sender: mpsc::Sender<ServerEvent>) -> Arc<Self> {
        Arc::new(Self {
            connection_id,
            user_id: RwLock::new(None),
            state: RwLock::new(ConnectionState::Unbound),
            sender,
            rooms: RwLock::new(HashSet::new()),
            created_at: Instant::now(),
        })
    }

    /// Generate a fresh connection id
    #[must_use]
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Get the connection id
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Get the bound user id (if any)
    pub async fn user_id(&self) -> Option<UserId> {
        self.user_id.read().await.clone()
    }

    /// Bind to a user, returning the previously bound id if any
    pub async fn bind(&self, user_id: UserId) -> Option<UserId> {
        let previous = self.user_id.write().await.replace(user_id);
        *self.state.write().await = ConnectionState::Bound;
        previous
    }

    /// Check whether `setup` has completed for this connection
    pub async fn is_bound(&self) -> bool {
        self.user_id.read().await.is_some()
    }

    /// Get the current lifecycle state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Set the lifecycle state
    pub async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }

    /// Record a room join; returns false when already joined
    pub async fn join_room(&self, chat_id: ChatId) -> bool {
        self.rooms.write().await.insert(chat_id)
    }

    /// Record a room leave
    pub async fn leave_room(&self, chat_id: &ChatId) {
        self.rooms.write().await.remove(chat_id);
    }

    /// Get all joined rooms
    pub async fn rooms(&self) -> Vec<ChatId> {
        self.rooms.read().await.iter().cloned().collect()
    }

    /// Check membership in a room
    pub async fn has_joined(&self, chat_id: &ChatId) -> bool {
        self.rooms.read().await.contains(chat_id)
    }

    /// Get connection age
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Queue an event for delivery without blocking
    ///
    /// Best effort: a full or closed channel is the target's problem,
    /// never the dispatcher's.
    pub fn try_send(
        &self,
        event: ServerEvent,
    ) -> Result<(), mpsc::error::TrySendError<ServerEvent>> {
        self.sender.try_send(event)
    }

    /// Queue an event, waiting for channel capacity
    pub async fn send(
        &self,
        event: ServerEvent,
    ) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event).await
    }

    /// Check if the outbound channel is closed
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connection_id", &self.connection_id)
            .field("created_at", &self.created_at)
            .finish()
    }
}
