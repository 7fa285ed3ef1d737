//! Connection manager
//!
//! Owns the connection table plus the presence and room indexes, and
//! carries the session lifecycle: register on accept, bind on `setup`,
//! tear everything down on disconnect.

use super::{Connection, ConnectionState, PresenceRegistry, RoomRoster};
use crate::protocol::{ChatId, ServerEvent, UserId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Manages all live connections and their indexes
///
/// Constructed once at process start and shared by handle; the indexes
/// are never ambient global state.
pub struct ConnectionManager {
    /// Live connections by connection id
    connections: DashMap<String, Arc<Connection>>,

    /// User id to connection ids
    presence: PresenceRegistry,

    /// Chat id to connection ids
    rooms: RoomRoster,
}

impl ConnectionManager {
    /// Create a new connection manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            presence: PresenceRegistry::new(),
            rooms: RoomRoster::new(),
        }
    }

    /// Create a new connection manager wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection
    pub fn add_connection(
        &self,
        connection_id: String,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Arc<Connection> {
        let connection = Connection::new(connection_id.clone(), sender);
        self.connections.insert(connection_id.clone(), connection.clone());

        tracing::debug!(connection_id = %connection_id, "Connection added");

        connection
    }

    /// Get a connection by id
    pub fn get_connection(&self, connection_id: &str) -> Option<Arc<Connection>> {
        self.connections.get(connection_id).map(|r| r.clone())
    }

    /// Bind a connection to a user identity (`setup`)
    ///
    /// Idempotent; rebinding to a different user moves the connection out
    /// of the prior user's presence set. Returns false when the
    /// connection is unknown or the user id is empty.
    pub async fn bind_user(&self, connection_id: &str, user_id: UserId) -> bool {
        if user_id.is_empty() {
            return false;
        }

        let Some(connection) = self.get_connection(connection_id) else {
            return false;
        };

        let previous = connection.bind(user_id.clone()).await;
        if let Some(previous) = previous.filter(|p| *p != user_id) {
            self.presence.unbind(&previous, connection_id);
        }
        self.presence.bind(&user_id, connection_id);

        tracing::debug!(
            connection_id = %connection_id,
            user_id = %user_id,
            "Connection bound to user"
        );

        true
    }

    /// Add a connection to a chat room (`joinChat`)
    ///
    /// Idempotent, and valid before `setup`; room membership and user
    /// presence are independent indexes.
    pub async fn join_room(&self, connection_id: &str, chat_id: ChatId) -> bool {
        let Some(connection) = self.get_connection(connection_id) else {
            return false;
        };

        connection.join_room(chat_id.clone()).await;
        self.rooms.join(&chat_id, connection_id);

        tracing::trace!(
            connection_id = %connection_id,
            chat_id = %chat_id,
            "Connection joined room"
        );

        true
    }

    /// Tear down a connection on transport disconnect
    ///
    /// Unbinds presence and removes the connection from every room it
    /// joined; both run even for connections that never bound or never
    /// joined anything.
    pub async fn remove_connection(&self, connection_id: &str) {
        if let Some((_, connection)) = self.connections.remove(connection_id) {
            connection.set_state(ConnectionState::TornDown).await;

            if let Some(user_id) = connection.user_id().await {
                self.presence.unbind(&user_id, connection_id);
            }

            let joined = connection.rooms().await;
            self.rooms.remove_everywhere(connection_id, &joined);

            tracing::debug!(connection_id = %connection_id, "Connection removed");
        }
    }

    /// Get all connections bound to a user
    pub fn connections_for_user(&self, user_id: &UserId) -> Vec<Arc<Connection>> {
        self.presence
            .connections_for(user_id)
            .iter()
            .filter_map(|id| self.get_connection(id))
            .collect()
    }

    /// Get all connections currently viewing a chat
    pub fn connections_in_room(&self, chat_id: &ChatId) -> Vec<Arc<Connection>> {
        self.rooms
            .connections_in(chat_id)
            .iter()
            .filter_map(|id| self.get_connection(id))
            .collect()
    }

    /// Deliver an event to every connection of a user
    ///
    /// Best effort per target: a full or closed channel is skipped, the
    /// other targets still get their copy.
    pub fn send_to_user(&self, user_id: &UserId, event: &ServerEvent) -> usize {
        let mut sent = 0;

        for connection in self.connections_for_user(user_id) {
            if connection.try_send(event.clone()).is_ok() {
                sent += 1;
            } else {
                tracing::trace!(
                    connection_id = %connection.connection_id(),
                    "Dropped delivery to unreachable connection"
                );
            }
        }

        tracing::trace!(user_id = %user_id, sent = sent, "Delivered to user connections");

        sent
    }

    /// Deliver an event to every connection in a chat room
    pub fn send_to_room(&self, chat_id: &ChatId, event: &ServerEvent) -> usize {
        let mut sent = 0;

        for connection in self.connections_in_room(chat_id) {
            if connection.try_send(event.clone()).is_ok() {
                sent += 1;
            } else {
                tracing::trace!(
                    connection_id = %connection.connection_id(),
                    "Dropped delivery to unreachable connection"
                );
            }
        }

        tracing::trace!(chat_id = %chat_id, sent = sent, "Delivered to room connections");

        sent
    }

    /// Total number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of users with at least one live connection
    pub fn user_count(&self) -> usize {
        self.presence.user_count()
    }

    /// Number of rooms with at least one live connection
    pub fn room_count(&self) -> usize {
        self.rooms.room_count()
    }

    /// Check if a connection id is live
    pub fn has_connection(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connections.len())
            .field("users", &self.presence.user_count())
            .field("rooms", &self.rooms.room_count())
            .finish()
    }
}
