//! Chat room index
//!
//! Maps a chat id to the set of connection ids currently viewing it.
//! Membership here means "socket joined the room", independent of both
//! user presence and the chat's persisted participant list; a connection
//! may join rooms before (or without) ever calling `setup`.

use crate::protocol::ChatId;
use dashmap::DashMap;
use std::collections::HashSet;

/// Live connections per chat room
#[derive(Debug, Default)]
pub struct RoomRoster {
    rooms: DashMap<ChatId, HashSet<String>>,
}

impl RoomRoster {
    /// Create an empty roster
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Add a connection to a room; idempotent
    pub fn join(&self, chat_id: &ChatId, connection_id: &str) {
        self.rooms
            .entry(chat_id.clone())
            .or_default()
            .insert(connection_id.to_string());
    }

    /// Remove a connection from a room, pruning empty entries
    ///
    /// The prune re-checks emptiness under the entry lock so a concurrent
    /// join cannot lose its membership to the removal.
    pub fn leave(&self, chat_id: &ChatId, connection_id: &str) {
        if let Some(mut entry) = self.rooms.get_mut(chat_id) {
            entry.remove(connection_id);
            let empty = entry.is_empty();
            drop(entry);

            if empty {
                self.rooms.remove_if(chat_id, |_, connections| connections.is_empty());
            }
        }
    }

    /// Snapshot of the connections viewing this chat
    ///
    /// An absent entry is the same as an empty room.
    #[must_use]
    pub fn connections_in(&self, chat_id: &ChatId) -> Vec<String> {
        self.rooms
            .get(chat_id)
            .map(|connections| connections.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove a connection from every room it joined
    ///
    /// `joined` is the connection's own room list, so this is O(rooms the
    /// connection joined), not O(all rooms).
    pub fn remove_everywhere(&self, connection_id: &str, joined: &[ChatId]) {
        for chat_id in joined {
            self.leave(chat_id, connection_id);
        }
    }

    /// Number of rooms with at least one live connection
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
