//! User presence index
//!
//! Maps a user id to the set of live connection ids bound to it. A
//! connection id appears under at most one user at a time; the manager
//! enforces that by unbinding the prior user on rebind.

use crate::protocol::UserId;
use dashmap::DashMap;
use std::collections::HashSet;

/// Live connections per user
///
/// Backed by `DashMap`: mutations on different user ids proceed in
/// parallel, mutations on the same id are serialized by the shard lock.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    users: DashMap<UserId, HashSet<String>>,
}

impl PresenceRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    /// Add a connection to a user's set; idempotent
    pub fn bind(&self, user_id: &UserId, connection_id: &str) {
        self.users
            .entry(user_id.clone())
            .or_default()
            .insert(connection_id.to_string());
    }

    /// Remove a connection from a user's set, pruning empty entries
    ///
    /// Safe to call when the connection was never bound. The prune
    /// re-checks emptiness under the entry lock so it cannot race a
    /// concurrent bind into deleting a refilled set.
    pub fn unbind(&self, user_id: &UserId, connection_id: &str) {
        if let Some(mut entry) = self.users.get_mut(user_id) {
            entry.remove(connection_id);
            let empty = entry.is_empty();
            drop(entry);

            if empty {
                self.users.remove_if(user_id, |_, connections| connections.is_empty());
            }
        }
    }

    /// Snapshot of the user's live connection ids; empty means offline
    #[must_use]
    pub fn connections_for(&self, user_id: &UserId) -> Vec<String> {
        self.users
            .get(user_id)
            .map(|connections| connections.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether the user has at least one live connection
    #[must_use]
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.users.get(user_id).is_some_and(|c| !c.is_empty())
    }

    /// Number of users with at least one live connection
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}
