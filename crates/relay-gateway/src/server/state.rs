//! Relay state
//!
//! Shared application state for the socket server.

use crate::connection::ConnectionManager;
use relay_common::AppConfig;
use std::sync::Arc;

/// Relay application state
///
/// Holds the connection manager and configuration; cloned per request by
/// axum, shared by `Arc` underneath.
#[derive(Clone)]
pub struct RelayState {
    /// Connection manager for live WebSocket connections
    manager: Arc<ConnectionManager>,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl RelayState {
    /// Create a new relay state
    pub fn new(manager: Arc<ConnectionManager>, config: AppConfig) -> Self {
        Self {
            manager,
            config: Arc::new(config),
        }
    }

    /// Get the connection manager
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayState")
            .field("manager", &self.manager)
            .field("config", &"AppConfig")
            .finish()
    }
}
