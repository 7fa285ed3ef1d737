//! Connection management
//!
//! Tracks live WebSocket connections, which user each one belongs to,
//! and which chat rooms each one is viewing.

mod connection;
mod manager;
mod registry;
mod rooms;

pub use connection::{Connection, ConnectionState};
pub use manager::ConnectionManager;
pub use registry::PresenceRegistry;
pub use rooms::RoomRoster;
