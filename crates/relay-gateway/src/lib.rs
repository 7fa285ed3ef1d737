//! # relay-gateway
//!
//! WebSocket relay that tracks live connections, groups them into chat
//! rooms, and fans messages out to the right targets.

pub mod connection;
pub mod protocol;
pub mod relay;
pub mod server;

pub use server::{create_app, create_router, run, run_server, RelayState};
