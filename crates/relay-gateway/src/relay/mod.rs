//! Relay dispatch
//!
//! Consumes inbound client events, mutates the presence and room indexes,
//! and fans messages out to the right target connections.

mod dispatcher;

pub use dispatcher::RelayDispatcher;
