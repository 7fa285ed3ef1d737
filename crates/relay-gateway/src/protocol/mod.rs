//! Wire protocol
//!
//! Event names and payload shapes exchanged with clients.

mod events;
mod ids;

pub use events::{group_member_ids, ClientEvent, MessageEnvelope, SendPayload, ServerEvent};
pub use ids::{ChatId, UserId};
