//! roomchat-core: Shared protocol library for the roomchat client.
//!
//! Provides the `[eventName, payload]` JSON envelope codec, typed outgoing
//! commands and incoming server events, and the error taxonomy shared by the
//! client and CLI crates.

pub mod codec;
pub mod error;
pub mod messages;

// Re-export commonly used items at crate root.
pub use codec::{decode, encode, encode_command, Envelope};
pub use error::{ChatError, ChatResult};
pub use messages::{BroadcastMessage, ClientCommand, PrivateMessage, ServerEvent, Welcome};
