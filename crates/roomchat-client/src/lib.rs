//! roomchat-client: Rust client library for a room-based WebSocket chat.
//!
//! Keeps one WebSocket connection, speaks the `[event, payload]` envelope
//! protocol, and hands everything that arrives on the network task to a single
//! consumer through a dispatch queue. The host owns a [`ChatClient`] and calls
//! [`ChatClient::tick`] periodically; results come back through a
//! [`ChatObserver`].
//!
//! # Quick Start
//!
//! ```no_run
//! use roomchat_client::{ChatClient, ChatObserver, ClientConfig, StatusSeverity};
//!
//! struct Printer;
//!
//! impl ChatObserver for Printer {
//!     fn on_status_changed(&mut self, text: &str, _severity: StatusSeverity) {
//!         println!("status: {text}");
//!     }
//!
//!     fn on_log_line(&mut self, line: &str) {
//!         println!("{line}");
//!     }
//! }
//!
//! # async fn example() {
//! let mut client = ChatClient::new(
//!     ClientConfig {
//!         server_url: "wss://chat.example.com".into(),
//!         username: "alice".into(),
//!         ..Default::default()
//!     },
//!     Printer,
//!     tokio::runtime::Handle::current(),
//! );
//! client.start();
//!
//! let mut ticker = tokio::time::interval(std::time::Duration::from_millis(16));
//! loop {
//!     ticker.tick().await;
//!     client.tick();
//! }
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod dispatch;
pub mod router;
pub mod session;
pub mod transport;

// Re-export primary public types.
pub use client::{
    ChatClient, ChatCore, ChatHandle, ChatObserver, ClientConfig, JoinMode, SendOutcome,
    StatusSeverity,
};
pub use connection::{ConnectionState, TransportEvent};
pub use dispatch::{Completion, DispatchHandle, Dispatcher};
pub use router::{DisplayZone, Router, UnknownEventPolicy};
pub use session::SessionContext;
pub use transport::TlsPolicy;

// Re-export roomchat-core error types for convenience.
pub use roomchat_core::{ChatError, ChatResult};
