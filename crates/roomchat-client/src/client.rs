//! The roomchat client facade.
//!
//! [`ChatClient`] is owned by the consumer thread. It composes the connection,
//! session, router and dispatch queue, and reports to a [`ChatObserver`]. Any
//! other thread talks to it through a [`ChatHandle`], which only enqueues.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use roomchat_core::codec::encode_command;
use roomchat_core::error::ChatError;
use roomchat_core::messages::ClientCommand;

use crate::connection::{CloseOutcome, Connection, ConnectionState, TransportEvent};
use crate::dispatch::{self, Completion, DispatchHandle, Dispatcher};
use crate::router::{DisplayZone, Router, UnknownEventPolicy};
use crate::session::SessionContext;
use crate::transport::{websocket, TlsPolicy};

/// Configuration for a [`ChatClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `ws://` or `wss://` endpoint.
    pub server_url: String,
    pub auth_token: String,
    /// Room joined on open.
    pub room_id: String,
    pub username: String,
    /// Whether to connect on start or wait for [`ChatClient::join`].
    pub join_mode: JoinMode,
    /// Minimum TLS version for `wss://`.
    pub tls: TlsPolicy,
    pub unknown_events: UnknownEventPolicy,
    /// Zone for broadcast timestamps.
    pub zone: DisplayZone,
    /// Handshake timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:4000".to_string(),
            auth_token: "12345".to_string(),
            room_id: "room1".to_string(),
            username: String::new(),
            join_mode: JoinMode::Fixed,
            tls: TlsPolicy::default(),
            unknown_events: UnknownEventPolicy::default(),
            zone: DisplayZone::default(),
            connect_timeout_secs: 10,
        }
    }
}

/// How the first join happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Connect on start with the configured room.
    #[default]
    Fixed,
    /// Wait for the collaborator to supply a username and room.
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSeverity {
    Ok,
    Warning,
    Error,
}

/// Result of a send request. Sends never fail with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame handed to the socket.
    Sent,
    /// Dropped because the connection is not open.
    NotConnected,
    /// Dropped because the input was incomplete.
    Rejected,
}

/// Callbacks into the presentation layer. Always invoked on the consumer thread.
pub trait ChatObserver {
    fn on_status_changed(&mut self, text: &str, severity: StatusSeverity);

    fn on_log_line(&mut self, line: &str);

    /// The last outgoing message was sent; input fields may be cleared.
    fn on_input_cleared(&mut self) {}
}

/// Consumer-side state. Queued actions run against this.
pub struct ChatCore {
    config: ClientConfig,
    session: SessionContext,
    connection: Connection,
    router: Router,
    observer: Box<dyn ChatObserver>,
    dispatch: DispatchHandle<ChatCore>,
    runtime: Handle,
}

impl ChatCore {
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Initial action for the configured [`JoinMode`].
    pub fn start(&mut self) {
        match self.config.join_mode {
            JoinMode::Fixed => self.request_connect(),
            JoinMode::Prompt => {
                tracing::debug!("waiting for username and room before connecting");
            }
        }
    }

    /// Open a new connection, closing the current one first if needed.
    ///
    /// Failures show up as a status change, never as an error.
    pub fn request_connect(&mut self) {
        if !self.connection.state().can_reconnect() {
            tracing::info!("closing current connection before reconnecting");
            self.connection.close();
        }

        let generation = self.connection.begin();
        let dispatch = self.dispatch.clone();
        let emit = move |event: TransportEvent| {
            dispatch.enqueue(move |core: &mut ChatCore| core.on_transport_event(generation, event));
        };

        tracing::info!(url = %self.config.server_url, generation, "connecting");
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        match websocket::spawn(
            &self.runtime,
            &self.config.server_url,
            self.config.tls,
            timeout,
            emit,
        ) {
            Ok(task) => self.connection.attach(task.outgoing, Some(task.handle)),
            Err(e) => {
                let reason = match e {
                    ChatError::ConnectFailure(reason) => reason,
                    other => other.to_string(),
                };
                self.on_transport_event(generation, TransportEvent::ConnectFailed(reason));
            }
        }
    }

    pub fn request_close(&mut self) {
        match self.connection.close() {
            CloseOutcome::NoOp => tracing::debug!("close requested while not connected"),
            CloseOutcome::Closing => tracing::info!("closing connection"),
            CloseOutcome::Aborted => {
                tracing::info!("abandoned pending connection");
                self.set_status("Disconnected", StatusSeverity::Warning);
            }
        }
    }

    /// Close without waiting for the remote side. Used on host exit.
    pub fn shutdown(&mut self) {
        if self.connection.close() != CloseOutcome::NoOp {
            self.log("connection closed");
        }
    }

    /// Send the join request for the current room.
    pub fn send_join(&mut self) -> SendOutcome {
        let command = self.session.join_command();
        self.send_command(&command)
    }

    /// Switch rooms on the open connection.
    pub fn change_room(&mut self, room_id: &str) -> SendOutcome {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            self.log("room id is required");
            return SendOutcome::Rejected;
        }
        self.session.set_room_id(room_id);
        self.send_join()
    }

    /// Set identity and room, then reconnect. Returns `Sent` once the
    /// connection attempt has started; the join follows on open.
    pub fn join(&mut self, username: &str, room_id: &str) -> SendOutcome {
        let (username, room_id) = (username.trim(), room_id.trim());
        if username.is_empty() || room_id.is_empty() {
            self.log("username and room id are required");
            return SendOutcome::Rejected;
        }
        self.session.set_username(username);
        self.session.set_room_id(room_id);
        self.request_connect();
        SendOutcome::Sent
    }

    /// Broadcast to the current room. Blank text is ignored.
    pub fn send_broadcast(&mut self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Rejected;
        }
        let command = self.session.broadcast_command(text);
        let outcome = self.send_command(&command);
        if outcome == SendOutcome::Sent {
            self.observer.on_input_cleared();
        }
        outcome
    }

    pub fn send_private(&mut self, target_id: &str, text: &str) -> SendOutcome {
        let target_id = target_id.trim();
        if target_id.is_empty() || text.trim().is_empty() {
            self.log("message and target id are required");
            return SendOutcome::Rejected;
        }
        let command = self.session.private_command(target_id, text);
        let outcome = self.send_command(&command);
        if outcome == SendOutcome::Sent {
            self.log(format!("private message sent to {target_id}: {text}"));
            self.observer.on_input_cleared();
        }
        outcome
    }

    pub(crate) fn on_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if !self.connection.apply(generation, &event) {
            tracing::debug!(generation, ?event, "ignoring event from superseded connection");
            return;
        }

        match event {
            TransportEvent::Opened => {
                tracing::info!("connection open");
                self.set_status("Connected", StatusSeverity::Ok);
                self.send_join();
            }
            TransportEvent::Text(text) => {
                tracing::debug!(frame = %text, "received");
                if let Some(line) = self.router.route_text(&text, &mut self.session) {
                    self.log(line);
                }
            }
            TransportEvent::Error(message) => {
                tracing::error!("transport error: {message}");
                self.set_status(format!("Error: {message}"), StatusSeverity::Error);
            }
            TransportEvent::Closed { reason } => {
                tracing::info!(?reason, "connection closed");
                self.set_status("Disconnected", StatusSeverity::Warning);
            }
            TransportEvent::ConnectFailed(message) => {
                tracing::error!("connect failed: {message}");
                self.set_status(format!("Connection failed: {message}"), StatusSeverity::Error);
            }
        }
    }

    fn send_command(&mut self, command: &ClientCommand) -> SendOutcome {
        if !self.connection.state().is_open() {
            self.log("not connected; message not sent");
            return SendOutcome::NotConnected;
        }

        let text = match encode_command(command) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("failed to encode {}: {e}", command.event_name());
                self.log(format!("[ERROR] {e}"));
                return SendOutcome::Rejected;
            }
        };

        tracing::debug!(frame = %text, "sending");
        match self.connection.send_text(text) {
            Ok(()) => SendOutcome::Sent,
            Err(e) => {
                tracing::warn!("send failed: {e}");
                self.log("not connected; message not sent");
                SendOutcome::NotConnected
            }
        }
    }

    fn set_status(&mut self, text: impl Into<String>, severity: StatusSeverity) {
        let text = text.into();
        self.observer.on_status_changed(&text, severity);
        self.log(format!("[STATUS] {text}"));
    }

    fn log(&mut self, line: impl AsRef<str>) {
        self.observer.on_log_line(line.as_ref());
    }

    #[cfg(test)]
    pub(crate) fn attach_test_socket(
        &mut self,
    ) -> (u64, tokio::sync::mpsc::UnboundedReceiver<crate::connection::Outgoing>) {
        let generation = self.connection.begin();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.connection.attach(tx, None);
        (generation, rx)
    }
}

/// The consumer-side client. Call [`tick`](Self::tick) once per host frame.
pub struct ChatClient {
    core: ChatCore,
    dispatcher: Dispatcher<ChatCore>,
}

impl ChatClient {
    /// Build a client. Socket tasks are spawned on `runtime`.
    pub fn new<O>(config: ClientConfig, observer: O, runtime: Handle) -> Self
    where
        O: ChatObserver + 'static,
    {
        let (dispatch, dispatcher) = dispatch::channel();
        let session = SessionContext::new(
            config.username.clone(),
            config.room_id.clone(),
            config.auth_token.clone(),
        );
        let router = Router::new(config.unknown_events, config.zone);
        let core = ChatCore {
            config,
            session,
            connection: Connection::new(),
            router,
            observer: Box::new(observer),
            dispatch,
            runtime,
        };
        Self { core, dispatcher }
    }

    /// Connect now in `Fixed` mode; in `Prompt` mode wait for [`join`](Self::join).
    pub fn start(&mut self) {
        self.core.start();
    }

    /// Run all queued actions. Returns how many ran.
    pub fn tick(&mut self) -> usize {
        self.dispatcher.drain(&mut self.core)
    }

    /// A handle for other threads.
    pub fn handle(&self) -> ChatHandle {
        ChatHandle {
            dispatch: self.dispatcher.handle(),
        }
    }

    /// Actions waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.dispatcher.pending()
    }

    pub fn core(&self) -> &ChatCore {
        &self.core
    }

    pub fn state(&self) -> ConnectionState {
        self.core.state()
    }

    pub fn session(&self) -> &SessionContext {
        self.core.session()
    }

    pub fn request_connect(&mut self) {
        self.core.request_connect();
    }

    pub fn request_close(&mut self) {
        self.core.request_close();
    }

    pub fn send_join(&mut self) -> SendOutcome {
        self.core.send_join()
    }

    pub fn change_room(&mut self, room_id: &str) -> SendOutcome {
        self.core.change_room(room_id)
    }

    pub fn join(&mut self, username: &str, room_id: &str) -> SendOutcome {
        self.core.join(username, room_id)
    }

    pub fn send_broadcast(&mut self, text: &str) -> SendOutcome {
        self.core.send_broadcast(text)
    }

    pub fn send_private(&mut self, target_id: &str, text: &str) -> SendOutcome {
        self.core.send_private(target_id, text)
    }

    pub fn shutdown(&mut self) {
        self.core.shutdown();
    }
}

/// Thread-safe front for a [`ChatClient`]. Every call is queued and runs on
/// the consumer's next tick.
#[derive(Clone)]
pub struct ChatHandle {
    dispatch: DispatchHandle<ChatCore>,
}

impl ChatHandle {
    pub fn request_connect(&self) {
        self.dispatch.enqueue(|core: &mut ChatCore| core.request_connect());
    }

    pub fn request_close(&self) {
        self.dispatch.enqueue(|core: &mut ChatCore| core.request_close());
    }

    pub fn shutdown(&self) {
        self.dispatch.enqueue(|core: &mut ChatCore| core.shutdown());
    }

    pub fn send_broadcast(&self, text: impl Into<String>) {
        let _ = self.send_broadcast_and_wait(text);
    }

    pub fn send_private(&self, target_id: impl Into<String>, text: impl Into<String>) {
        let _ = self.send_private_and_wait(target_id, text);
    }

    pub fn change_room(&self, room_id: impl Into<String>) {
        let _ = self.change_room_and_wait(room_id);
    }

    pub fn join(&self, username: impl Into<String>, room_id: impl Into<String>) {
        let _ = self.join_and_wait(username, room_id);
    }

    pub fn send_broadcast_and_wait(&self, text: impl Into<String>) -> Completion<SendOutcome> {
        let text = text.into();
        self.dispatch
            .enqueue_awaitable(move |core: &mut ChatCore| core.send_broadcast(&text))
    }

    pub fn send_private_and_wait(
        &self,
        target_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Completion<SendOutcome> {
        let (target_id, text) = (target_id.into(), text.into());
        self.dispatch
            .enqueue_awaitable(move |core: &mut ChatCore| core.send_private(&target_id, &text))
    }

    pub fn change_room_and_wait(&self, room_id: impl Into<String>) -> Completion<SendOutcome> {
        let room_id = room_id.into();
        self.dispatch
            .enqueue_awaitable(move |core: &mut ChatCore| core.change_room(&room_id))
    }

    pub fn join_and_wait(
        &self,
        username: impl Into<String>,
        room_id: impl Into<String>,
    ) -> Completion<SendOutcome> {
        let (username, room_id) = (username.into(), room_id.into());
        self.dispatch
            .enqueue_awaitable(move |core: &mut ChatCore| core.join(&username, &room_id))
    }

    /// Run an arbitrary closure against the consumer state on the next tick.
    pub fn with_core<F, R>(&self, f: F) -> Completion<R>
    where
        F: FnOnce(&mut ChatCore) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.dispatch.enqueue_awaitable(f)
    }
}
