//! Consumer-side view of the socket lifecycle.
//!
//! The socket itself lives in a task (see [`crate::transport::websocket`]).
//! [`Connection`] holds the application-visible state and the sender half of
//! the outgoing queue, and is only touched on the consumer thread. State
//! changes come from [`TransportEvent`]s after they have been drained from the
//! dispatch queue.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use roomchat_core::error::{ChatError, ChatResult};

/// Lifecycle state of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in flight.
    Connecting,
    /// Frames may be sent.
    Open,
    /// We sent a close frame and are waiting for the socket to end.
    Closing,
    /// No socket.
    Closed,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    /// Whether a fresh `connect` may start without closing anything first.
    ///
    /// This is where a retry policy would hook in; the client never
    /// reconnects on its own.
    pub fn can_reconnect(self) -> bool {
        self == Self::Closed
    }
}

/// Raw observation from a socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Text(String),
    /// Mid-session error; does not close the connection by itself.
    Error(String),
    Closed { reason: Option<String> },
    ConnectFailed(String),
}

/// Frames queued for the socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Text(String),
    Close,
}

/// What a call to [`Connection::close`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Already closed or closing.
    NoOp,
    /// Close frame queued; `Closed` follows when the socket ends.
    Closing,
    /// A pending handshake was abandoned; the connection is closed now.
    Aborted,
}

/// The single connection owned by the client.
#[derive(Debug)]
pub struct Connection {
    state: ConnectionState,
    /// Bumped for every attempt so events from a superseded socket are ignored.
    generation: u64,
    outgoing: Option<mpsc::UnboundedSender<Outgoing>>,
    task: Option<JoinHandle<()>>,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Closed,
            generation: 0,
            outgoing: None,
            task: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a new attempt. Returns the generation its events must carry.
    pub(crate) fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.outgoing = None;
        self.task = None;
        self.generation
    }

    /// Bind the socket task for the current attempt.
    pub(crate) fn attach(
        &mut self,
        outgoing: mpsc::UnboundedSender<Outgoing>,
        task: Option<JoinHandle<()>>,
    ) {
        self.outgoing = Some(outgoing);
        self.task = task;
    }

    /// Apply a transport event. Returns `false` if it belongs to an older
    /// attempt and must be ignored.
    pub(crate) fn apply(&mut self, generation: u64, event: &TransportEvent) -> bool {
        if generation != self.generation {
            return false;
        }
        match event {
            TransportEvent::Opened => {
                if self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::Open;
                }
            }
            TransportEvent::Closed { .. } | TransportEvent::ConnectFailed(_) => {
                self.state = ConnectionState::Closed;
                self.outgoing = None;
                self.task = None;
            }
            TransportEvent::Text(_) | TransportEvent::Error(_) => {}
        }
        true
    }

    /// Queue a text frame. Fails with [`ChatError::NotConnected`] unless open.
    pub(crate) fn send_text(&self, text: String) -> ChatResult<()> {
        if !self.state.is_open() {
            return Err(ChatError::NotConnected);
        }
        let outgoing = self.outgoing.as_ref().ok_or(ChatError::NotConnected)?;
        outgoing
            .send(Outgoing::Text(text))
            .map_err(|_| ChatError::Transport("socket task has stopped".into()))
    }

    /// Request an orderly close. Idempotent.
    pub(crate) fn close(&mut self) -> CloseOutcome {
        match self.state {
            ConnectionState::Closed | ConnectionState::Closing => CloseOutcome::NoOp,
            ConnectionState::Open => {
                self.state = ConnectionState::Closing;
                if let Some(outgoing) = &self.outgoing {
                    let _ = outgoing.send(Outgoing::Close);
                }
                CloseOutcome::Closing
            }
            ConnectionState::Connecting => {
                if let Some(task) = self.task.take() {
                    task.abort();
                }
                // Anything the aborted task already queued is now stale.
                self.generation += 1;
                self.state = ConnectionState::Closed;
                self.outgoing = None;
                CloseOutcome::Aborted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_connection() -> (Connection, mpsc::UnboundedReceiver<Outgoing>, u64) {
        let mut conn = Connection::new();
        let gen = conn.begin();
        let (tx, rx) = mpsc::unbounded_channel();
        conn.attach(tx, None);
        assert!(conn.apply(gen, &TransportEvent::Opened));
        (conn, rx, gen)
    }

    #[test]
    fn starts_closed() {
        let conn = Connection::new();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(conn.state().can_reconnect());
    }

    #[test]
    fn open_then_remote_close() {
        let (mut conn, _rx, gen) = open_connection();
        assert_eq!(conn.state(), ConnectionState::Open);
        assert!(conn.apply(gen, &TransportEvent::Closed { reason: None }));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn error_does_not_close() {
        let (mut conn, _rx, gen) = open_connection();
        conn.apply(gen, &TransportEvent::Error("reset".into()));
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[test]
    fn send_requires_open() {
        let mut conn = Connection::new();
        assert!(matches!(conn.send_text("x".into()), Err(ChatError::NotConnected)));

        conn.begin();
        assert!(matches!(conn.send_text("x".into()), Err(ChatError::NotConnected)));
    }

    #[test]
    fn send_queues_text_frame() {
        let (conn, mut rx, _) = open_connection();
        conn.send_text("[\"join\",{}]".into()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Outgoing::Text("[\"join\",{}]".into()));
    }

    #[test]
    fn close_is_idempotent() {
        let (mut conn, mut rx, gen) = open_connection();
        assert_eq!(conn.close(), CloseOutcome::Closing);
        assert_eq!(conn.state(), ConnectionState::Closing);
        assert_eq!(rx.try_recv().unwrap(), Outgoing::Close);

        assert_eq!(conn.close(), CloseOutcome::NoOp);
        assert!(rx.try_recv().is_err());

        conn.apply(gen, &TransportEvent::Closed { reason: None });
        assert_eq!(conn.close(), CloseOutcome::NoOp);
    }

    #[test]
    fn closing_a_pending_attempt_drops_its_events() {
        let mut conn = Connection::new();
        let gen = conn.begin();
        assert_eq!(conn.close(), CloseOutcome::Aborted);
        assert_eq!(conn.state(), ConnectionState::Closed);

        assert!(!conn.apply(gen, &TransportEvent::Opened));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn stale_generation_is_ignored() {
        let (mut conn, _rx, old) = open_connection();
        conn.close();
        let new = conn.begin();
        assert_ne!(old, new);

        assert!(!conn.apply(old, &TransportEvent::Closed { reason: None }));
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }
}
