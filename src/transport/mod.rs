pub mod websocket;

pub use websocket::WsTransport;

use crate::error::TransportError;
use crate::protocol::{encode_command, ClientCommand};
use crate::state::ConnectionState;
use std::time::Duration;
use tokio::time::Instant;

/// Fixed pause between an unexpected close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Identifies one connection attempt. Ids only grow, so events from a
/// superseded connection can be told apart from the live one.
pub type ConnectionId = u64;

/// Something that happened on a transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened { id: ConnectionId },
    Frame { id: ConnectionId, text: String },
    Error { id: ConnectionId, message: String },
    /// Always the last event of a connection, including failed opens.
    Closed { id: ConnectionId },
}

impl TransportEvent {
    pub fn id(&self) -> ConnectionId {
        match self {
            TransportEvent::Opened { id }
            | TransportEvent::Frame { id, .. }
            | TransportEvent::Error { id, .. }
            | TransportEvent::Closed { id } => *id,
        }
    }
}

/// A duplex text-frame channel to the interpreter server.
///
/// All calls return immediately; outcomes are reported later as
/// [`TransportEvent`]s on the channel the transport was built with.
pub trait Transport: Send {
    fn open(&mut self, id: ConnectionId, url: &str);
    fn send(&mut self, id: ConnectionId, text: String) -> Result<(), TransportError>;
    fn close(&mut self, id: ConnectionId);
}

/// What the session needs to know after a transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionNotice {
    Status(ConnectionState),
    /// The connection just opened; the server handshake follows.
    Opened,
    Frame(String),
}

/// Owns the single live connection, its status and the reconnect timer.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    url: String,
    state: ConnectionState,
    active: Option<ConnectionId>,
    next_id: ConnectionId,
    reconnect_delay: Duration,
    reconnect_at: Option<Instant>,
    attempts: u32,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, url: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            transport,
            url: url.into(),
            state: ConnectionState::Disconnected,
            active: None,
            next_id: 1,
            reconnect_delay,
            reconnect_at: None,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// When the pending reconnect fires, if one is scheduled.
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    fn set_state(&mut self, next: ConnectionState, notices: &mut Vec<ConnectionNotice>) {
        if self.state != next {
            log::info!("[ws] {} -> {}", self.state, next);
            self.state = next;
            notices.push(ConnectionNotice::Status(next));
        }
    }

    /// Open a connection unless one is already open or opening.
    pub fn connect(&mut self) -> Vec<ConnectionNotice> {
        let mut notices = Vec::new();
        if self.active.is_some() {
            log::debug!("[ws] connect ignored; connection already active");
            return notices;
        }
        self.reconnect_at = None;
        let id = self.next_id;
        self.next_id += 1;
        self.active = Some(id);
        log::info!("[ws] connecting to {} (connection {})", self.url, id);
        self.set_state(ConnectionState::Connecting, &mut notices);
        self.transport.open(id, &self.url);
        notices
    }

    /// Close the connection and cancel any pending reconnect. Safe to repeat.
    pub fn disconnect(&mut self) -> Vec<ConnectionNotice> {
        let mut notices = Vec::new();
        if self.reconnect_at.take().is_some() {
            log::info!("[ws] pending reconnect cancelled");
        }
        if let Some(id) = self.active.take() {
            log::info!("[ws] closing connection {}", id);
            self.transport.close(id);
        }
        self.attempts = 0;
        self.set_state(ConnectionState::Disconnected, &mut notices);
        notices
    }

    /// Send a command if connected. Otherwise the command is logged and
    /// dropped; the return value tells whether it was handed to the transport.
    pub fn send(&mut self, command: &ClientCommand) -> bool {
        let id = match (self.state, self.active) {
            (ConnectionState::Connected, Some(id)) => id,
            _ => {
                log::error!(
                    "[ws] not connected ({}); dropping '{}'",
                    self.state,
                    command.kind()
                );
                return false;
            }
        };
        match self.transport.send(id, encode_command(command)) {
            Ok(()) => {
                log::debug!("[ws] sent '{}'", command.kind());
                true
            }
            Err(e) => {
                log::error!("[ws] failed to send '{}': {}", command.kind(), e);
                false
            }
        }
    }

    pub fn on_transport_event(
        &mut self,
        event: TransportEvent,
        now: Instant,
    ) -> Vec<ConnectionNotice> {
        let mut notices = Vec::new();
        if self.active != Some(event.id()) {
            log::debug!("[ws] ignoring event from stale connection {}", event.id());
            return notices;
        }
        match event {
            TransportEvent::Opened { id } => {
                log::info!("[ws] connection {} open", id);
                self.attempts = 0;
                self.set_state(ConnectionState::Connected, &mut notices);
                notices.push(ConnectionNotice::Opened);
            }
            TransportEvent::Frame { text, .. } => {
                notices.push(ConnectionNotice::Frame(text));
            }
            TransportEvent::Error { id, message } => {
                log::error!("[ws] connection {} error: {}", id, message);
                self.set_state(ConnectionState::Error, &mut notices);
            }
            TransportEvent::Closed { id } => {
                self.active = None;
                self.set_state(ConnectionState::Disconnected, &mut notices);
                self.reconnect_at = Some(now + self.reconnect_delay);
                log::info!(
                    "[ws] connection {} closed; reconnecting in {}ms",
                    id,
                    self.reconnect_delay.as_millis()
                );
            }
        }
        notices
    }

    /// Fire the reconnect timer if it is due.
    pub fn poll_reconnect(&mut self, now: Instant) -> Vec<ConnectionNotice> {
        match self.reconnect_at {
            Some(at) if now >= at => {
                self.reconnect_at = None;
                self.attempts = self.attempts.saturating_add(1);
                log::info!("[ws] attempting to reconnect (attempt {})", self.attempts);
                self.connect()
            }
            _ => Vec::new(),
        }
    }
}
