//! Connection lifecycle and handshake sequencing.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    EndpointReady,
    Initializing,
    Ready,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::EndpointReady => "endpoint-ready",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the session last entered `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Idle,
    TransportError,
    HandshakeFailed,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub status_text: &'static str,
}

impl ConnectionStatus {
    fn new(connected: bool, status_text: &'static str) -> Self {
        Self {
            connected,
            status_text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointOutcome {
    Accepted,
    /// The frame arrived outside `Connecting`; carries the state it hit.
    Ignored(SessionState),
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    reason: DisconnectReason,
    stream_open: bool,
    submission_address: Option<String>,
    epoch: u64,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self {
            state: SessionState::Disconnected,
            reason: DisconnectReason::Idle,
            stream_open: false,
            submission_address: None,
            epoch: 0,
        }
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn reason(&self) -> Option<DisconnectReason> {
        (self.state == SessionState::Disconnected).then_some(self.reason)
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn is_stream_open(&self) -> bool {
        self.stream_open
    }

    pub fn submission_address(&self) -> Option<&str> {
        self.submission_address.as_deref()
    }

    /// Counts stream connections. Work started under an older epoch belongs
    /// to a connection that is gone.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_shut_down(&self) -> bool {
        self.state == SessionState::Disconnected && self.reason == DisconnectReason::Shutdown
    }

    pub fn start(&mut self) {
        if self.state == SessionState::Disconnected && !self.is_shut_down() {
            self.state = SessionState::Connecting;
        }
    }

    /// A stream (re)opened. Anything learned on a previous connection is
    /// stale at this point.
    pub fn on_opened(&mut self) {
        if self.is_shut_down() {
            return;
        }
        if self.state != SessionState::Connecting {
            self.submission_address = None;
        }
        self.epoch += 1;
        self.state = SessionState::Connecting;
        self.stream_open = true;
    }

    pub fn on_endpoint(&mut self, address: &str) -> EndpointOutcome {
        if self.state != SessionState::Connecting {
            return EndpointOutcome::Ignored(self.state);
        }
        self.submission_address = Some(address.to_string());
        self.state = SessionState::EndpointReady;
        EndpointOutcome::Accepted
    }

    /// Moves `EndpointReady` to `Initializing`. Returns false when the
    /// handshake must not be started from the current state.
    pub fn begin_initialize(&mut self) -> bool {
        if self.state != SessionState::EndpointReady {
            return false;
        }
        self.state = SessionState::Initializing;
        true
    }

    pub fn on_initialized(&mut self) -> bool {
        if self.state != SessionState::Initializing {
            return false;
        }
        self.state = SessionState::Ready;
        true
    }

    /// Stops the handshake. The address is kept since the stream is still
    /// up; only a reconnect restarts the sequence.
    pub fn on_handshake_failed(&mut self) -> bool {
        if self.state != SessionState::Initializing {
            return false;
        }
        self.state = SessionState::Disconnected;
        self.reason = DisconnectReason::HandshakeFailed;
        true
    }

    pub fn on_transport_error(&mut self) {
        if self.is_shut_down() {
            return;
        }
        self.state = SessionState::Disconnected;
        self.reason = DisconnectReason::TransportError;
        self.stream_open = false;
        self.submission_address = None;
        self.epoch += 1;
    }

    pub fn shutdown(&mut self) {
        self.state = SessionState::Disconnected;
        self.reason = DisconnectReason::Shutdown;
        self.stream_open = false;
        self.submission_address = None;
    }

    pub fn status(&self) -> ConnectionStatus {
        if self.state == SessionState::Disconnected {
            return match self.reason {
                DisconnectReason::Idle | DisconnectReason::Shutdown => {
                    ConnectionStatus::new(false, "Disconnected")
                }
                DisconnectReason::TransportError => ConnectionStatus::new(false, "Reconnecting..."),
                DisconnectReason::HandshakeFailed => {
                    ConnectionStatus::new(false, "Handshake failed")
                }
            };
        }
        if self.stream_open {
            ConnectionStatus::new(true, "Connected")
        } else {
            ConnectionStatus::new(false, "Connecting...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_machine() -> SessionMachine {
        let mut machine = SessionMachine::new();
        machine.start();
        machine.on_opened();
        assert_eq!(machine.on_endpoint("/msg/abc123"), EndpointOutcome::Accepted);
        assert!(machine.begin_initialize());
        assert!(machine.on_initialized());
        machine
    }

    #[test]
    fn walks_the_happy_path() {
        let mut machine = SessionMachine::new();
        assert_eq!(machine.status().status_text, "Disconnected");

        machine.start();
        assert_eq!(machine.state(), SessionState::Connecting);
        assert_eq!(machine.status().status_text, "Connecting...");

        machine.on_opened();
        assert_eq!(
            machine.status(),
            ConnectionStatus {
                connected: true,
                status_text: "Connected"
            }
        );

        assert_eq!(machine.on_endpoint("/msg/abc123"), EndpointOutcome::Accepted);
        assert_eq!(machine.state(), SessionState::EndpointReady);
        assert_eq!(machine.submission_address(), Some("/msg/abc123"));

        assert!(machine.begin_initialize());
        assert_eq!(machine.state(), SessionState::Initializing);
        assert!(machine.on_initialized());
        assert!(machine.is_ready());
    }

    #[test]
    fn endpoint_outside_connecting_is_ignored() {
        let mut machine = ready_machine();
        assert_eq!(
            machine.on_endpoint("/msg/other"),
            EndpointOutcome::Ignored(SessionState::Ready)
        );
        assert_eq!(machine.submission_address(), Some("/msg/abc123"));
        assert!(!machine.begin_initialize());
    }

    #[test]
    fn transport_error_clears_connection_scope() {
        let mut machine = ready_machine();
        machine.on_transport_error();
        assert_eq!(machine.state(), SessionState::Disconnected);
        assert_eq!(machine.reason(), Some(DisconnectReason::TransportError));
        assert_eq!(machine.submission_address(), None);
        assert_eq!(machine.status().status_text, "Reconnecting...");
        assert!(!machine.status().connected);

        machine.on_opened();
        assert_eq!(machine.state(), SessionState::Connecting);
        assert_eq!(machine.reason(), None);
    }

    #[test]
    fn handshake_failure_keeps_address_until_reconnect() {
        let mut machine = SessionMachine::new();
        machine.start();
        machine.on_opened();
        machine.on_endpoint("/msg/abc123");
        machine.begin_initialize();

        assert!(machine.on_handshake_failed());
        assert_eq!(machine.reason(), Some(DisconnectReason::HandshakeFailed));
        assert_eq!(machine.submission_address(), Some("/msg/abc123"));
        assert_eq!(machine.status().status_text, "Handshake failed");
        assert!(!machine.on_initialized());
    }

    #[test]
    fn endpoint_address_is_stored_as_sent() {
        let mut machine = SessionMachine::new();
        machine.start();
        machine.on_opened();
        machine.on_endpoint(" /msg/abc123?session_id=x ");
        assert_eq!(machine.submission_address(), Some(" /msg/abc123?session_id=x "));
    }

    #[test]
    fn every_connection_gets_a_new_epoch() {
        let mut machine = SessionMachine::new();
        machine.start();
        machine.on_opened();
        let first = machine.epoch();
        machine.on_endpoint("/msg/old");

        machine.on_transport_error();
        assert_ne!(machine.epoch(), first);
        machine.on_opened();
        let second = machine.epoch();
        assert!(second > first);

        // A duplicate endpoint does not open a new connection.
        machine.on_endpoint("/msg/new");
        machine.on_endpoint("/msg/other");
        assert_eq!(machine.epoch(), second);
    }

    #[test]
    fn shutdown_is_sticky() {
        let mut machine = ready_machine();
        machine.shutdown();
        machine.on_opened();
        machine.on_transport_error();
        machine.start();
        assert_eq!(machine.reason(), Some(DisconnectReason::Shutdown));
        assert_eq!(machine.status().status_text, "Disconnected");
    }
}
