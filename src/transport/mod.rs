//! Session transport
//!
//! Accepts TCP connections and UDP datagrams, forwards payloads to the
//! inference engine, and returns responses. Each accepted TCP connection
//! gets one session worker; a session is one request/response exchange,
//! then the connection is closed. Admission is bounded by a semaphore so
//! concurrent sessions never exceed the configured limit.

pub mod tcp;
pub mod udp;

use std::net::SocketAddr;

use uuid::Uuid;

pub use tcp::{connect_with_retry, send_request, TcpServer};
pub use udp::{UdpServer, UDP_BUFFER_SIZE};

/// Which transport a session arrived over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Framed request/response over a connection
    Tcp,
    /// Unframed datagrams
    Udp,
}

/// Lifecycle of one session worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Assembling the request frame
    Reading,
    /// Request forwarded to the inference engine
    Processing,
    /// Writing the response frame
    Responding,
    /// Exchange finished, connection closed
    Closed,
}

/// One accepted connection's request/response exchange
///
/// Owned exclusively by its worker task and destroyed when the worker
/// exits.
#[derive(Debug)]
pub struct Session {
    /// Session identifier, for log correlation
    pub id: Uuid,
    /// Transport the session arrived over
    pub transport: TransportKind,
    /// Remote peer address
    pub peer: SocketAddr,
    /// Current lifecycle state
    pub state: SessionState,
}

impl Session {
    /// Create a session in the `Reading` state
    #[must_use]
    pub fn new(transport: TransportKind, peer: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            peer,
            state: SessionState::Reading,
        }
    }

    /// Advance the session lifecycle
    pub fn advance(&mut self, state: SessionState) {
        self.state = state;
    }
}
