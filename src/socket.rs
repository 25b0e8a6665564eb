//! Socket Module
//!
//! Common socket-level types: the error taxonomy shared by every operation, the
//! keep-alive policy applied to server sockets, and the port availability probe.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

/// Conventional transfer buffer capacity in bytes.
pub const BUFFER_SIZE: usize = 1024;

/// Socket error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketError {
    /// Invalid address
    InvalidAddress,
    /// Address already in use
    AddressInUse,
    /// Connection refused
    ConnectionRefused,
    /// Connection reset
    ConnectionReset,
    /// Connection aborted
    ConnectionAborted,
    /// Timeout
    Timeout,
    /// Would block (non-blocking operation)
    WouldBlock,
    /// I/O error
    IoError(String),
}

impl From<io::Error> for SocketError {
    fn from(err: io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::AddrInUse => SocketError::AddressInUse,
            ErrorKind::ConnectionRefused => SocketError::ConnectionRefused,
            ErrorKind::ConnectionReset => SocketError::ConnectionReset,
            ErrorKind::ConnectionAborted => SocketError::ConnectionAborted,
            ErrorKind::TimedOut => SocketError::Timeout,
            ErrorKind::WouldBlock => SocketError::WouldBlock,
            _ => SocketError::IoError(err.to_string()),
        }
    }
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketError::InvalidAddress => write!(f, "invalid address"),
            SocketError::AddressInUse => write!(f, "address already in use"),
            SocketError::ConnectionRefused => write!(f, "connection refused"),
            SocketError::ConnectionReset => write!(f, "connection reset by peer"),
            SocketError::ConnectionAborted => write!(f, "connection aborted"),
            SocketError::Timeout => write!(f, "operation timed out"),
            SocketError::WouldBlock => write!(f, "operation would block"),
            SocketError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for SocketError {}

/// TCP keep-alive policy
///
/// Describes the liveness probing applied to a socket: whether probing is
/// enabled, how long the connection must sit idle before the first probe, the
/// interval between probes, and how many unanswered probes declare the peer dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepalivePolicy {
    /// Whether keep-alive probing is enabled
    pub enabled: bool,
    /// Idle time before the first probe
    pub idle: Duration,
    /// Interval between probes
    pub interval: Duration,
    /// Unanswered probes before the connection is declared dead
    pub retries: u32,
}

impl KeepalivePolicy {
    /// The fixed policy applied to every server socket.
    ///
    /// Once applied, the parameters are immutable for the socket's lifetime.
    pub const fn server_default() -> Self {
        Self {
            enabled: true,
            idle: Duration::from_secs(10),
            interval: Duration::from_secs(5),
            retries: 3,
        }
    }
}

/// Check whether a local port can be bound
///
/// Attempts to bind a transient probe socket to the port on all local
/// interfaces. The probe socket is closed before returning, whatever the
/// outcome.
///
/// This is a best-effort, time-of-check/time-of-use probe: a port reported
/// available may be taken before a subsequent bind, so callers must treat a
/// later bind failure as authoritative.
///
/// # Arguments
///
/// * `port` - Port number to probe
///
/// # Returns
///
/// * `true` - The bind succeeded
/// * `false` - The bind failed for any reason
pub fn is_port_available(port: u16) -> bool {
    let probe = match Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)) {
        Ok(socket) => socket,
        Err(_) => return false,
    };

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    probe.bind(&addr.into()).is_ok()
}
