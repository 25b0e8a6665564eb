//! TCP Socket and Connection Management
//!
//! Provides a minimal TCP connection-management layer: listening server sockets
//! with keep-alive liveness monitoring, outbound client connections, blocking and
//! timeout-bounded byte transfer, and disconnect detection over a set of tracked
//! connections. This crate implements socket operations using Rust's standard
//! library and the `socket2` crate, with `libc` for the readability wait and
//! socket option read-back.
//!
//! ## Overview
//!
//! The `tcp_sockets` crate provides:
//! - **Port availability**: probe whether a local port can be bound
//! - **Server sockets**: create, configure (address reuse, keep-alive), bind, listen
//! - **Client connections**: create and connect a socket to a remote endpoint
//! - **Transfer primitives**: send, blocking receive, timeout-bounded receive
//! - **Liveness monitoring**: disconnect handling and a batch scan over tracked
//!   connections
//!
//! Payload bytes are opaque: no framing, no retries, no reconnection. Callers own
//! every handle and every buffer; the library performs no background work and
//! imposes no scheduling. Concurrent use of a single handle from multiple threads
//! without external synchronization is not supported.

pub mod monitor;
pub mod socket;
pub mod tcp;

pub use monitor::{check_client_connections, handle_client_disconnection};
pub use socket::{is_port_available, KeepalivePolicy, SocketError, BUFFER_SIZE};
pub use tcp::{RecvStatus, TcpConnection, TcpServerSocket};
