//! TCP Socket Module
//!
//! Server and client TCP endpoints and the transfer primitives that operate on
//! them. A `TcpServerSocket` is a configured listening socket; a `TcpConnection`
//! is a connected stream, either dialed out with [`TcpConnection::connect`] or
//! handed back by [`TcpServerSocket::accept`]. Both types own their descriptor
//! and close it on drop.

use std::io::{self, Read, Write};
use std::mem::{size_of, MaybeUninit};
use std::net::{Ipv4Addr, SocketAddr};
use std::os::unix::io::{AsRawFd, RawFd};
use std::str::FromStr;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};

use crate::socket::{KeepalivePolicy, SocketError};

/// Outcome of a timeout-bounded receive.
///
/// The three non-error outcomes are mutually distinguishable: data arrived, the
/// wait elapsed with nothing to read, or the peer performed an orderly shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStatus {
    /// At least one byte was received
    Data(usize),
    /// The timeout elapsed with no data ready
    TimedOut,
    /// The peer closed its end before any data arrived
    Disconnected,
}

/// A listening TCP server socket
///
/// Created fully configured: address and port reuse are enabled so a restarted
/// server can rebind immediately, and the fixed keep-alive policy
/// ([`KeepalivePolicy::server_default`]) is applied so silently-dead peers are
/// eventually detected by the transport.
pub struct TcpServerSocket {
    socket: Socket,
}

impl TcpServerSocket {
    /// Create a server socket bound to `port` on all local interfaces
    ///
    /// Steps, in order: allocate a stream socket, enable address and port
    /// reuse, apply the keep-alive policy, bind, listen. Any step's failure is
    /// returned to the caller; server setup failures indicate misconfiguration
    /// and are not retried here.
    ///
    /// # Arguments
    ///
    /// * `port` - Port to listen on; 0 requests an ephemeral port
    /// * `max_clients` - Backlog of not-yet-accepted connections
    ///
    /// # Returns
    ///
    /// * `Ok(TcpServerSocket)` - Listening socket
    /// * `Err(SocketError)` - Error from the failing setup step
    pub fn create(port: u16, max_clients: i32) -> Result<Self, SocketError> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| SocketError::from(e))?;

        socket
            .set_reuse_address(true)
            .map_err(|e| SocketError::from(e))?;
        socket
            .set_reuse_port(true)
            .map_err(|e| SocketError::from(e))?;

        let policy = KeepalivePolicy::server_default();
        socket
            .set_keepalive(policy.enabled)
            .map_err(|e| SocketError::from(e))?;
        let keepalive = TcpKeepalive::new()
            .with_time(policy.idle)
            .with_interval(policy.interval)
            .with_retries(policy.retries);
        socket
            .set_tcp_keepalive(&keepalive)
            .map_err(|e| SocketError::from(e))?;

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        socket.bind(&addr.into()).map_err(|e| SocketError::from(e))?;
        socket.listen(max_clients).map_err(|e| SocketError::from(e))?;

        tracing::debug!(port, backlog = max_clients, "server socket listening");

        Ok(Self { socket })
    }

    /// Accept an incoming connection
    ///
    /// Blocks until a client connects.
    ///
    /// # Returns
    ///
    /// * `Ok((TcpConnection, SocketAddr))` - Accepted connection and peer address
    /// * `Err(SocketError)` - Error accepting
    pub fn accept(&self) -> Result<(TcpConnection, SocketAddr), SocketError> {
        let (socket, addr) = self.socket.accept().map_err(|e| SocketError::from(e))?;
        let peer = addr.as_socket().ok_or(SocketError::InvalidAddress)?;

        Ok((TcpConnection { socket }, peer))
    }

    /// Get the local address the server is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        sockaddr_of(self.socket.local_addr())
    }

    /// Read back the keep-alive policy in effect on this socket
    ///
    /// # Returns
    ///
    /// * `Ok(KeepalivePolicy)` - Values currently held by the kernel
    /// * `Err(SocketError)` - Error querying an option
    pub fn keepalive_policy(&self) -> Result<KeepalivePolicy, SocketError> {
        let fd = self.socket.as_raw_fd();
        let enabled = self.socket.keepalive().map_err(|e| SocketError::from(e))?;
        let idle = getsockopt_i32(fd, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE)?;
        let interval = getsockopt_i32(fd, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL)?;
        let retries = getsockopt_i32(fd, libc::IPPROTO_TCP, libc::TCP_KEEPCNT)?;

        Ok(KeepalivePolicy {
            enabled,
            idle: Duration::from_secs(idle as u64),
            interval: Duration::from_secs(interval as u64),
            retries: retries as u32,
        })
    }

    /// Get the raw file descriptor
    pub fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

/// A connected TCP stream
///
/// The connection is exclusively owned by whichever execution context operates
/// on it; the crate never retains it across calls. Dropping the value closes
/// the descriptor.
#[derive(Debug)]
pub struct TcpConnection {
    socket: Socket,
}

impl TcpConnection {
    /// Connect to a remote endpoint
    ///
    /// Connect and transfer failures are routine (an unreachable or restarting
    /// peer) and always reported as recoverable errors, unlike server setup.
    ///
    /// # Arguments
    ///
    /// * `ip` - Textual numeric IPv4 address of the peer
    /// * `port` - Peer port
    ///
    /// # Returns
    ///
    /// * `Ok(TcpConnection)` - Connected stream
    /// * `Err(SocketError::InvalidAddress)` - `ip` is not a numeric IPv4 address
    /// * `Err(SocketError)` - Error allocating or connecting
    pub fn connect(ip: &str, port: u16) -> Result<Self, SocketError> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| SocketError::from(e))?;

        let peer = match Ipv4Addr::from_str(ip) {
            Ok(parsed) => SocketAddr::from((parsed, port)),
            Err(_) => {
                tracing::debug!(address = ip, "peer address is not a numeric IPv4 address");
                return Err(SocketError::InvalidAddress);
            }
        };

        socket.connect(&peer.into()).map_err(|e| SocketError::from(e))?;

        Ok(Self { socket })
    }

    /// Send bytes from the caller's buffer
    ///
    /// Issues a single underlying transfer; the count returned may be less than
    /// `buf.len()`. Callers needing all-bytes-sent semantics must loop.
    ///
    /// # Arguments
    ///
    /// * `buf` - Data to send
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of bytes actually transmitted
    /// * `Err(SocketError)` - Error sending
    pub fn send(&mut self, buf: &[u8]) -> Result<usize, SocketError> {
        self.socket.write(buf).map_err(|e| SocketError::from(e))
    }

    /// Receive bytes, blocking until at least one is available
    ///
    /// # Arguments
    ///
    /// * `buf` - Buffer to receive into; capacity bounds the read
    ///
    /// # Returns
    ///
    /// * `Ok(n)` with `n > 0` - Bytes received
    /// * `Ok(0)` - The peer performed an orderly shutdown
    /// * `Err(SocketError)` - Error receiving
    pub fn recv_blocking(&mut self, buf: &mut [u8]) -> Result<usize, SocketError> {
        self.socket.read(buf).map_err(|e| SocketError::from(e))
    }

    /// Receive bytes, waiting at most `timeout` for data to become ready
    ///
    /// Waits for readability with `poll(2)`, then issues a single receive. The
    /// timeout is honored in milliseconds, for sub-second and multi-second
    /// values alike.
    ///
    /// # Arguments
    ///
    /// * `buf` - Buffer to receive into
    /// * `timeout` - Maximum time to wait for readability
    ///
    /// # Returns
    ///
    /// * `Ok(RecvStatus::Data(n))` - Bytes received
    /// * `Ok(RecvStatus::TimedOut)` - The timeout elapsed with no data ready
    /// * `Ok(RecvStatus::Disconnected)` - The peer closed its end
    /// * `Err(SocketError)` - The wait or the receive failed
    pub fn recv_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<RecvStatus, SocketError> {
        let mut pollfd = libc::pollfd {
            fd: self.socket.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        let ready = unsafe { libc::poll(&mut pollfd, 1, poll_millis(timeout)) };
        if ready < 0 {
            return Err(SocketError::from(io::Error::last_os_error()));
        }
        if ready == 0 {
            tracing::debug!(timeout_ms = timeout.as_millis() as u64, "no data within timeout");
            return Ok(RecvStatus::TimedOut);
        }

        match self.recv_blocking(buf)? {
            0 => Ok(RecvStatus::Disconnected),
            received => Ok(RecvStatus::Data(received)),
        }
    }

    /// Set the kernel receive and transmit buffer sizes
    ///
    /// # Arguments
    ///
    /// * `rx_bytes` - Receive-side buffer size in bytes
    /// * `tx_bytes` - Transmit-side buffer size in bytes
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Both sizes applied
    /// * `Err(SocketError)` - Error from the failing option call
    pub fn set_buffer_sizes(&self, rx_bytes: usize, tx_bytes: usize) -> Result<(), SocketError> {
        self.socket
            .set_recv_buffer_size(rx_bytes)
            .map_err(|e| SocketError::from(e))?;
        self.socket
            .set_send_buffer_size(tx_bytes)
            .map_err(|e| SocketError::from(e))
    }

    /// Probe the connection without consuming data or blocking
    ///
    /// Performs a one-byte `MSG_PEEK | MSG_DONTWAIT` read. A result of `Ok(0)`
    /// means the peer has performed an orderly shutdown; `WouldBlock` means the
    /// connection is idle but alive.
    ///
    /// # Returns
    ///
    /// * `Ok(n)` - `n` bytes are ready to read (data is not consumed)
    /// * `Ok(0)` - Orderly peer shutdown observed
    /// * `Err(SocketError::WouldBlock)` - No data currently available
    /// * `Err(SocketError)` - Error probing
    pub fn peek_nonblocking(&self) -> Result<usize, SocketError> {
        let mut probe = [MaybeUninit::<u8>::uninit(); 1];
        self.socket
            .recv_with_flags(&mut probe, libc::MSG_PEEK | libc::MSG_DONTWAIT)
            .map_err(|e| SocketError::from(e))
    }

    /// Get the local address
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        sockaddr_of(self.socket.local_addr())
    }

    /// Get the peer address
    pub fn peer_addr(&self) -> Result<SocketAddr, SocketError> {
        sockaddr_of(self.socket.peer_addr())
    }

    /// Get the raw file descriptor
    pub fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

/// Convert a timeout to the millisecond argument `poll(2)` expects.
///
/// Saturates at `c_int::MAX` rather than wrapping; `poll` takes milliseconds
/// directly, so no further unit conversion happens downstream.
fn poll_millis(timeout: Duration) -> libc::c_int {
    libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX)
}

fn sockaddr_of(addr: io::Result<socket2::SockAddr>) -> Result<SocketAddr, SocketError> {
    addr.map_err(|e| SocketError::from(e))?
        .as_socket()
        .ok_or(SocketError::InvalidAddress)
}

fn getsockopt_i32(fd: RawFd, level: libc::c_int, optname: libc::c_int) -> Result<i32, SocketError> {
    let mut value: libc::c_int = 0;
    let mut len = size_of::<libc::c_int>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            fd,
            level,
            optname,
            &mut value as *mut libc::c_int as *mut libc::c_void,
            &mut len,
        )
    };
    if rc != 0 {
        return Err(SocketError::from(io::Error::last_os_error()));
    }

    Ok(value)
}
