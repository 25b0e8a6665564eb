//! Connection Liveness Monitoring
//!
//! Disconnect handling and the batch liveness scan over a caller-owned set of
//! tracked connections. The scan detects peers that have already completed an
//! orderly shutdown; it never blocks and never consumes payload data, so it is
//! safe to drive from a timer or poll cycle. The scan assumes exclusive access
//! to the whole tracked collection for the duration of its pass.

use crate::tcp::TcpConnection;

/// Tear down a disconnected client connection
///
/// Signals the teardown and closes the connection by consuming it. Ownership
/// makes a double close unrepresentable: once the connection is handed over,
/// no other holder can operate on the descriptor.
///
/// # Arguments
///
/// * `conn` - The connection to close
pub fn handle_client_disconnection(conn: TcpConnection) {
    tracing::info!(fd = conn.as_raw_fd(), "client disconnected, closing socket");
}

/// Scan tracked connections and prune the ones the peer has closed
///
/// For every occupied slot, performs a non-blocking, non-consuming one-byte
/// peek. A peek reporting 0 bytes means the peer completed an orderly
/// shutdown: the connection is handed to [`handle_client_disconnection`] and
/// the slot is reset to `None` within the same pass. Slots whose peek reports
/// pending data, would-block, or an error are left untouched: the scan only
/// detects already-completed orderly closes, not errors or resets.
///
/// # Arguments
///
/// * `clients` - Tracked connection slots; `None` marks an empty slot
pub fn check_client_connections(clients: &mut [Option<TcpConnection>]) {
    for slot in clients.iter_mut() {
        let closed = match slot.as_ref() {
            Some(conn) => matches!(conn.peek_nonblocking(), Ok(0)),
            None => false,
        };
        if closed {
            if let Some(conn) = slot.take() {
                tracing::debug!(fd = conn.as_raw_fd(), "liveness scan found orderly close");
                handle_client_disconnection(conn);
            }
        }
    }
}
