//! Integration tests for the tcp_sockets crate
//!
//! End-to-end server/client scenarios over loopback: echo round trips,
//! timeout-bounded receives against a slow peer, and disconnect detection
//! through the batch liveness scan.

use std::thread;
use std::time::Duration;

use tcp_sockets::{
    check_client_connections, is_port_available, RecvStatus, TcpConnection, TcpServerSocket,
    BUFFER_SIZE,
};

const TEST_PORT: u16 = 12347;
const TEST_IP: &str = "127.0.0.1";
const MAX_CLIENTS: i32 = 5;

/// Accepts one client and echoes a single message back after `delay`.
fn echo_once_with_delay(server: TcpServerSocket, delay: Duration) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let (mut conn, _) = server.accept().unwrap();

        let mut buf = [0u8; BUFFER_SIZE];
        let received = conn.recv_blocking(&mut buf).unwrap();
        assert!(received > 0);

        thread::sleep(delay);
        let sent = conn.send(&buf[..received]).unwrap();
        assert_eq!(sent, received);
    })
}

#[test]
fn echo_round_trip_on_fixed_port() {
    if !is_port_available(TEST_PORT) {
        eprintln!("port {} is already in use, skipping", TEST_PORT);
        return;
    }

    let server = TcpServerSocket::create(TEST_PORT, MAX_CLIENTS).unwrap();
    let echo = echo_once_with_delay(server, Duration::ZERO);

    let mut client = TcpConnection::connect(TEST_IP, TEST_PORT).unwrap();

    let message = b"Hello, server!";
    let sent = client.send(message).unwrap();
    assert_eq!(sent, message.len());

    let mut buf = [0u8; BUFFER_SIZE];
    let received = client.recv_blocking(&mut buf).unwrap();
    assert_eq!(received, message.len());
    assert_eq!(&buf[..received], message);

    echo.join().unwrap();
}

#[test]
fn recv_timeout_expires_when_peer_is_slow() {
    let server = TcpServerSocket::create(0, MAX_CLIENTS).unwrap();
    let port = server.local_addr().unwrap().port();
    let echo = echo_once_with_delay(server, Duration::from_millis(400));

    let mut client = TcpConnection::connect(TEST_IP, port).unwrap();
    let message = b"Hello, server!";
    assert_eq!(client.send(message).unwrap(), message.len());

    // The echo arrives after 400 ms; a 100 ms wait must time out first.
    let mut buf = [0u8; BUFFER_SIZE];
    let status = client
        .recv_timeout(&mut buf, Duration::from_millis(100))
        .unwrap();
    assert_eq!(status, RecvStatus::TimedOut);

    echo.join().unwrap();
}

#[test]
fn recv_timeout_delivers_delayed_echo() {
    let server = TcpServerSocket::create(0, MAX_CLIENTS).unwrap();
    let port = server.local_addr().unwrap().port();
    let echo = echo_once_with_delay(server, Duration::from_millis(200));

    let mut client = TcpConnection::connect(TEST_IP, port).unwrap();
    let message = b"Hello, server!";
    assert_eq!(client.send(message).unwrap(), message.len());

    // A wait of 1.5 s comfortably covers the 200 ms delay. Timeouts of a
    // second or more must work just like sub-second ones.
    let mut buf = [0u8; BUFFER_SIZE];
    let status = client
        .recv_timeout(&mut buf, Duration::from_millis(1500))
        .unwrap();
    assert_eq!(status, RecvStatus::Data(message.len()));
    assert_eq!(&buf[..message.len()], message);

    echo.join().unwrap();
}

#[test]
fn client_send_without_server_response_times_out() {
    let server = TcpServerSocket::create(0, MAX_CLIENTS).unwrap();
    let port = server.local_addr().unwrap().port();

    let silent = thread::spawn(move || {
        let (_conn, _) = server.accept().unwrap();
        // Hold the connection open without answering.
        thread::sleep(Duration::from_millis(300));
    });

    let mut client = TcpConnection::connect(TEST_IP, port).unwrap();
    assert_eq!(client.send(b"Hello, server!").unwrap(), 14);

    let mut buf = [0u8; BUFFER_SIZE];
    let status = client
        .recv_timeout(&mut buf, Duration::from_millis(100))
        .unwrap();
    assert_eq!(status, RecvStatus::TimedOut);

    silent.join().unwrap();
}

#[test]
fn liveness_scan_prunes_departed_client() {
    let server = TcpServerSocket::create(0, MAX_CLIENTS).unwrap();
    let port = server.local_addr().unwrap().port();

    let dialer = thread::spawn(move || {
        let staying = TcpConnection::connect(TEST_IP, port).unwrap();
        let leaving = TcpConnection::connect(TEST_IP, port).unwrap();
        drop(leaving);
        // Keep the first connection alive until the scan has run.
        thread::sleep(Duration::from_millis(800));
        drop(staying);
    });

    let mut tracked: Vec<Option<TcpConnection>> = Vec::new();
    for _ in 0..2 {
        let (conn, _) = server.accept().unwrap();
        tracked.push(Some(conn));
    }
    thread::sleep(Duration::from_millis(100));

    check_client_connections(&mut tracked);

    // Exactly one peer hung up; its slot is empty, the other is untouched.
    let occupied = tracked.iter().filter(|slot| slot.is_some()).count();
    assert_eq!(occupied, 1);

    check_client_connections(&mut tracked);
    assert_eq!(tracked.iter().filter(|slot| slot.is_some()).count(), 1);

    dialer.join().unwrap();
}
