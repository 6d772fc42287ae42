use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use xrpc::codec::default_registry;
use xrpc::consts::{
    HEADER_SIZE, LENGTH_FIELD_OFFSET, MAGIC, MESSAGE_TYPE_OFFSET, SEQUENCE_OFFSET, VERSION,
};
use xrpc::wire::{FrameCodec, Message, MessageType};
use xrpc_tokio_client::{ConnectionPool, PendingCallTable};

fn short_idle_pool() -> ConnectionPool {
    ConnectionPool::new(default_registry(), Arc::new(PendingCallTable::new())).with_timing(
        Duration::from_secs(2),
        1,
        Duration::from_millis(100),
    )
}

async fn read_frame(socket: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut header = [0u8; HEADER_SIZE];
    socket.read_exact(&mut header).await.unwrap();
    let total = u32::from_be_bytes(
        header[LENGTH_FIELD_OFFSET..LENGTH_FIELD_OFFSET + 4]
            .try_into()
            .unwrap(),
    ) as usize;
    let mut frame = header.to_vec();
    if total > HEADER_SIZE {
        let mut body = vec![0u8; total - HEADER_SIZE];
        socket.read_exact(&mut body).await.unwrap();
        frame.extend_from_slice(&body);
    }
    frame
}

#[tokio::test]
async fn idle_connection_sends_a_header_only_ping() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let pool = short_idle_pool();
    let accepted = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        socket
    });
    let _conn = pool.get(&address).await.unwrap();
    let mut socket = accepted.await.unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(2), read_frame(&mut socket))
        .await
        .expect("no heartbeat arrived within the idle window");

    assert_eq!(frame.len(), HEADER_SIZE);
    assert_eq!(&frame[..4], &MAGIC);
    assert_eq!(frame[4], VERSION);
    assert_eq!(frame[MESSAGE_TYPE_OFFSET], u8::from(MessageType::HeartbeatPing));
}

#[tokio::test]
async fn inbound_ping_is_answered_with_a_pong() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    // Long idle so the only traffic is the ping we inject.
    let pool = ConnectionPool::new(default_registry(), Arc::new(PendingCallTable::new()))
        .with_timing(Duration::from_secs(2), 1, Duration::from_secs(60));
    let accepted = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        socket
    });
    let _conn = pool.get(&address).await.unwrap();
    let mut socket = accepted.await.unwrap();

    let registry = default_registry();
    for expected_sequence in 0u32..3 {
        let ping = FrameCodec::encode(&Message::ping(0, 0, 7), &registry).unwrap();
        socket.write_all(&ping).await.unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), read_frame(&mut socket))
            .await
            .expect("no pong arrived");
        assert_eq!(frame.len(), HEADER_SIZE);
        assert_eq!(frame[MESSAGE_TYPE_OFFSET], u8::from(MessageType::HeartbeatPong));
        // Pongs are stamped like every other outbound frame, so the wire
        // sequence advances across replies.
        assert_eq!(
            u32::from_be_bytes(frame[SEQUENCE_OFFSET..].try_into().unwrap()),
            expected_sequence
        );
    }
}

#[tokio::test]
async fn dead_peer_is_detected_and_the_pool_redials() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let pool = short_idle_pool();
    let accepted = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        // Second accept serves the redial.
        (socket, listener)
    });
    let first = pool.get(&address).await.unwrap();
    let (socket, listener) = accepted.await.unwrap();

    drop(socket);
    // Let the reader observe EOF and clear the liveness flag.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!first.is_alive());

    let redialed = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        socket
    });
    let second = pool.get(&address).await.unwrap();
    let _socket = redialed.await.unwrap();
    assert!(second.is_alive());
    assert_eq!(second.address(), address);
}
