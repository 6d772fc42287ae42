use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use xrpc::codec::default_registry;
use xrpc_tokio_client::{ConnectionPool, PendingCallTable};

/// Accepts connections forever, counting them and holding each socket open.
fn counting_acceptor(listener: TcpListener, accepted: Arc<AtomicUsize>) {
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => break,
            };
            accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
            });
        }
    });
}

#[tokio::test]
async fn concurrent_gets_share_one_connection_per_endpoint() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let accepted = Arc::new(AtomicUsize::new(0));
    counting_acceptor(listener, accepted.clone());

    let pool = Arc::new(ConnectionPool::new(
        default_registry(),
        Arc::new(PendingCallTable::new()),
    ));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let address = address.clone();
        tasks.push(tokio::spawn(async move { pool.get(&address).await.unwrap() }));
    }
    let mut conns = Vec::new();
    for task in tasks {
        conns.push(task.await.unwrap());
    }

    // Give any stray duplicate dial time to land on the acceptor.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1, "duplicate dial for one endpoint");
    for conn in &conns[1..] {
        assert!(Arc::ptr_eq(&conns[0], conn));
    }
}

#[tokio::test]
async fn eviction_followed_by_concurrent_gets_dials_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let accepted = Arc::new(AtomicUsize::new(0));
    counting_acceptor(listener, accepted.clone());

    let pool = Arc::new(ConnectionPool::new(
        default_registry(),
        Arc::new(PendingCallTable::new()),
    ));
    let first = pool.get(&address).await.unwrap();
    pool.evict(&address);

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let pool = pool.clone();
        let address = address.clone();
        tasks.push(tokio::spawn(async move { pool.get(&address).await.unwrap() }));
    }
    let mut conns = Vec::new();
    for task in tasks {
        conns.push(task.await.unwrap());
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
    assert!(!Arc::ptr_eq(&first, &conns[0]));
    for conn in &conns[1..] {
        assert!(Arc::ptr_eq(&conns[0], conn));
    }
}
