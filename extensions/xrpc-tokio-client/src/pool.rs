use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tracing::{info, warn};
use xrpc::codec::CodecRegistry;
use xrpc::consts::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_CONNECT_ATTEMPTS, DEFAULT_WRITE_IDLE_SECS,
};

use crate::{ClientError, Connection, PendingCallTable};

/// Dial-loop progress while (re)establishing a connection.
enum ReconnectState {
    Attempting { attempt: u32 },
    Connected(Arc<Connection>),
    Exhausted { attempts: u32 },
}

/// Owns the live outbound connections, keyed by remote address.
///
/// `get` reuses the cached connection while its liveness flag holds,
/// evicting and redialing otherwise, so at most one live connection exists
/// per endpoint. Dials for one address are serialized through a per-address
/// async lock: concurrent `get` calls that race past the cache all queue on
/// the same lock, and every loser finds the winner's connection in the
/// cache instead of dialing a duplicate. Dialing runs a bounded
/// exponential-backoff loop: attempt `n` (counted from 1) that fails waits
/// `2^n` seconds before the next try, and a connect attempt that exceeds
/// the connect timeout counts as a failure like any other.
pub struct ConnectionPool {
    connections: Mutex<HashMap<String, Arc<Connection>>>,
    dial_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    registry: Arc<CodecRegistry>,
    pending: Arc<PendingCallTable>,
    connect_timeout: Duration,
    max_attempts: u32,
    write_idle: Duration,
}

impl ConnectionPool {
    pub fn new(registry: Arc<CodecRegistry>, pending: Arc<PendingCallTable>) -> Self {
        ConnectionPool {
            connections: Mutex::new(HashMap::new()),
            dial_locks: Mutex::new(HashMap::new()),
            registry,
            pending,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_CONNECT_ATTEMPTS,
            write_idle: Duration::from_secs(DEFAULT_WRITE_IDLE_SECS),
        }
    }

    pub fn with_timing(
        mut self,
        connect_timeout: Duration,
        max_attempts: u32,
        write_idle: Duration,
    ) -> Self {
        self.connect_timeout = connect_timeout;
        self.max_attempts = max_attempts.max(1);
        self.write_idle = write_idle;
        self
    }

    /// Returns a usable connection to `address`, reusing the pooled one or
    /// establishing a replacement.
    pub async fn get(&self, address: &str) -> Result<Arc<Connection>, ClientError> {
        if let Some(conn) = self.cached(address) {
            return Ok(conn);
        }

        let dial_lock = self.dial_lock(address);
        let _guard = dial_lock.lock().await;

        // Another caller may have finished this dial while we queued.
        if let Some(conn) = self.cached(address) {
            return Ok(conn);
        }

        let conn = self.dial_with_backoff(address).await?;
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        connections.insert(address.to_string(), conn.clone());
        Ok(conn)
    }

    fn cached(&self, address: &str) -> Option<Arc<Connection>> {
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        match connections.get(address) {
            Some(conn) if conn.is_alive() => Some(conn.clone()),
            Some(_) => {
                info!(address, "evicting dead pooled connection");
                connections.remove(address);
                None
            }
            None => None,
        }
    }

    fn dial_lock(&self, address: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.dial_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(address.to_string()).or_default().clone()
    }

    /// Drops the pooled connection for `address`, if any.
    pub fn evict(&self, address: &str) {
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        connections.remove(address);
    }

    async fn dial_with_backoff(&self, address: &str) -> Result<Arc<Connection>, ClientError> {
        let mut state = ReconnectState::Attempting { attempt: 1 };

        loop {
            state = match state {
                ReconnectState::Attempting { attempt } => {
                    match timeout(self.connect_timeout, TcpStream::connect(address)).await {
                        Ok(Ok(stream)) => ReconnectState::Connected(Connection::spawn(
                            address.to_string(),
                            stream,
                            self.registry.clone(),
                            self.pending.clone(),
                            self.write_idle,
                        )),
                        Ok(Err(e)) => {
                            warn!(address, attempt, error = %e, "connect attempt failed");
                            self.next_attempt(attempt).await
                        }
                        Err(_) => {
                            warn!(
                                address,
                                attempt,
                                timeout_secs = self.connect_timeout.as_secs(),
                                "connect attempt timed out"
                            );
                            self.next_attempt(attempt).await
                        }
                    }
                }
                ReconnectState::Connected(conn) => return Ok(conn),
                ReconnectState::Exhausted { attempts } => {
                    return Err(ClientError::ReconnectExhausted {
                        address: address.to_string(),
                        attempts,
                    });
                }
            };
        }
    }

    /// Backoff transition after one failed attempt: wait `2^attempt`
    /// seconds and try again, or give up once the attempt budget is spent.
    async fn next_attempt(&self, attempt: u32) -> ReconnectState {
        if attempt >= self.max_attempts {
            return ReconnectState::Exhausted { attempts: attempt };
        }
        tokio::time::sleep(Duration::from_secs(1 << attempt.min(16))).await;
        ReconnectState::Attempting {
            attempt: attempt + 1,
        }
    }
}
