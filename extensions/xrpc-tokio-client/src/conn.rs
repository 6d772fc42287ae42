use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};
use xrpc::codec::CodecRegistry;
use xrpc::wire::{FrameCodec, FrameSplitter, Message, MessageBody};

use crate::{ClientError, PendingCallTable};

/// One live outbound connection: a writer task fed by an mpsc channel, a
/// reader task pumping frames into the pending-call table, and a heartbeat
/// task watching for write idleness.
///
/// The connection is replaced, not repaired, on failure: any task that
/// observes a fault clears the liveness flag, and the pool evicts the dead
/// entry on its next `get`.
pub struct Connection {
    address: String,
    tx: mpsc::UnboundedSender<Message>,
    sequence: AtomicU32,
    alive: Arc<AtomicBool>,
}

impl Connection {
    /// Wraps an established socket and spawns its three tasks.
    pub fn spawn(
        address: String,
        stream: TcpStream,
        registry: Arc<CodecRegistry>,
        pending: Arc<PendingCallTable>,
        write_idle: Duration,
    ) -> Arc<Self> {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(address = %address, error = %e, "set_nodelay failed");
        }
        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        let alive = Arc::new(AtomicBool::new(true));
        let last_write = Arc::new(AtomicU64::new(0));
        let epoch = Instant::now();

        let conn = Arc::new(Connection {
            address: address.clone(),
            tx: tx.clone(),
            sequence: AtomicU32::new(0),
            alive: alive.clone(),
        });

        tokio::spawn(Self::writer_task(
            address.clone(),
            write_half,
            rx,
            registry.clone(),
            alive.clone(),
            last_write.clone(),
            epoch,
        ));
        tokio::spawn(Self::reader_task(
            conn.clone(),
            read_half,
            registry,
            pending,
        ));
        tokio::spawn(Self::heartbeat_task(
            conn.clone(),
            write_idle,
            last_write,
            epoch,
        ));

        info!(address = %address, "connection established");
        conn
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Queues a message for the writer task, stamping the sender-monotonic
    /// wire sequence. Every outbound frame goes through here, pongs and
    /// heartbeats included, so the sequence is monotonic across the whole
    /// connection.
    pub fn send(&self, mut message: Message) -> Result<(), ClientError> {
        if !self.is_alive() {
            return Err(ClientError::ConnectionClosed);
        }
        message.sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.tx.send(message).map_err(|_| ClientError::ConnectionClosed)
    }

    /// Serializes and writes queued messages until the channel or the
    /// socket closes. A failed write marks the connection dead; the frames
    /// already queued behind it are lost with it, as they would be on a
    /// broken socket.
    async fn writer_task(
        address: String,
        mut write_half: OwnedWriteHalf,
        mut rx: mpsc::UnboundedReceiver<Message>,
        registry: Arc<CodecRegistry>,
        alive: Arc<AtomicBool>,
        last_write: Arc<AtomicU64>,
        epoch: Instant,
    ) {
        while let Some(message) = rx.recv().await {
            let bytes = match FrameCodec::encode(&message, &registry) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(address = %address, error = %e, "dropping unencodable message");
                    continue;
                }
            };
            if let Err(e) = write_half.write_all(&bytes).await {
                warn!(address = %address, error = %e, "write failed; closing connection");
                alive.store(false, Ordering::Release);
                break;
            }
            last_write.store(epoch.elapsed().as_millis() as u64, Ordering::Release);
        }
        alive.store(false, Ordering::Release);
    }

    /// Splits the inbound byte stream into frames and dispatches them:
    /// responses complete pending calls, pings are answered in place, pongs
    /// are observed and dropped. Any protocol or codec fault closes the
    /// connection.
    async fn reader_task(
        conn: Arc<Connection>,
        mut read_half: OwnedReadHalf,
        registry: Arc<CodecRegistry>,
        pending: Arc<PendingCallTable>,
    ) {
        let mut splitter = FrameSplitter::new();
        let mut buf = vec![0u8; 4096];

        'outer: loop {
            let n = match read_half.read(&mut buf).await {
                Ok(0) => {
                    info!(address = %conn.address, "peer closed the connection");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!(address = %conn.address, error = %e, "read failed");
                    break;
                }
            };

            let frames = match splitter.read_bytes(&buf[..n]) {
                Ok(frames) => frames,
                Err(e) => {
                    error!(address = %conn.address, error = %e, "protocol error; closing connection");
                    break;
                }
            };

            for frame in frames {
                let message = match FrameCodec::decode(&frame, &registry) {
                    Ok(message) => message,
                    Err(e) => {
                        error!(address = %conn.address, error = %e, "undecodable frame; closing connection");
                        break 'outer;
                    }
                };
                match message.body {
                    MessageBody::Response(response) => pending.complete(response),
                    MessageBody::Pong => {
                        trace!(address = %conn.address, sequence = message.sequence, "pong received");
                    }
                    MessageBody::Ping => {
                        let pong = Message::pong(message.serializer, message.compressor, 0);
                        if conn.send(pong).is_err() {
                            break 'outer;
                        }
                    }
                    MessageBody::Request(_) => {
                        warn!(address = %conn.address, "unexpected request frame on client connection");
                    }
                }
            }
        }
        conn.alive.store(false, Ordering::Release);
    }

    /// Sends a heartbeat ping whenever nothing has been written for the
    /// configured idle window. A ping that cannot even be queued means the
    /// writer is gone and the connection is already dead.
    async fn heartbeat_task(
        conn: Arc<Connection>,
        write_idle: Duration,
        last_write: Arc<AtomicU64>,
        epoch: Instant,
    ) {
        let idle_millis = write_idle.as_millis() as u64;
        loop {
            let elapsed = epoch.elapsed().as_millis() as u64;
            let idle = elapsed.saturating_sub(last_write.load(Ordering::Acquire));
            if idle >= idle_millis {
                if !conn.is_alive() {
                    break;
                }
                trace!(address = %conn.address, "write idle; sending heartbeat ping");
                let ping = Message::ping(0, 0, 0);
                if conn.send(ping).is_err() {
                    warn!(address = %conn.address, "heartbeat send failed; connection dead");
                    break;
                }
                tokio::time::sleep(write_idle).await;
            } else {
                tokio::time::sleep(Duration::from_millis(idle_millis - idle)).await;
            }
            if !conn.is_alive() {
                break;
            }
        }
    }
}
