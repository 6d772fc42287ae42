use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{error, info, trace, warn};
use xrpc::codec::{CodecRegistry, default_registry};
use xrpc::consts::DEFAULT_READ_IDLE_SECS;
use xrpc::wire::{FrameCodec, FrameSplitter, Message, MessageBody, RpcRequest, RpcResponse};
use xrpc_routing::ServiceDiscovery;

use crate::ServiceProvider;

/// Tunables for one server engine.
pub struct RpcServerConfig {
    /// Seconds of read idleness after which a peer is considered dead and
    /// its connection dropped. The server never initiates pings itself.
    pub read_idle: Duration,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        RpcServerConfig {
            read_idle: Duration::from_secs(DEFAULT_READ_IDLE_SECS),
        }
    }
}

/// The server side of the wire: accepts connections, splits and decodes
/// frames, answers heartbeats in place, and dispatches requests to the
/// registered handlers on worker tasks.
///
/// Because handlers run off the reader task, concurrent requests on one
/// connection may complete out of order; correlation is by request id, not
/// position, so that is fine.
pub struct RpcServer {
    provider: Arc<ServiceProvider>,
    registry: Arc<CodecRegistry>,
    config: RpcServerConfig,
}

impl RpcServer {
    pub fn new(provider: ServiceProvider) -> Self {
        RpcServer {
            provider: Arc::new(provider),
            registry: default_registry(),
            config: RpcServerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RpcServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_registry(mut self, registry: Arc<CodecRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Publishes every registered service key under `advertised_address`.
    pub async fn register_with(
        &self,
        discovery: &dyn ServiceDiscovery,
        advertised_address: &str,
    ) -> Result<(), xrpc_routing::RoutingError> {
        for service_key in self.provider.service_keys() {
            discovery.register(&service_key, advertised_address).await?;
        }
        Ok(())
    }

    /// Withdraws `advertised_address` from discovery.
    pub async fn unregister_from(
        &self,
        discovery: &dyn ServiceDiscovery,
        advertised_address: &str,
    ) -> Result<(), xrpc_routing::RoutingError> {
        discovery.unregister(advertised_address).await
    }

    /// Binds `addr` and serves until the listener fails.
    pub async fn serve<A: ToSocketAddrs>(self, addr: A) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        Arc::new(self).serve_with_listener(listener).await
    }

    /// Serves on a pre-bound listener. Binding separately supports
    /// ephemeral ports: bind port 0, read the local address, then hand the
    /// listener over.
    pub async fn serve_with_listener(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        let address = listener.local_addr()?;
        info!(%address, "server listening");

        loop {
            let (socket, peer) = listener.accept().await?;
            info!(%peer, "client connected");
            let server = self.clone();
            tokio::spawn(server.handle_connection(socket, peer));
        }
    }

    async fn handle_connection(self: Arc<Self>, socket: TcpStream, peer: SocketAddr) {
        if let Err(e) = socket.set_nodelay(true) {
            trace!(%peer, error = %e, "set_nodelay failed");
        }
        let (read_half, write_half) = socket.into_split();
        let (tx, rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(Self::sender_task(
            peer,
            write_half,
            rx,
            self.registry.clone(),
        ));
        self.receiver_task(peer, read_half, tx).await;
    }

    /// Forwards responses and pongs from worker tasks to the socket,
    /// stamping the server's monotonic wire sequence on each frame.
    async fn sender_task(
        peer: SocketAddr,
        mut write_half: OwnedWriteHalf,
        mut rx: mpsc::UnboundedReceiver<Message>,
        registry: Arc<CodecRegistry>,
    ) {
        let sequence = AtomicU32::new(0);
        while let Some(mut message) = rx.recv().await {
            message.sequence = sequence.fetch_add(1, Ordering::Relaxed);
            let bytes = match FrameCodec::encode(&message, &registry) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(%peer, error = %e, "dropping unencodable response");
                    continue;
                }
            };
            if let Err(e) = write_half.write_all(&bytes).await {
                warn!(%peer, error = %e, "write failed; dropping connection");
                break;
            }
        }
    }

    /// Reads, splits, and dispatches inbound frames. Read idleness beyond
    /// the configured window means peer death: the loop exits and the
    /// connection drops.
    async fn receiver_task(
        self: Arc<Self>,
        peer: SocketAddr,
        mut read_half: OwnedReadHalf,
        tx: mpsc::UnboundedSender<Message>,
    ) {
        let mut splitter = FrameSplitter::new();
        let mut buf = vec![0u8; 4096];

        'outer: loop {
            let n = match timeout(self.config.read_idle, read_half.read(&mut buf)).await {
                Err(_) => {
                    warn!(%peer, idle_secs = self.config.read_idle.as_secs(),
                        "read idle timeout; closing connection");
                    break;
                }
                Ok(Ok(0)) => {
                    info!(%peer, "client disconnected");
                    break;
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    warn!(%peer, error = %e, "read failed");
                    break;
                }
            };

            let frames = match splitter.read_bytes(&buf[..n]) {
                Ok(frames) => frames,
                Err(e) => {
                    error!(%peer, error = %e, "protocol error; closing connection");
                    break;
                }
            };

            for frame in frames {
                let message = match FrameCodec::decode(&frame, &self.registry) {
                    Ok(message) => message,
                    Err(e) => {
                        error!(%peer, error = %e, "undecodable frame; closing connection");
                        break 'outer;
                    }
                };
                match message.body {
                    MessageBody::Ping => {
                        trace!(%peer, sequence = message.sequence, "ping received");
                        let pong = Message::pong(message.serializer, message.compressor, 0);
                        if tx.send(pong).is_err() {
                            break 'outer;
                        }
                    }
                    MessageBody::Request(request) => {
                        // Handlers run on worker tasks so a slow one cannot
                        // stall frame processing for this connection.
                        let server = self.clone();
                        let tx = tx.clone();
                        let serializer = message.serializer;
                        let compressor = message.compressor;
                        tokio::spawn(async move {
                            let response = server.dispatch(&request).await;
                            let _ =
                                tx.send(Message::response(serializer, compressor, 0, response));
                        });
                    }
                    MessageBody::Pong => {
                        trace!(%peer, "pong received");
                    }
                    MessageBody::Response(_) => {
                        warn!(%peer, "unexpected response frame on server connection");
                    }
                }
            }
        }
    }

    async fn dispatch(&self, request: &RpcRequest) -> RpcResponse {
        let service_key = request.service_key();
        let handler = match self.provider.get(&service_key) {
            Some(handler) => handler,
            None => {
                error!(
                    service_key,
                    method = %request.method_name,
                    "no handler registered for service"
                );
                return RpcResponse::fail(
                    request.request_id.clone(),
                    format!("service not found: {service_key}"),
                );
            }
        };

        match handler.handle(request).await {
            Ok(payload) => {
                info!(
                    service_key,
                    method = %request.method_name,
                    request_id = %request.request_id,
                    "request handled"
                );
                RpcResponse::success(request.request_id.clone(), payload)
            }
            Err(e) => {
                warn!(
                    service_key,
                    method = %request.method_name,
                    request_id = %request.request_id,
                    error = %e,
                    "handler failed"
                );
                RpcResponse::fail(request.request_id.clone(), e.message)
            }
        }
    }
}
