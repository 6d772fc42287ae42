use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;
use xrpc::codec::{CodecRegistry, CompressorId, SerializerId, default_registry};
use xrpc::consts::{
    DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_CONNECT_ATTEMPTS,
    DEFAULT_WRITE_IDLE_SECS,
};
use xrpc::wire::{Message, RpcRequest, RpcResponse, make_service_key};
use xrpc_routing::{LoadBalancer, RandomBalancer, ServiceDiscovery};

use crate::{
    ClientError, ConnectionPool, FailFastInvoker, FaultTolerantInvoker, PendingCallTable,
    RequestSender, ResponseCallback,
};

/// Tunables for one client engine. Defaults mirror the wire constants.
pub struct RpcClientConfig {
    pub serializer: u8,
    pub compressor: u8,
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
    pub write_idle: Duration,
    pub max_connect_attempts: u32,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        RpcClientConfig {
            serializer: SerializerId::Bincode.into(),
            compressor: CompressorId::Gzip.into(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            write_idle: Duration::from_secs(DEFAULT_WRITE_IDLE_SECS),
            max_connect_attempts: DEFAULT_MAX_CONNECT_ATTEMPTS,
        }
    }
}

/// The client side of the wire: discovery consumption, load balancing,
/// fault-tolerant sending, and response correlation composed into one
/// engine.
///
/// A call flows as: `lookup(service_key)` -> balancer pick -> invoker
/// `send` (pool get, register pending, write frame) -> pending-table wait
/// with the per-call timeout. Synchronous waits suspend the calling task
/// only; frames for other in-flight calls keep flowing on the reader.
pub struct RpcClient {
    discovery: Arc<dyn ServiceDiscovery>,
    balancer: Arc<dyn LoadBalancer>,
    invoker: Arc<dyn FaultTolerantInvoker>,
    pool: ConnectionPool,
    pending: Arc<PendingCallTable>,
    config: RpcClientConfig,
}

impl RpcClient {
    pub fn new(discovery: Arc<dyn ServiceDiscovery>) -> Self {
        Self::builder(discovery).build()
    }

    pub fn builder(discovery: Arc<dyn ServiceDiscovery>) -> RpcClientBuilder {
        RpcClientBuilder {
            discovery,
            balancer: Arc::new(RandomBalancer),
            invoker: Arc::new(FailFastInvoker),
            registry: default_registry(),
            config: RpcClientConfig::default(),
        }
    }

    /// Issues one call and blocks the calling task until the correlated
    /// response arrives or the call timeout elapses.
    pub async fn call(
        &self,
        service_name: &str,
        service_version: &str,
        method_name: &str,
        param_types: Vec<String>,
        params: Vec<Vec<u8>>,
    ) -> Result<RpcResponse, ClientError> {
        let request = self.build_request(
            service_name,
            service_version,
            method_name,
            param_types,
            params,
        );
        let address = self.route(&request).await?;
        self.invoker.invoke(self, &address, &request).await
    }

    /// Issues one call and returns immediately; `callback` fires on a
    /// worker task with the response or a timeout error.
    pub async fn call_with_callback(
        &self,
        service_name: &str,
        service_version: &str,
        method_name: &str,
        param_types: Vec<String>,
        params: Vec<Vec<u8>>,
        callback: ResponseCallback,
    ) -> Result<(), ClientError> {
        let request = self.build_request(
            service_name,
            service_version,
            method_name,
            param_types,
            params,
        );
        let address = self.route(&request).await?;
        let conn = self.pool.get(&address).await?;

        self.pending.register_callback(&request.request_id, callback);

        let request_id = request.request_id.clone();
        let message = Message::request(self.config.serializer, self.config.compressor, 0, request);
        if conn.send(message).is_err() {
            // The caller gets the send error; the callback must not also
            // fire later, so the registration is withdrawn here.
            self.pending.discard(&request_id);
            self.pool.evict(&address);
            return Err(ClientError::ConnectionClosed);
        }

        self.pending
            .enforce_timeout(&request_id, self.config.call_timeout);
        Ok(())
    }

    /// Unwraps a response into its payload, turning FAIL responses into
    /// [`ClientError::Remote`].
    pub fn unwrap_payload(response: RpcResponse) -> Result<Option<Vec<u8>>, ClientError> {
        if response.is_success() {
            Ok(response.payload)
        } else {
            Err(ClientError::Remote {
                message: response.message,
            })
        }
    }

    pub fn pending(&self) -> &Arc<PendingCallTable> {
        &self.pending
    }

    fn build_request(
        &self,
        service_name: &str,
        service_version: &str,
        method_name: &str,
        param_types: Vec<String>,
        params: Vec<Vec<u8>>,
    ) -> RpcRequest {
        RpcRequest {
            request_id: Uuid::new_v4().to_string(),
            service_name: service_name.to_string(),
            service_version: service_version.to_string(),
            method_name: method_name.to_string(),
            param_types,
            params,
        }
    }

    /// Discovery lookup followed by one load-balancer pick. The selected
    /// address stays fixed for the lifetime of the call, retries included.
    async fn route(&self, request: &RpcRequest) -> Result<String, ClientError> {
        let service_key = make_service_key(&request.service_name, &request.service_version);
        let candidates = self.discovery.lookup(&service_key).await?;
        let address = self.balancer.select(&candidates, request)?;
        info!(service_key, address, "service address selected");
        Ok(address)
    }
}

#[async_trait]
impl RequestSender for RpcClient {
    async fn send(&self, address: &str, request: &RpcRequest) -> Result<RpcResponse, ClientError> {
        let conn = self.pool.get(address).await?;
        let rx = self.pending.register(&request.request_id);

        let message = Message::request(
            self.config.serializer,
            self.config.compressor,
            0,
            request.clone(),
        );
        if conn.send(message).is_err() {
            self.pending.discard(&request.request_id);
            self.pool.evict(address);
            return Err(ClientError::ConnectionClosed);
        }

        self.pending
            .await_response(&request.request_id, rx, self.config.call_timeout)
            .await
    }
}

pub struct RpcClientBuilder {
    discovery: Arc<dyn ServiceDiscovery>,
    balancer: Arc<dyn LoadBalancer>,
    invoker: Arc<dyn FaultTolerantInvoker>,
    registry: Arc<CodecRegistry>,
    config: RpcClientConfig,
}

impl RpcClientBuilder {
    pub fn balancer(mut self, balancer: Arc<dyn LoadBalancer>) -> Self {
        self.balancer = balancer;
        self
    }

    pub fn invoker(mut self, invoker: Arc<dyn FaultTolerantInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn registry(mut self, registry: Arc<CodecRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(mut self, config: RpcClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> RpcClient {
        let pending = Arc::new(PendingCallTable::new());
        let pool = ConnectionPool::new(self.registry, pending.clone()).with_timing(
            self.config.connect_timeout,
            self.config.max_connect_attempts,
            self.config.write_idle,
        );
        RpcClient {
            discovery: self.discovery,
            balancer: self.balancer,
            invoker: self.invoker,
            pool,
            pending,
            config: self.config,
        }
    }
}
