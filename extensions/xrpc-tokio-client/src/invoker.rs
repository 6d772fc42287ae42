use async_trait::async_trait;
use tracing::error;
use xrpc::consts::DEFAULT_RETRY_ATTEMPTS;
use xrpc::wire::{RpcRequest, RpcResponse};

use crate::ClientError;

/// The send-and-wait operation a fault-tolerance strategy wraps: one
/// request written to one already-selected address, resolved by the
/// pending-call table. [`RpcClient`] is the production implementation.
///
/// [`RpcClient`]: crate::RpcClient
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn send(&self, address: &str, request: &RpcRequest) -> Result<RpcResponse, ClientError>;
}

/// Wraps one logical call attempt with a fault-tolerance policy.
///
/// Strategies receive the address the load balancer already selected and
/// stick to it: retries deliberately do not re-run load balancing, so a
/// retried call lands on the same node every time (sticky retry).
#[async_trait]
pub trait FaultTolerantInvoker: Send + Sync {
    async fn invoke(
        &self,
        sender: &dyn RequestSender,
        address: &str,
        request: &RpcRequest,
    ) -> Result<RpcResponse, ClientError>;
}

/// A single attempt; any failure propagates immediately.
pub struct FailFastInvoker;

#[async_trait]
impl FaultTolerantInvoker for FailFastInvoker {
    async fn invoke(
        &self,
        sender: &dyn RequestSender,
        address: &str,
        request: &RpcRequest,
    ) -> Result<RpcResponse, ClientError> {
        sender.send(address, request).await
    }
}

/// Bounded retry with a fixed attempt count. Attempt failures before the
/// last are logged and retried; exhausting the budget raises a terminal
/// invocation error.
pub struct RetryInvoker {
    pub attempts: u32,
}

impl RetryInvoker {
    pub fn new(attempts: u32) -> Self {
        RetryInvoker {
            attempts: attempts.max(1),
        }
    }
}

impl Default for RetryInvoker {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_ATTEMPTS)
    }
}

#[async_trait]
impl FaultTolerantInvoker for RetryInvoker {
    async fn invoke(
        &self,
        sender: &dyn RequestSender,
        address: &str,
        request: &RpcRequest,
    ) -> Result<RpcResponse, ClientError> {
        for attempt in 1..=self.attempts {
            match sender.send(address, request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    error!(
                        address,
                        attempt,
                        request_id = %request.request_id,
                        error = %e,
                        "invoke attempt failed"
                    );
                }
            }
        }
        Err(ClientError::InvocationFailed {
            attempts: self.attempts,
        })
    }
}
