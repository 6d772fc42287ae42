use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use xrpc::wire::{RpcRequest, make_service_key};

/// An application-level handler failure. It round-trips to the caller as a
/// FAIL response, never as a transport fault.
#[derive(Debug)]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError {
            message: message.into(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler error: {}", self.message)
    }
}

impl std::error::Error for HandlerError {}

/// Business logic supplied by the hosting application, invoked once per
/// decoded request. The result payload is opaque to the transport.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn handle(&self, request: &RpcRequest) -> Result<Option<Vec<u8>>, HandlerError>;
}

/// Dispatch table mapping service keys to their handlers.
///
/// Built explicitly at startup from the application's declared service
/// contracts; there is no runtime scanning or reflective lookup.
pub struct ServiceProvider {
    handlers: HashMap<String, Arc<dyn RpcHandler>>,
}

impl ServiceProvider {
    pub fn new() -> Self {
        ServiceProvider {
            handlers: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        service_name: &str,
        service_version: &str,
        handler: Arc<dyn RpcHandler>,
    ) {
        let service_key = make_service_key(service_name, service_version);
        info!(service_key, "service handler registered");
        self.handlers.insert(service_key, handler);
    }

    pub fn get(&self, service_key: &str) -> Option<&Arc<dyn RpcHandler>> {
        self.handlers.get(service_key)
    }

    /// Every key the provider can dispatch, for discovery registration.
    pub fn service_keys(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

impl Default for ServiceProvider {
    fn default() -> Self {
        Self::new()
    }
}
