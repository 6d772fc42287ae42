mod server;
mod service;

pub use server::{RpcServer, RpcServerConfig};
pub use service::{HandlerError, RpcHandler, ServiceProvider};
