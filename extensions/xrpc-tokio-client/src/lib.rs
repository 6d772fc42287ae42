mod client;
mod conn;
mod error;
mod invoker;
mod pending;
mod pool;

pub use client::{RpcClient, RpcClientConfig};
pub use conn::Connection;
pub use error::ClientError;
pub use invoker::{FailFastInvoker, FaultTolerantInvoker, RequestSender, RetryInvoker};
pub use pending::{PendingCallTable, ResponseCallback};
pub use pool::ConnectionPool;
