use std::fmt;
use std::io;

use xrpc::WireError;
use xrpc_routing::RoutingError;

/// Every way a call can fail from the caller's perspective.
///
/// Protocol and transport faults are handled locally (connection teardown,
/// backoff) and reach the application only as one of these terminal
/// invocation errors; application-level failures travel as FAIL responses
/// and surface as [`ClientError::Remote`] when the payload is unwrapped.
#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    Wire(WireError),
    Routing(RoutingError),
    /// A single dial attempt did not finish inside the connect timeout.
    ConnectTimeout { address: String },
    /// Every backoff attempt against the endpoint failed.
    ReconnectExhausted { address: String, attempts: u32 },
    /// No response arrived inside the per-call timeout.
    CallTimeout { request_id: String },
    /// The fault-tolerance strategy ran out of attempts.
    InvocationFailed { attempts: u32 },
    /// The connection died while the call was in flight.
    ConnectionClosed,
    /// The server answered with a FAIL response.
    Remote { message: String },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(e) => write!(f, "I/O error: {e}"),
            ClientError::Wire(e) => write!(f, "wire error: {e}"),
            ClientError::Routing(e) => write!(f, "routing error: {e}"),
            ClientError::ConnectTimeout { address } => {
                write!(f, "connect to {address} timed out")
            }
            ClientError::ReconnectExhausted { address, attempts } => {
                write!(f, "{address} unreachable after {attempts} attempts")
            }
            ClientError::CallTimeout { request_id } => {
                write!(f, "call {request_id} timed out waiting for a response")
            }
            ClientError::InvocationFailed { attempts } => {
                write!(f, "invocation failed after {attempts} attempts")
            }
            ClientError::ConnectionClosed => write!(f, "connection closed"),
            ClientError::Remote { message } => write!(f, "remote call failed: {message}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Io(e) => Some(e),
            ClientError::Wire(e) => Some(e),
            ClientError::Routing(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        ClientError::Io(e)
    }
}

impl From<WireError> for ClientError {
    fn from(e: WireError) -> Self {
        ClientError::Wire(e)
    }
}

impl From<RoutingError> for ClientError {
    fn from(e: RoutingError) -> Self {
        ClientError::Routing(e)
    }
}
