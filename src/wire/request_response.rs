use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Joins a service name and version into the key used for registration,
/// discovery lookup, and server-side handler dispatch.
pub(crate) const SERVICE_KEY_SEPARATOR: char = '#';

/// One logical call, serialized as a frame body by the codec named in the
/// frame header. Immutable after construction.
///
/// Parameter values are opaque per-parameter byte strings paired with type
/// descriptors; their interpretation belongs to the application on both
/// ends, which keeps the body portable across serializers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Globally unique call id (a UUID on the client), correlating this
    /// request with its eventual response.
    pub request_id: String,
    pub service_name: String,
    pub service_version: String,
    pub method_name: String,
    pub param_types: Vec<String>,
    pub params: Vec<Vec<u8>>,
}

impl RpcRequest {
    /// Key under which the target service is registered and discovered.
    /// The version is appended only when non-empty.
    pub fn service_key(&self) -> String {
        make_service_key(&self.service_name, &self.service_version)
    }
}

/// Key under which a `(service name, version)` pair is registered and
/// looked up. The version is appended only when non-empty.
pub fn make_service_key(name: &str, version: &str) -> String {
    if version.trim().is_empty() {
        name.to_string()
    } else {
        format!("{name}{SERVICE_KEY_SEPARATOR}{version}")
    }
}

/// Status of a completed call.
#[repr(u16)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize,
)]
pub enum ResponseCode {
    Success = 200,
    Fail = 500,
}

/// The server's answer to one [`RpcRequest`]. Application-level handler
/// failures travel as `Fail` responses, never as transport faults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Matches the `request_id` of the request being answered.
    pub request_id: String,
    pub code: ResponseCode,
    pub message: String,
    pub payload: Option<Vec<u8>>,
}

impl RpcResponse {
    pub fn success(request_id: impl Into<String>, payload: Option<Vec<u8>>) -> Self {
        RpcResponse {
            request_id: request_id.into(),
            code: ResponseCode::Success,
            message: "The remote call is successful".to_string(),
            payload,
        }
    }

    pub fn fail(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        RpcResponse {
            request_id: request_id.into(),
            code: ResponseCode::Fail,
            message: message.into(),
            payload: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ResponseCode::Success
    }
}
