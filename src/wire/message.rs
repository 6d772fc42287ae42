use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::wire::{RpcRequest, RpcResponse};

/// The role of a frame on the wire, carried as a one-byte tag in the header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum MessageType {
    Request = 1,
    Response = 2,
    HeartbeatPing = 3,
    HeartbeatPong = 4,
}

impl MessageType {
    /// Heartbeat frames carry no body; their total length equals the header
    /// size and the marker string is synthesized on decode.
    pub fn is_heartbeat(self) -> bool {
        matches!(self, MessageType::HeartbeatPing | MessageType::HeartbeatPong)
    }
}

/// The decoded body of a frame. Ownership transfers to the receiver's
/// dispatch path, which consumes it exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Request(RpcRequest),
    Response(RpcResponse),
    Ping,
    Pong,
}

/// One complete protocol unit: the fixed header fields plus a decoded body.
///
/// The `serializer` and `compressor` ids describe how the body bytes were
/// produced, making every frame self-describing: the decoder resolves the
/// codecs named by the header, never ones of its own choosing.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_type: MessageType,
    pub serializer: u8,
    pub compressor: u8,
    /// Wire-level correlation id, monotonically assigned by the sender.
    /// Distinct from the string request id inside request/response bodies.
    pub sequence: u32,
    pub body: MessageBody,
}

impl Message {
    pub fn request(serializer: u8, compressor: u8, sequence: u32, request: RpcRequest) -> Self {
        Message {
            message_type: MessageType::Request,
            serializer,
            compressor,
            sequence,
            body: MessageBody::Request(request),
        }
    }

    pub fn response(serializer: u8, compressor: u8, sequence: u32, response: RpcResponse) -> Self {
        Message {
            message_type: MessageType::Response,
            serializer,
            compressor,
            sequence,
            body: MessageBody::Response(response),
        }
    }

    pub fn ping(serializer: u8, compressor: u8, sequence: u32) -> Self {
        Message {
            message_type: MessageType::HeartbeatPing,
            serializer,
            compressor,
            sequence,
            body: MessageBody::Ping,
        }
    }

    pub fn pong(serializer: u8, compressor: u8, sequence: u32) -> Self {
        Message {
            message_type: MessageType::HeartbeatPong,
            serializer,
            compressor,
            sequence,
            body: MessageBody::Pong,
        }
    }
}
