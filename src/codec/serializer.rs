use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::CodecError;
use crate::wire::{RpcRequest, RpcResponse};

/// Stable one-byte codes identifying the built-in body serializers.
///
/// These ids travel on the wire, so client and server must share one
/// canonical assignment; a mismatch surfaces as an unknown-serializer
/// protocol error on the receiving side.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum SerializerId {
    Bincode = 1,
    Bitcode = 2,
    Json = 3,
}

/// A named serialization strategy for message bodies.
///
/// The frame codec resolves implementations through a [`CodecRegistry`]
/// by the id carried in the frame header. Implementations are stateless
/// and shared behind `Arc`.
///
/// [`CodecRegistry`]: crate::codec::CodecRegistry
pub trait Serializer: Send + Sync {
    fn id(&self) -> u8;
    fn name(&self) -> &'static str;

    fn serialize_request(&self, request: &RpcRequest) -> Result<Vec<u8>, CodecError>;
    fn deserialize_request(&self, bytes: &[u8]) -> Result<RpcRequest, CodecError>;
    fn serialize_response(&self, response: &RpcResponse) -> Result<Vec<u8>, CodecError>;
    fn deserialize_response(&self, bytes: &[u8]) -> Result<RpcResponse, CodecError>;
}

pub struct BincodeSerializer;

impl BincodeSerializer {
    fn config() -> bincode::config::Configuration {
        bincode::config::standard()
    }
}

impl Serializer for BincodeSerializer {
    fn id(&self) -> u8 {
        SerializerId::Bincode.into()
    }

    fn name(&self) -> &'static str {
        "bincode"
    }

    fn serialize_request(&self, request: &RpcRequest) -> Result<Vec<u8>, CodecError> {
        bincode::serde::encode_to_vec(request, Self::config())
            .map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn deserialize_request(&self, bytes: &[u8]) -> Result<RpcRequest, CodecError> {
        bincode::serde::decode_from_slice(bytes, Self::config())
            .map(|(request, _)| request)
            .map_err(|e| CodecError::Deserialize(e.to_string()))
    }

    fn serialize_response(&self, response: &RpcResponse) -> Result<Vec<u8>, CodecError> {
        bincode::serde::encode_to_vec(response, Self::config())
            .map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn deserialize_response(&self, bytes: &[u8]) -> Result<RpcResponse, CodecError> {
        bincode::serde::decode_from_slice(bytes, Self::config())
            .map(|(response, _)| response)
            .map_err(|e| CodecError::Deserialize(e.to_string()))
    }
}

pub struct BitcodeSerializer;

impl Serializer for BitcodeSerializer {
    fn id(&self) -> u8 {
        SerializerId::Bitcode.into()
    }

    fn name(&self) -> &'static str {
        "bitcode"
    }

    fn serialize_request(&self, request: &RpcRequest) -> Result<Vec<u8>, CodecError> {
        bitcode::serialize(request).map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn deserialize_request(&self, bytes: &[u8]) -> Result<RpcRequest, CodecError> {
        bitcode::deserialize(bytes).map_err(|e| CodecError::Deserialize(e.to_string()))
    }

    fn serialize_response(&self, response: &RpcResponse) -> Result<Vec<u8>, CodecError> {
        bitcode::serialize(response).map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn deserialize_response(&self, bytes: &[u8]) -> Result<RpcResponse, CodecError> {
        bitcode::deserialize(bytes).map_err(|e| CodecError::Deserialize(e.to_string()))
    }
}

pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn id(&self) -> u8 {
        SerializerId::Json.into()
    }

    fn name(&self) -> &'static str {
        "json"
    }

    fn serialize_request(&self, request: &RpcRequest) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(request).map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn deserialize_request(&self, bytes: &[u8]) -> Result<RpcRequest, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Deserialize(e.to_string()))
    }

    fn serialize_response(&self, response: &RpcResponse) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(response).map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn deserialize_response(&self, bytes: &[u8]) -> Result<RpcResponse, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Deserialize(e.to_string()))
    }
}
