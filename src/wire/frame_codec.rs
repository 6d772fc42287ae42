use tracing::trace;

use crate::codec::CodecRegistry;
use crate::consts::{HEADER_SIZE, LENGTH_FIELD_OFFSET, MAGIC, MESSAGE_TYPE_OFFSET, VERSION};
use crate::wire::{Message, MessageBody, MessageType};
use crate::{CodecError, ProtocolError, WireError};

/// Encodes a [`Message`] into one complete frame and decodes a complete
/// frame back into a [`Message`].
///
/// Encoding writes the fixed header with a reserved length field, then for
/// non-heartbeat types serializes the body with the serializer named by the
/// message, compresses it with the named compressor, and backpatches the
/// total length. Heartbeat frames skip the body entirely and are always
/// exactly [`HEADER_SIZE`] bytes.
///
/// Decoding is self-describing: the serializer and compressor are resolved
/// from the ids found in the frame header, never chosen by the reader. An
/// unknown id is fatal to the connection.
pub struct FrameCodec;

impl FrameCodec {
    pub fn encode(message: &Message, registry: &CodecRegistry) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&MAGIC);
        buf.push(VERSION);
        // Reserve the length field; backpatched once the body size is known.
        buf.extend_from_slice(&[0u8; 4]);
        buf.push(message.message_type.into());
        buf.push(message.serializer);
        buf.push(message.compressor);
        buf.extend_from_slice(&message.sequence.to_be_bytes());

        if !message.message_type.is_heartbeat() {
            let serializer = registry.serializer(message.serializer)?;
            let body = match &message.body {
                MessageBody::Request(request) => serializer.serialize_request(request)?,
                MessageBody::Response(response) => serializer.serialize_response(response)?,
                MessageBody::Ping | MessageBody::Pong => {
                    return Err(CodecError::Serialize(
                        "heartbeat body on a non-heartbeat message".to_string(),
                    )
                    .into());
                }
            };
            let compressed = registry.compressor(message.compressor)?.compress(&body)?;
            buf.extend_from_slice(&compressed);
        }

        let total = buf.len() as u32;
        buf[LENGTH_FIELD_OFFSET..LENGTH_FIELD_OFFSET + 4].copy_from_slice(&total.to_be_bytes());

        trace!(
            message_type = ?message.message_type,
            sequence = message.sequence,
            total,
            "encoded frame"
        );
        Ok(buf)
    }

    /// Decodes one complete frame as produced by a [`FrameSplitter`]. The
    /// input must be exactly one frame: header plus `total length - 16`
    /// body bytes.
    ///
    /// [`FrameSplitter`]: crate::wire::FrameSplitter
    pub fn decode(frame: &[u8], registry: &CodecRegistry) -> Result<Message, WireError> {
        if frame.len() < HEADER_SIZE {
            return Err(ProtocolError::InvalidLength { length: frame.len() }.into());
        }

        let tag = frame[MESSAGE_TYPE_OFFSET];
        let message_type =
            MessageType::try_from(tag).map_err(|_| CodecError::UnknownMessageType { tag })?;
        let serializer_id = frame[MESSAGE_TYPE_OFFSET + 1];
        let compressor_id = frame[MESSAGE_TYPE_OFFSET + 2];
        let sequence = u32::from_be_bytes(
            frame[HEADER_SIZE - 4..HEADER_SIZE]
                .try_into()
                .map_err(|_| ProtocolError::InvalidLength { length: frame.len() })?,
        );

        let body = match message_type {
            MessageType::HeartbeatPing => MessageBody::Ping,
            MessageType::HeartbeatPong => MessageBody::Pong,
            MessageType::Request | MessageType::Response => {
                let compressed = &frame[HEADER_SIZE..];
                let bytes = registry.compressor(compressor_id)?.decompress(compressed)?;
                let serializer = registry.serializer(serializer_id)?;
                match message_type {
                    MessageType::Request => {
                        MessageBody::Request(serializer.deserialize_request(&bytes)?)
                    }
                    _ => MessageBody::Response(serializer.deserialize_response(&bytes)?),
                }
            }
        };

        Ok(Message {
            message_type,
            serializer: serializer_id,
            compressor: compressor_id,
            sequence,
            body,
        })
    }
}
