/// Magic bytes opening every frame. A peer that does not send these is
/// speaking a different protocol and its connection must be closed.
pub const MAGIC: [u8; 4] = *b"xrpc";

/// Current protocol version.
pub const VERSION: u8 = 1;

/// Size in bytes of the magic constant.
pub const MAGIC_LENGTH: usize = 4;

/// Size in bytes of the version field.
pub const VERSION_LENGTH: usize = 1;

/// Byte offset where the 4-byte total-length field (u32, big-endian) begins.
/// The value counts header and body together.
pub const LENGTH_FIELD_OFFSET: usize = MAGIC_LENGTH + VERSION_LENGTH;

/// Size in bytes of the total-length field.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Byte offset of the 1-byte message type.
pub const MESSAGE_TYPE_OFFSET: usize = LENGTH_FIELD_OFFSET + LENGTH_FIELD_SIZE;

/// Byte offset of the 1-byte serializer id.
pub const SERIALIZER_ID_OFFSET: usize = MESSAGE_TYPE_OFFSET + 1;

/// Byte offset of the 1-byte compression id.
pub const COMPRESSOR_ID_OFFSET: usize = SERIALIZER_ID_OFFSET + 1;

/// Byte offset where the 4-byte wire sequence (u32, big-endian) begins.
/// This is the sender-monotonic frame correlation id, distinct from the
/// string request id carried inside request/response bodies.
pub const SEQUENCE_OFFSET: usize = COMPRESSOR_ID_OFFSET + 1;

/// Total size of the fixed frame header. Heartbeat frames are exactly this
/// long; every other frame carries `total length - HEADER_SIZE` body bytes.
pub const HEADER_SIZE: usize = SEQUENCE_OFFSET + 4;

/// Frames longer than this are rejected outright and the connection closed.
pub const MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

/// Seconds of write idleness after which a client sends a heartbeat ping.
pub const DEFAULT_WRITE_IDLE_SECS: u64 = 5;

/// Seconds of read idleness after which a server drops a connection.
pub const DEFAULT_READ_IDLE_SECS: u64 = 15;

/// Bound on a single connect attempt, distinguishing an unreachable peer
/// from a slow one. Both outcomes count as one failed attempt.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Dial attempts made by the reconnector before giving up on an endpoint.
pub const DEFAULT_MAX_CONNECT_ATTEMPTS: u32 = 5;

/// Per-call timeout enforced while waiting on a response.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 10;

/// Attempt count used by the bounded-retry fault-tolerance strategy.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_sixteen_bytes() {
        assert_eq!(LENGTH_FIELD_OFFSET, 5);
        assert_eq!(MESSAGE_TYPE_OFFSET, 9);
        assert_eq!(SERIALIZER_ID_OFFSET, 10);
        assert_eq!(COMPRESSOR_ID_OFFSET, 11);
        assert_eq!(SEQUENCE_OFFSET, 12);
        assert_eq!(HEADER_SIZE, 16);
    }
}
