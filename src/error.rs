use std::fmt;
use std::io;

/// Fatal faults in the byte stream itself. Any of these means the peer is
/// not speaking this protocol (or this version of it) and the connection
/// must be closed; none of them is recoverable per frame.
#[derive(Debug)]
pub enum ProtocolError {
    /// The first four bytes of a frame did not match the magic constant.
    BadMagic { found: [u8; 4] },
    /// The version byte did not match the expected protocol version.
    BadVersion { found: u8 },
    /// A frame declared a total length above the configured maximum.
    FrameTooLarge { length: usize, max: usize },
    /// A frame declared a total length smaller than the fixed header.
    InvalidLength { length: usize },
    /// Bytes were fed to a splitter that already reported a fatal error.
    Poisoned,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::BadMagic { found } => {
                write!(f, "unknown magic bytes: {found:?}")
            }
            ProtocolError::BadVersion { found } => {
                write!(f, "incompatible protocol version: {found}")
            }
            ProtocolError::FrameTooLarge { length, max } => {
                write!(f, "frame length {length} exceeds maximum {max}")
            }
            ProtocolError::InvalidLength { length } => {
                write!(f, "frame length {length} is below the header size")
            }
            ProtocolError::Poisoned => {
                write!(f, "splitter already failed; connection must be closed")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Faults while turning a frame body into a message or back. Unknown ids
/// are protocol-class errors (no silent fallback, close the connection);
/// serialize/deserialize failures carry the underlying reason.
#[derive(Debug)]
pub enum CodecError {
    UnknownSerializer { id: u8 },
    UnknownCompressor { id: u8 },
    UnknownMessageType { tag: u8 },
    Serialize(String),
    Deserialize(String),
    Compress(io::Error),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnknownSerializer { id } => write!(f, "unknown serializer id: {id}"),
            CodecError::UnknownCompressor { id } => write!(f, "unknown compressor id: {id}"),
            CodecError::UnknownMessageType { tag } => write!(f, "unknown message type: {tag}"),
            CodecError::Serialize(reason) => write!(f, "serialize failed: {reason}"),
            CodecError::Deserialize(reason) => write!(f, "deserialize failed: {reason}"),
            CodecError::Compress(e) => write!(f, "compression failed: {e}"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Compress(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        CodecError::Compress(e)
    }
}

/// Umbrella error for the encode/decode path, covering both the framing
/// layer and the pluggable body codecs.
#[derive(Debug)]
pub enum WireError {
    Protocol(ProtocolError),
    Codec(CodecError),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Protocol(e) => write!(f, "protocol error: {e}"),
            WireError::Codec(e) => write!(f, "codec error: {e}"),
        }
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WireError::Protocol(e) => Some(e),
            WireError::Codec(e) => Some(e),
        }
    }
}

impl From<ProtocolError> for WireError {
    fn from(e: ProtocolError) -> Self {
        WireError::Protocol(e)
    }
}

impl From<CodecError> for WireError {
    fn from(e: CodecError) -> Self {
        WireError::Codec(e)
    }
}
