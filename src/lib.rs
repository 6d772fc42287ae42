pub mod codec;
pub mod consts;
mod error;
pub mod wire;

pub use error::{CodecError, ProtocolError, WireError};
