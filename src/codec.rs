mod compress;
mod registry;
mod serializer;

pub use compress::{Compressor, CompressorId, DummyCompressor, GzipCompressor};
pub use registry::{CodecRegistry, default_registry};
pub use serializer::{
    BincodeSerializer, BitcodeSerializer, JsonSerializer, Serializer, SerializerId,
};
