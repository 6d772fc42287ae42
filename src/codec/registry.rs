use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::CodecError;
use crate::codec::{
    BincodeSerializer, BitcodeSerializer, Compressor, DummyCompressor, GzipCompressor,
    JsonSerializer, Serializer,
};

/// Maps the one-byte serializer and compressor ids carried in frame headers
/// to their implementations.
///
/// The registry is populated explicitly at startup; there is no runtime
/// strategy scanning. Client and server must be built from the same
/// assignment or decoding fails with an unknown-id error, which is fatal to
/// the connection.
pub struct CodecRegistry {
    serializers: HashMap<u8, Arc<dyn Serializer>>,
    compressors: HashMap<u8, Arc<dyn Compressor>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        CodecRegistry {
            serializers: HashMap::new(),
            compressors: HashMap::new(),
        }
    }

    /// Registry carrying every built-in serializer and compressor under the
    /// canonical id assignment.
    pub fn with_defaults() -> Self {
        let mut registry = CodecRegistry::new();
        registry.register_serializer(Arc::new(BincodeSerializer));
        registry.register_serializer(Arc::new(BitcodeSerializer));
        registry.register_serializer(Arc::new(JsonSerializer));
        registry.register_compressor(Arc::new(DummyCompressor));
        registry.register_compressor(Arc::new(GzipCompressor));
        registry
    }

    pub fn register_serializer(&mut self, serializer: Arc<dyn Serializer>) {
        self.serializers.insert(serializer.id(), serializer);
    }

    pub fn register_compressor(&mut self, compressor: Arc<dyn Compressor>) {
        self.compressors.insert(compressor.id(), compressor);
    }

    pub fn serializer(&self, id: u8) -> Result<&Arc<dyn Serializer>, CodecError> {
        self.serializers
            .get(&id)
            .ok_or(CodecError::UnknownSerializer { id })
    }

    pub fn compressor(&self, id: u8) -> Result<&Arc<dyn Compressor>, CodecError> {
        self.compressors
            .get(&id)
            .ok_or(CodecError::UnknownCompressor { id })
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

static DEFAULT_REGISTRY: Lazy<Arc<CodecRegistry>> =
    Lazy::new(|| Arc::new(CodecRegistry::with_defaults()));

/// Shared default registry. Immutable after construction, so handing out
/// clones of the `Arc` is safe anywhere in the process.
pub fn default_registry() -> Arc<CodecRegistry> {
    DEFAULT_REGISTRY.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ids_are_errors() {
        let registry = CodecRegistry::with_defaults();
        assert!(matches!(
            registry.serializer(9),
            Err(CodecError::UnknownSerializer { id: 9 })
        ));
        assert!(matches!(
            registry.compressor(9),
            Err(CodecError::UnknownCompressor { id: 9 })
        ));
    }

    #[test]
    fn default_assignment_is_stable() {
        let registry = CodecRegistry::with_defaults();
        assert_eq!(registry.serializer(1).expect("bincode").name(), "bincode");
        assert_eq!(registry.serializer(2).expect("bitcode").name(), "bitcode");
        assert_eq!(registry.serializer(3).expect("json").name(), "json");
        assert_eq!(registry.compressor(0).expect("dummy").name(), "dummy");
        assert_eq!(registry.compressor(1).expect("gzip").name(), "gzip");
    }
}
