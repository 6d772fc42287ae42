use std::collections::VecDeque;

use tracing::error;

use crate::ProtocolError;
use crate::consts::{
    HEADER_SIZE, LENGTH_FIELD_OFFSET, MAGIC, MAGIC_LENGTH, MAX_FRAME_LENGTH, VERSION,
};

/// A streaming length-field splitter sitting in front of the frame codec.
///
/// TCP hands the reader arbitrary byte chunks; this buffers them and emits
/// exactly one complete frame's bytes at a time, regardless of how the
/// stream was segmented or coalesced. The magic bytes and version are
/// validated before the declared length is ever trusted, so a peer speaking
/// a different protocol cannot make the splitter wait on a bogus length.
///
/// Every error here is fatal: after returning one, the splitter is poisoned
/// and the connection must be closed. A wrong magic or version means the
/// peer speaks a different protocol and no partial recovery is meaningful.
pub struct FrameSplitter {
    buffer: Vec<u8>,
    max_frame_length: usize,
    poisoned: bool,
}

/// Complete frames drained out of the splitter by one `read_bytes` call.
#[derive(Debug)]
pub struct FrameIter {
    queue: VecDeque<Vec<u8>>,
}

impl Iterator for FrameIter {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop_front()
    }
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::with_max_frame_length(MAX_FRAME_LENGTH)
    }

    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        FrameSplitter {
            buffer: Vec::new(),
            max_frame_length,
            poisoned: false,
        }
    }

    /// Buffers `data` and returns every frame completed by it, in arrival
    /// order. Each yielded item is one frame's bytes, header included,
    /// ready for [`FrameCodec::decode`].
    ///
    /// [`FrameCodec::decode`]: crate::wire::FrameCodec::decode
    pub fn read_bytes(&mut self, data: &[u8]) -> Result<FrameIter, ProtocolError> {
        if self.poisoned {
            return Err(ProtocolError::Poisoned);
        }
        self.buffer.extend_from_slice(data);

        let mut queue = VecDeque::new();
        loop {
            match self.try_extract() {
                Ok(Some(frame)) => queue.push_back(frame),
                Ok(None) => break,
                Err(e) => {
                    self.poisoned = true;
                    error!(error = %e, "frame splitter failed; closing connection");
                    return Err(e);
                }
            }
        }
        Ok(FrameIter { queue })
    }

    fn try_extract(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        // Reject foreign protocols as soon as the prefix is visible.
        self.check_magic_and_version()?;

        if self.buffer.len() < LENGTH_FIELD_OFFSET + 4 {
            return Ok(None);
        }
        let length = u32::from_be_bytes(
            self.buffer[LENGTH_FIELD_OFFSET..LENGTH_FIELD_OFFSET + 4]
                .try_into()
                .map_err(|_| ProtocolError::InvalidLength { length: 0 })?,
        ) as usize;

        if length < HEADER_SIZE {
            return Err(ProtocolError::InvalidLength { length });
        }
        if length > self.max_frame_length {
            return Err(ProtocolError::FrameTooLarge {
                length,
                max: self.max_frame_length,
            });
        }
        if self.buffer.len() < length {
            return Ok(None);
        }

        let frame: Vec<u8> = self.buffer.drain(..length).collect();
        Ok(Some(frame))
    }

    fn check_magic_and_version(&self) -> Result<(), ProtocolError> {
        if self.buffer.len() >= MAGIC_LENGTH && self.buffer[..MAGIC_LENGTH] != MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(&self.buffer[..MAGIC_LENGTH]);
            return Err(ProtocolError::BadMagic { found });
        }
        if self.buffer.len() > MAGIC_LENGTH && self.buffer[MAGIC_LENGTH] != VERSION {
            return Err(ProtocolError::BadVersion {
                found: self.buffer[MAGIC_LENGTH],
            });
        }
        Ok(())
    }
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::new()
    }
}
