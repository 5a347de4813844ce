use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Size of the big-endian total-length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Frame header: length (4) + package type (1) = 5 bytes.
pub const HEADER_SIZE: usize = LENGTH_PREFIX_SIZE + 1;

/// Default upper bound for a single frame: 1 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// One deframed package: its type discriminator and raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// The package type byte following the length prefix.
    pub package_type: u8,
    /// Payload bytes after the header.
    pub payload: Bytes,
}

impl RawFrame {
    pub fn new(package_type: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            package_type,
            payload: payload.into(),
        }
    }

    /// Total wire size of this frame, as carried in its length prefix.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────────┬──────────────┬──────────────────────┐
/// │ Length (4B BE) │ Type (1B)    │ Payload              │
/// │ header incl.   │              │ (Length - 5 bytes)   │
/// └────────────────┴──────────────┴──────────────────────┘
/// ```
pub fn encode_frame(package_type: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize - HEADER_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32((HEADER_SIZE + payload.len()) as u32);
    dst.put_u8(package_type);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
///
/// A length prefix below [`HEADER_SIZE`] or above `max_frame` cannot be
/// trusted. The buffer is advanced by exactly one byte and the error is
/// returned, so the next call looks for a header at the following offset.
pub fn decode_frame(src: &mut BytesMut, max_frame: usize) -> Result<Option<RawFrame>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&src[..LENGTH_PREFIX_SIZE]);
    let length = u32::from_be_bytes(prefix);

    if (length as usize) < HEADER_SIZE {
        src.advance(1);
        return Err(FrameError::TooShort { length });
    }
    if length as usize > max_frame {
        src.advance(1);
        return Err(FrameError::TooLarge {
            length,
            max: max_frame,
        });
    }

    let total = length as usize;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    let package_type = src.get_u8();
    let payload = src.split_to(total - HEADER_SIZE).freeze();

    Ok(Some(RawFrame {
        package_type,
        payload,
    }))
}

/// Configuration for frame decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest accepted frame, header included. Default: 1 MiB.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
