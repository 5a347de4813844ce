/// Errors that can occur while reading frames off a stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length prefix is smaller than the frame header.
    #[error("malformed frame: length {length} is shorter than the 5-byte header")]
    TooShort { length: u32 },

    /// The length prefix exceeds the configured maximum.
    #[error("malformed frame: length {length} exceeds maximum {max}")]
    TooLarge { length: u32, max: usize },

    /// The payload does not fit into a length prefix.
    #[error("payload too large to encode ({size} bytes)")]
    PayloadTooLarge { size: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Framing violations that the reader recovers from by resynchronising.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::TooShort { .. } | Self::TooLarge { .. })
    }

    /// Read timeout expired without a complete frame; buffered bytes are kept.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Io(err) if matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            )
        )
    }
}

/// Errors that can occur while decoding fields from a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The payload ended before a field could be read.
    #[error("truncated payload: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A fixed-size payload was not fully consumed.
    #[error("payload not fully consumed: {remaining} trailing bytes")]
    Trailing { remaining: usize },

    /// A field holds a value the decoder cannot accept.
    #[error("invalid field: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
