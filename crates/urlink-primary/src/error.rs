use urlink_frame::FrameError;
use urlink_pipeline::PipelineError;

/// Errors from the primary client and package encoding.
#[derive(Debug, thiserror::Error)]
pub enum PrimaryError {
    /// Starting or running the pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A package was placed in a frame of the wrong kind.
    #[error("{kind} package cannot be encoded in a {frame} frame")]
    WrongFrame {
        kind: &'static str,
        frame: &'static str,
    },

    /// An unknown robot message claims a subtype that has its own variant.
    #[error("robot message type {message_type} must be encoded as its own variant")]
    KnownMessageType { message_type: u8 },

    /// A length-prefixed field exceeds what its prefix can express.
    #[error("{field} is {length} bytes, longer than its length prefix allows")]
    FieldTooLong { field: &'static str, length: usize },
}

pub type Result<T> = std::result::Result<T, PrimaryError>;
