use urlink_frame::FrameError;
use urlink_transport::TransportError;

/// Errors that can occur in producer and pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Establishing the connection failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The stream failed mid-read; the producer stopped and needs a reconnect.
    #[error("stream lost, reconnect needed: {0}")]
    ReconnectNeeded(#[source] FrameError),

    /// The read timeout expired before a complete frame arrived.
    #[error("no frame within read timeout")]
    Timeout,

    /// The producer was used before `start()` or after `stop()`.
    #[error("producer is not running")]
    NotRunning,

    /// All reconnect attempts were used up.
    #[error("pipeline down after {attempts} reconnect attempts")]
    Down { attempts: u32 },

    /// A pipeline thread could not be spawned.
    #[error("failed to spawn {0} thread: {1}")]
    Spawn(&'static str, #[source] std::io::Error),

    /// A pipeline thread panicked; the producer it owned is gone.
    #[error("{0} thread panicked")]
    ThreadPanic(&'static str),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
