use std::net::SocketAddr;

use crate::mode::ControlMode;

/// Errors from validating or sending control commands.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// A realtime mode was asked to run without a receive timeout.
    #[error("control mode {mode} requires a receive timeout")]
    InvalidTimeout { mode: ControlMode },

    /// The mode is neither realtime nor non-realtime.
    #[error("control mode {0} cannot be commanded")]
    UnknownControlMode(ControlMode),

    #[error("failed to bind command listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept robot connection: {0}")]
    Accept(#[source] std::io::Error),

    /// The robot closed the command connection.
    #[error("command connection closed")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ControlError>;
