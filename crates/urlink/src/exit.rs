use std::fmt;
use std::io;

use urlink_control::ControlError;
use urlink_frame::FrameError;
use urlink_pipeline::PipelineError;
use urlink_primary::PrimaryError;
use urlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn pipeline_error(context: &str, err: PipelineError) -> CliError {
    match err {
        PipelineError::Transport(err) => transport_error(context, err),
        PipelineError::ReconnectNeeded(err) => frame_error(context, err),
        PipelineError::Timeout => CliError::new(TIMEOUT, format!("{context}: {err}")),
        PipelineError::Down { .. } => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn primary_error(context: &str, err: PrimaryError) -> CliError {
    match err {
        PrimaryError::Pipeline(err) => pipeline_error(context, err),
        PrimaryError::Frame(err) => frame_error(context, err),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn control_error(context: &str, err: ControlError) -> CliError {
    match err {
        ControlError::InvalidTimeout { .. } | ControlError::UnknownControlMode(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        ControlError::Bind { source, .. } | ControlError::Accept(source) | ControlError::Io(source) => {
            io_error(context, source)
        }
        ControlError::ConnectionClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use urlink_control::ControlMode;
    use urlink_transport::Endpoint;

    #[test]
    fn refused_connection_is_a_transport_error() {
        let err = primary_error(
            "connect failed",
            PrimaryError::Pipeline(PipelineError::Transport(TransportError::Connect {
                endpoint: Endpoint::new("127.0.0.1", 30001),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            })),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("connect failed: "));
    }

    #[test]
    fn pipeline_down_is_a_transport_error() {
        let err = primary_error(
            "lost connection to 10.0.0.1:30001",
            PrimaryError::Pipeline(PipelineError::Down { attempts: 10 }),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.ends_with("pipeline down after 10 reconnect attempts"));
    }

    #[test]
    fn connect_timeout_maps_to_timeout() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                endpoint: Endpoint::new("10.0.0.1", 30001),
                source: io::Error::from(io::ErrorKind::TimedOut),
            },
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn rejected_command_is_a_usage_error() {
        let err = control_error(
            "write failed",
            ControlError::InvalidTimeout {
                mode: ControlMode::ServoJ,
            },
        );
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn malformed_frame_is_invalid_data() {
        let err = frame_error("read failed", FrameError::TooShort { length: 2 });
        assert_eq!(err.code, DATA_INVALID);
    }
}
