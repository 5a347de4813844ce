use std::fmt;

use serde::Serialize;

/// Frame discriminators on the primary interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotPackageType {
    RobotState,
    RobotMessage,
}

impl RobotPackageType {
    pub const ROBOT_STATE: u8 = 16;
    pub const ROBOT_MESSAGE: u8 = 20;

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            Self::ROBOT_STATE => Some(Self::RobotState),
            Self::ROBOT_MESSAGE => Some(Self::RobotMessage),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::RobotState => Self::ROBOT_STATE,
            Self::RobotMessage => Self::ROBOT_MESSAGE,
        }
    }
}

/// Robot message subtypes, carried in the robot message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotMessageType {
    Text,
    Version,
    ErrorCode,
    Key,
    RuntimeException,
}

impl RobotMessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Text),
            3 => Some(Self::Version),
            6 => Some(Self::ErrorCode),
            7 => Some(Self::Key),
            10 => Some(Self::RuntimeException),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Text => 0,
            Self::Version => 3,
            Self::ErrorCode => 6,
            Self::Key => 7,
            Self::RuntimeException => 10,
        }
    }
}

/// Robot state sub-package types that get a typed decoding.
pub const KINEMATICS_INFO: u8 = 5;

/// Severity attached to error code messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLevel {
    Debug,
    Info,
    Warning,
    Violation,
    Fault,
    DevlDebug,
    DevlInfo,
    DevlWarning,
    DevlViolation,
    DevlFault,
    Other(i32),
}

impl ReportLevel {
    /// At least a violation, i.e. the robot stopped or will stop.
    pub fn is_severe(self) -> bool {
        matches!(
            self,
            Self::Violation | Self::Fault | Self::DevlViolation | Self::DevlFault
        )
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::Debug => 0,
            Self::Info => 1,
            Self::Warning => 2,
            Self::Violation => 3,
            Self::Fault => 4,
            Self::DevlDebug => 128,
            Self::DevlInfo => 129,
            Self::DevlWarning => 130,
            Self::DevlViolation => 131,
            Self::DevlFault => 132,
            Self::Other(value) => value,
        }
    }
}

impl From<i32> for ReportLevel {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Warning,
            3 => Self::Violation,
            4 => Self::Fault,
            128 => Self::DevlDebug,
            129 => Self::DevlInfo,
            130 => Self::DevlWarning,
            131 => Self::DevlViolation,
            132 => Self::DevlFault,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ReportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => f.write_str("DEBUG"),
            Self::Info => f.write_str("INFO"),
            Self::Warning => f.write_str("WARNING"),
            Self::Violation => f.write_str("VIOLATION"),
            Self::Fault => f.write_str("FAULT"),
            Self::DevlDebug => f.write_str("DEVL_DEBUG"),
            Self::DevlInfo => f.write_str("DEVL_INFO"),
            Self::DevlWarning => f.write_str("DEVL_WARNING"),
            Self::DevlViolation => f.write_str("DEVL_VIOLATION"),
            Self::DevlFault => f.write_str("DEVL_FAULT"),
            Self::Other(value) => write!(f, "LEVEL({value})"),
        }
    }
}
