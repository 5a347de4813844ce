use std::fmt;

use serde::Serialize;

use crate::consumer::PrimaryConsumer;
use crate::types::ReportLevel;

/// Fields shared by every robot message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RobotMessageHeader {
    /// Controller timestamp in milliseconds.
    pub timestamp: u64,
    pub source: i8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMessage {
    pub header: RobotMessageHeader,
    pub text: String,
}

/// Controller software version, sent once after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionMessage {
    pub header: RobotMessageHeader,
    pub project_name: String,
    pub major_version: u8,
    pub minor_version: u8,
    pub svn_revision: i32,
    pub build_number: i32,
    pub build_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCodeMessage {
    pub header: RobotMessageHeader,
    pub message_code: i32,
    pub message_argument: i32,
    pub report_level: ReportLevel,
    pub data_type: u8,
    pub data: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyMessage {
    pub header: RobotMessageHeader,
    pub message_code: i32,
    pub message_argument: i32,
    pub title: String,
    pub text: String,
}

/// A URScript runtime error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeExceptionMessage {
    pub header: RobotMessageHeader,
    pub line_number: i32,
    pub column_number: i32,
    pub text: String,
}

/// A robot message with a subtype this crate does not decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownRobotMessage {
    pub header: RobotMessageHeader,
    pub message_type: u8,
    pub payload: Vec<u8>,
}

/// Denavit-Hartenberg parameters and calibration checksums of the arm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KinematicsInfo {
    pub checksum: [u32; 6],
    pub dh_theta: [f64; 6],
    pub dh_a: [f64; 6],
    pub dh_d: [f64; 6],
    pub dh_alpha: [f64; 6],
    pub calibration_status: u32,
}

/// A robot state sub-package passed through undecoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RobotStateRaw {
    pub sub_type: u8,
    pub payload: Vec<u8>,
}

/// Every package the primary interface can deliver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrimaryPackage {
    Text(TextMessage),
    Version(VersionMessage),
    ErrorCode(ErrorCodeMessage),
    Key(KeyMessage),
    RuntimeException(RuntimeExceptionMessage),
    UnknownRobotMessage(UnknownRobotMessage),
    KinematicsInfo(KinematicsInfo),
    RobotStateRaw(RobotStateRaw),
}

impl PrimaryPackage {
    /// Hand the concrete package to the matching handler of `consumer`.
    pub fn accept(&self, consumer: &dyn PrimaryConsumer) -> bool {
        match self {
            Self::Text(msg) => consumer.consume_text(msg),
            Self::Version(msg) => consumer.consume_version(msg),
            Self::ErrorCode(msg) => consumer.consume_error_code(msg),
            Self::Key(msg) => consumer.consume_key(msg),
            Self::RuntimeException(msg) => consumer.consume_runtime_exception(msg),
            Self::UnknownRobotMessage(msg) => consumer.consume_unknown_robot_message(msg),
            Self::KinematicsInfo(info) => consumer.consume_kinematics_info(info),
            Self::RobotStateRaw(raw) => consumer.consume_robot_state_raw(raw),
        }
    }

    /// Short variant name, used for logging and tables.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Version(_) => "version",
            Self::ErrorCode(_) => "error_code",
            Self::Key(_) => "key",
            Self::RuntimeException(_) => "runtime_exception",
            Self::UnknownRobotMessage(_) => "unknown_robot_message",
            Self::KinematicsInfo(_) => "kinematics_info",
            Self::RobotStateRaw(_) => "robot_state_raw",
        }
    }

    /// Robot message header, if this is a robot message.
    pub fn header(&self) -> Option<&RobotMessageHeader> {
        match self {
            Self::Text(msg) => Some(&msg.header),
            Self::Version(msg) => Some(&msg.header),
            Self::ErrorCode(msg) => Some(&msg.header),
            Self::Key(msg) => Some(&msg.header),
            Self::RuntimeException(msg) => Some(&msg.header),
            Self::UnknownRobotMessage(msg) => Some(&msg.header),
            Self::KinematicsInfo(_) | Self::RobotStateRaw(_) => None,
        }
    }
}

impl fmt::Display for TextMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Display for VersionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "project name: {}", self.project_name)?;
        writeln!(
            f,
            "version: {}.{}.{}",
            self.major_version, self.minor_version, self.svn_revision
        )?;
        writeln!(f, "build number: {}", self.build_number)?;
        write!(f, "build date: {}", self.build_date)
    }
}

impl fmt::Display for ErrorCodeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C{}A{} ({}): {}",
            self.message_code, self.message_argument, self.report_level, self.text
        )
    }
}

impl fmt::Display for KeyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C{}A{} {}: {}",
            self.message_code, self.message_argument, self.title, self.text
        )
    }
}

impl fmt::Display for RuntimeExceptionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Runtime error in line {}, column {}",
            self.line_number, self.column_number
        )?;
        write!(f, "Error: {}", self.text)
    }
}

impl fmt::Display for UnknownRobotMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "robot message of unknown type {} ({} bytes)",
            self.message_type,
            self.payload.len()
        )
    }
}

impl fmt::Display for KinematicsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "checksum: {:?}", self.checksum)?;
        writeln!(f, "dh_theta: {:?}", self.dh_theta)?;
        writeln!(f, "dh_a: {:?}", self.dh_a)?;
        writeln!(f, "dh_d: {:?}", self.dh_d)?;
        writeln!(f, "dh_alpha: {:?}", self.dh_alpha)?;
        write!(f, "calibration_status: {}", self.calibration_status)
    }
}

impl fmt::Display for RobotStateRaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "robot state sub-package {} ({} bytes)",
            self.sub_type,
            self.payload.len()
        )
    }
}

impl fmt::Display for PrimaryPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(msg) => msg.fmt(f),
            Self::Version(msg) => msg.fmt(f),
            Self::ErrorCode(msg) => msg.fmt(f),
            Self::Key(msg) => msg.fmt(f),
            Self::RuntimeException(msg) => msg.fmt(f),
            Self::UnknownRobotMessage(msg) => msg.fmt(f),
            Self::KinematicsInfo(info) => info.fmt(f),
            Self::RobotStateRaw(raw) => raw.fmt(f),
        }
    }
}
