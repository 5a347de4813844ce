use tracing::debug;
use urlink_frame::{BinParser, ParseError, RawFrame, HEADER_SIZE};
use urlink_pipeline::{Parsed, Parser};

use crate::package::{
    ErrorCodeMessage, KeyMessage, KinematicsInfo, PrimaryPackage, RobotMessageHeader,
    RobotStateRaw, RuntimeExceptionMessage, TextMessage, UnknownRobotMessage, VersionMessage,
};
use crate::types::{RobotMessageType, RobotPackageType, KINEMATICS_INFO};

type ParseResult<T> = std::result::Result<T, ParseError>;

/// Decodes primary interface frames into [`PrimaryPackage`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaryParser;

impl Parser for PrimaryParser {
    type Package = PrimaryPackage;

    fn parse(&self, frame: &RawFrame) -> ParseResult<Parsed<PrimaryPackage>> {
        let mut bp = BinParser::new(&frame.payload);
        match RobotPackageType::from_u8(frame.package_type) {
            Some(RobotPackageType::RobotMessage) => {
                Ok(Parsed::Packages(vec![parse_robot_message(&mut bp)?]))
            }
            Some(RobotPackageType::RobotState) => {
                Ok(Parsed::Packages(parse_robot_state(&mut bp)?))
            }
            None => Ok(Parsed::UnknownType),
        }
    }
}

/// Decode a robot message payload (everything after the frame header).
pub fn parse_robot_message(bp: &mut BinParser<'_>) -> ParseResult<PrimaryPackage> {
    let header = RobotMessageHeader {
        timestamp: bp.parse_u64()?,
        source: bp.parse_i8()?,
    };
    let message_type = bp.parse_u8()?;

    let package = match RobotMessageType::from_u8(message_type) {
        Some(RobotMessageType::Text) => PrimaryPackage::Text(TextMessage {
            header,
            text: bp.parse_remainder_as_string(),
        }),
        Some(RobotMessageType::Version) => {
            let name_length = bp.parse_i8()?;
            let name_length = usize::try_from(name_length).map_err(|_| {
                ParseError::Invalid(format!("negative project name length {name_length}"))
            })?;
            PrimaryPackage::Version(VersionMessage {
                header,
                project_name: bp.parse_string(name_length)?,
                major_version: bp.parse_u8()?,
                minor_version: bp.parse_u8()?,
                svn_revision: bp.parse_i32()?,
                build_number: bp.parse_i32()?,
                build_date: bp.parse_remainder_as_string(),
            })
        }
        Some(RobotMessageType::ErrorCode) => PrimaryPackage::ErrorCode(ErrorCodeMessage {
            header,
            message_code: bp.parse_i32()?,
            message_argument: bp.parse_i32()?,
            report_level: bp.parse_i32()?.into(),
            data_type: bp.parse_u8()?,
            data: bp.parse_u32()?,
            text: bp.parse_remainder_as_string(),
        }),
        Some(RobotMessageType::Key) => {
            let message_code = bp.parse_i32()?;
            let message_argument = bp.parse_i32()?;
            let title_size = bp.parse_u8()?;
            PrimaryPackage::Key(KeyMessage {
                header,
                message_code,
                message_argument,
                title: bp.parse_string(usize::from(title_size))?,
                text: bp.parse_remainder_as_string(),
            })
        }
        Some(RobotMessageType::RuntimeException) => {
            PrimaryPackage::RuntimeException(RuntimeExceptionMessage {
                header,
                line_number: bp.parse_i32()?,
                column_number: bp.parse_i32()?,
                text: bp.parse_remainder_as_string(),
            })
        }
        None => {
            debug!(message_type, "robot message of unknown type");
            PrimaryPackage::UnknownRobotMessage(UnknownRobotMessage {
                header,
                message_type,
                payload: bp.parse_remainder().to_vec(),
            })
        }
    };

    bp.finish()?;
    Ok(package)
}

/// Decode the sub-packages of a robot state payload, in wire order.
///
/// A sub-package whose length does not fit the remaining payload fails the
/// whole frame; the frame boundary itself is still intact.
pub fn parse_robot_state(bp: &mut BinParser<'_>) -> ParseResult<Vec<PrimaryPackage>> {
    let mut packages = Vec::new();
    while !bp.is_empty() {
        let length = bp.peek_u32()? as usize;
        if length < HEADER_SIZE {
            return Err(ParseError::Invalid(format!(
                "robot state sub-package length {length} below header size"
            )));
        }
        let mut sub = bp.sub_parser(length)?;
        sub.parse_u32()?;
        let sub_type = sub.parse_u8()?;
        packages.push(parse_robot_state_sub_package(sub_type, &mut sub)?);
    }
    Ok(packages)
}

fn parse_robot_state_sub_package(
    sub_type: u8,
    bp: &mut BinParser<'_>,
) -> ParseResult<PrimaryPackage> {
    match sub_type {
        KINEMATICS_INFO => {
            let info = KinematicsInfo {
                checksum: bp.parse_u32_array::<6>()?,
                dh_theta: bp.parse_f64_array::<6>()?,
                dh_a: bp.parse_f64_array::<6>()?,
                dh_d: bp.parse_f64_array::<6>()?,
                dh_alpha: bp.parse_f64_array::<6>()?,
                calibration_status: bp.parse_u32()?,
            };
            bp.finish()?;
            Ok(PrimaryPackage::KinematicsInfo(info))
        }
        _ => Ok(PrimaryPackage::RobotStateRaw(RobotStateRaw {
            sub_type,
            payload: bp.parse_remainder().to_vec(),
        })),
    }
}
