//! Wire encoding of primary packages.
//!
//! The controller only ever sends these packages. Encoding them is useful to
//! simulate a controller, e.g. in tests or replay tools.

use bytes::{BufMut, BytesMut};
use urlink_frame::{encode_frame, RawFrame, HEADER_SIZE};

use crate::error::{PrimaryError, Result};
use crate::package::{PrimaryPackage, RobotMessageHeader};
use crate::types::{RobotMessageType, RobotPackageType, KINEMATICS_INFO};

/// Build a robot message frame. Robot state packages are rejected.
pub fn robot_message_frame(package: &PrimaryPackage) -> Result<RawFrame> {
    let mut payload = BytesMut::new();
    match package {
        PrimaryPackage::Text(msg) => {
            put_header(&mut payload, &msg.header, RobotMessageType::Text.as_u8());
            payload.put_slice(msg.text.as_bytes());
        }
        PrimaryPackage::Version(msg) => {
            put_header(&mut payload, &msg.header, RobotMessageType::Version.as_u8());
            let name = msg.project_name.as_bytes();
            let name_length = i8::try_from(name.len())
                .map_err(|_| PrimaryError::FieldTooLong {
                    field: "project name",
                    length: name.len(),
                })?;
            payload.put_i8(name_length);
            payload.put_slice(name);
            payload.put_u8(msg.major_version);
            payload.put_u8(msg.minor_version);
            payload.put_i32(msg.svn_revision);
            payload.put_i32(msg.build_number);
            payload.put_slice(msg.build_date.as_bytes());
        }
        PrimaryPackage::ErrorCode(msg) => {
            put_header(&mut payload, &msg.header, RobotMessageType::ErrorCode.as_u8());
            payload.put_i32(msg.message_code);
            payload.put_i32(msg.message_argument);
            payload.put_i32(msg.report_level.as_i32());
            payload.put_u8(msg.data_type);
            payload.put_u32(msg.data);
            payload.put_slice(msg.text.as_bytes());
        }
        PrimaryPackage::Key(msg) => {
            put_header(&mut payload, &msg.header, RobotMessageType::Key.as_u8());
            let title = msg.title.as_bytes();
            let title_size = u8::try_from(title.len())
                .map_err(|_| PrimaryError::FieldTooLong {
                    field: "key title",
                    length: title.len(),
                })?;
            payload.put_i32(msg.message_code);
            payload.put_i32(msg.message_argument);
            payload.put_u8(title_size);
            payload.put_slice(title);
            payload.put_slice(msg.text.as_bytes());
        }
        PrimaryPackage::RuntimeException(msg) => {
            put_header(
                &mut payload,
                &msg.header,
                RobotMessageType::RuntimeException.as_u8(),
            );
            payload.put_i32(msg.line_number);
            payload.put_i32(msg.column_number);
            payload.put_slice(msg.text.as_bytes());
        }
        PrimaryPackage::UnknownRobotMessage(msg) => {
            if RobotMessageType::from_u8(msg.message_type).is_some() {
                return Err(PrimaryError::KnownMessageType {
                    message_type: msg.message_type,
                });
            }
            put_header(&mut payload, &msg.header, msg.message_type);
            payload.put_slice(&msg.payload);
        }
        PrimaryPackage::KinematicsInfo(_) | PrimaryPackage::RobotStateRaw(_) => {
            return Err(PrimaryError::WrongFrame {
                kind: package.kind(),
                frame: "robot message",
            });
        }
    }
    Ok(RawFrame::new(RobotPackageType::ROBOT_MESSAGE, payload.freeze()))
}

/// Build a robot state frame from its sub-packages. Robot messages are
/// rejected.
pub fn robot_state_frame(packages: &[PrimaryPackage]) -> Result<RawFrame> {
    let mut payload = BytesMut::new();
    for package in packages {
        let mut body = BytesMut::new();
        let sub_type = match package {
            PrimaryPackage::KinematicsInfo(info) => {
                for value in info.checksum {
                    body.put_u32(value);
                }
                for values in [&info.dh_theta, &info.dh_a, &info.dh_d, &info.dh_alpha] {
                    for value in values {
                        body.put_f64(*value);
                    }
                }
                body.put_u32(info.calibration_status);
                KINEMATICS_INFO
            }
            PrimaryPackage::RobotStateRaw(raw) => {
                body.put_slice(&raw.payload);
                raw.sub_type
            }
            other => {
                return Err(PrimaryError::WrongFrame {
                    kind: other.kind(),
                    frame: "robot state",
                });
            }
        };
        let length = u32::try_from(body.len() + HEADER_SIZE)
            .map_err(|_| PrimaryError::FieldTooLong {
                field: "robot state sub-package",
                length: body.len(),
            })?;
        payload.put_u32(length);
        payload.put_u8(sub_type);
        payload.put_slice(&body);
    }
    Ok(RawFrame::new(RobotPackageType::ROBOT_STATE, payload.freeze()))
}

/// Serialise a frame into wire bytes, header included.
pub fn to_wire(frame: &RawFrame) -> Result<Vec<u8>> {
    let mut wire = BytesMut::with_capacity(frame.wire_size());
    encode_frame(frame.package_type, &frame.payload, &mut wire)?;
    Ok(wire.to_vec())
}

fn put_header(dst: &mut BytesMut, header: &RobotMessageHeader, message_type: u8) {
    dst.put_u64(header.timestamp);
    dst.put_i8(header.source);
    dst.put_u8(message_type);
}
