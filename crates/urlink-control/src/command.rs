use bytes::{BufMut, BytesMut};
use serde::Serialize;

use crate::mode::ControlMode;

/// Number of `i32` words in a command frame.
pub const COMMAND_WORDS: usize = 8;

/// Size of one command frame on the wire.
pub const COMMAND_FRAME_SIZE: usize = COMMAND_WORDS * 4;

/// Fixed-point scale for joint values.
pub const MULT_JOINTSTATE: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FreedriveAction {
    Stop,
    Noop,
    Start,
}

impl FreedriveAction {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Stop => -1,
            Self::Noop => 0,
            Self::Start => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrajectoryAction {
    Cancel,
    Noop,
    Start,
}

impl TrajectoryAction {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Cancel => -1,
            Self::Noop => 0,
            Self::Start => 1,
        }
    }
}

/// One message on the reverse command interface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Six joint (or Cartesian) values in any commandable mode.
    Joint { values: [f64; 6], mode: ControlMode },
    /// Keep the connection alive without commanding motion.
    Keepalive,
    Freedrive { action: FreedriveAction },
    /// Control a trajectory forwarded point by point.
    Trajectory {
        action: TrajectoryAction,
        point_number: i32,
    },
    /// Make the robot leave external control.
    Stop,
}

impl ControlCommand {
    pub fn mode(&self) -> ControlMode {
        match self {
            Self::Joint { mode, .. } => *mode,
            Self::Keepalive => ControlMode::Idle,
            Self::Freedrive { .. } => ControlMode::Freedrive,
            Self::Trajectory { .. } => ControlMode::Forward,
            Self::Stop => ControlMode::Stopped,
        }
    }

    /// The six value words of the frame.
    pub fn values(&self) -> [i32; 6] {
        let mut words = [0i32; 6];
        match self {
            Self::Joint { values, .. } => {
                for (word, value) in words.iter_mut().zip(values) {
                    *word = scale(*value);
                }
            }
            Self::Freedrive { action } => words[0] = action.as_i32(),
            Self::Trajectory {
                action,
                point_number,
            } => {
                words[0] = action.as_i32();
                words[1] = *point_number;
            }
            Self::Keepalive | Self::Stop => {}
        }
        words
    }

    /// Encode as `[timeout, v0..v5, mode]`, every word a big-endian `i32`.
    ///
    /// `timeout_ms` must already be resolved for this command's mode.
    pub fn encode(&self, timeout_ms: i32, dst: &mut BytesMut) {
        let values = self.values();
        dst.reserve(COMMAND_FRAME_SIZE);
        dst.put_i32(timeout_ms);
        for value in values {
            dst.put_i32(value);
        }
        dst.put_i32(self.mode().as_i32());
    }
}

fn scale(value: f64) -> i32 {
    // `as` saturates out-of-range floats and maps NaN to zero.
    (value * MULT_JOINTSTATE).round() as i32
}

/// Decode a command frame back into its words.
pub fn decode_words(frame: &[u8; COMMAND_FRAME_SIZE]) -> [i32; COMMAND_WORDS] {
    let mut words = [0i32; COMMAND_WORDS];
    for (word, chunk) in words.iter_mut().zip(frame.chunks_exact(4)) {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(chunk);
        *word = i32::from_be_bytes(raw);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(command: &ControlCommand, timeout_ms: i32) -> [i32; COMMAND_WORDS] {
        let mut buf = BytesMut::new();
        command.encode(timeout_ms, &mut buf);
        let frame: [u8; COMMAND_FRAME_SIZE] = buf.as_ref().try_into().unwrap();
        decode_words(&frame)
    }

    #[test]
    fn joint_values_are_fixed_point() {
        let command = ControlCommand::Joint {
            values: [0.1, -1.5707963, 0.0, 2.0, -0.0000004, 3.14159265],
            mode: ControlMode::ServoJ,
        };
        assert_eq!(
            words(&command, 20),
            [20, 100_000, -1_570_796, 0, 2_000_000, 0, 3_141_593, 1]
        );
    }

    #[test]
    fn keepalive_is_all_zero_idle() {
        assert_eq!(words(&ControlCommand::Keepalive, 1000), [1000, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn freedrive_action_in_first_word() {
        let start = ControlCommand::Freedrive {
            action: FreedriveAction::Start,
        };
        let stop = ControlCommand::Freedrive {
            action: FreedriveAction::Stop,
        };
        assert_eq!(words(&start, 200), [200, 1, 0, 0, 0, 0, 0, 6]);
        assert_eq!(words(&stop, 0), [0, -1, 0, 0, 0, 0, 0, 6]);
    }

    #[test]
    fn trajectory_action_and_point_number() {
        let command = ControlCommand::Trajectory {
            action: TrajectoryAction::Start,
            point_number: 42,
        };
        assert_eq!(words(&command, 200), [200, 1, 42, 0, 0, 0, 0, 3]);
        let cancel = ControlCommand::Trajectory {
            action: TrajectoryAction::Cancel,
            point_number: 0,
        };
        assert_eq!(words(&cancel, 0)[1], -1);
    }

    #[test]
    fn stop_uses_stopped_mode() {
        assert_eq!(words(&ControlCommand::Stop, 0), [0, 0, 0, 0, 0, 0, 0, -2]);
    }

    #[test]
    fn joint_values_in_discrete_modes() {
        let forward = ControlCommand::Joint {
            values: [0.25, 0.0, 0.0, 0.0, 0.0, -0.25],
            mode: ControlMode::Forward,
        };
        assert_eq!(words(&forward, 200), [200, 250_000, 0, 0, 0, 0, -250_000, 3]);

        let idle = ControlCommand::Joint {
            values: [0.0; 6],
            mode: ControlMode::Idle,
        };
        assert_eq!(words(&idle, 0), [0; COMMAND_WORDS]);
    }

    #[test]
    fn out_of_range_values_saturate() {
        assert_eq!(scale(1e9), i32::MAX);
        assert_eq!(scale(-1e9), i32::MIN);
        assert_eq!(scale(f64::NAN), 0);
    }
}
