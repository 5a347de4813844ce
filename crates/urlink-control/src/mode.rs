use std::fmt;

use serde::Serialize;

/// Control mode word sent as the last field of every command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    Stopped,
    Uninitialized,
    Idle,
    ServoJ,
    SpeedJ,
    Forward,
    SpeedL,
    Pose,
    Freedrive,
    ToolInContact,
}

impl ControlMode {
    /// Wire value of this mode.
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Stopped => -2,
            Self::Uninitialized => -1,
            Self::Idle => 0,
            Self::ServoJ => 1,
            Self::SpeedJ => 2,
            Self::Forward => 3,
            Self::SpeedL => 4,
            Self::Pose => 5,
            Self::Freedrive => 6,
            Self::ToolInContact => 7,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            -2 => Some(Self::Stopped),
            -1 => Some(Self::Uninitialized),
            0 => Some(Self::Idle),
            1 => Some(Self::ServoJ),
            2 => Some(Self::SpeedJ),
            3 => Some(Self::Forward),
            4 => Some(Self::SpeedL),
            5 => Some(Self::Pose),
            6 => Some(Self::Freedrive),
            7 => Some(Self::ToolInContact),
            _ => None,
        }
    }

    /// Modes streaming setpoints every control cycle. They must run with a
    /// receive timeout so the robot stops when commands go stale.
    pub fn is_realtime(self) -> bool {
        matches!(self, Self::ServoJ | Self::SpeedJ | Self::SpeedL | Self::Pose)
    }

    /// Modes that may run with the receive timeout disabled.
    pub fn is_non_realtime(self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Forward | Self::Freedrive | Self::ToolInContact | Self::Stopped
        )
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "STOPPED",
            Self::Uninitialized => "UNINITIALIZED",
            Self::Idle => "IDLE",
            Self::ServoJ => "SERVOJ",
            Self::SpeedJ => "SPEEDJ",
            Self::Forward => "FORWARD",
            Self::SpeedL => "SPEEDL",
            Self::Pose => "POSE",
            Self::Freedrive => "FREEDRIVE",
            Self::ToolInContact => "TOOL_IN_CONTACT",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ControlMode; 10] = [
        ControlMode::Stopped,
        ControlMode::Uninitialized,
        ControlMode::Idle,
        ControlMode::ServoJ,
        ControlMode::SpeedJ,
        ControlMode::Forward,
        ControlMode::SpeedL,
        ControlMode::Pose,
        ControlMode::Freedrive,
        ControlMode::ToolInContact,
    ];

    #[test]
    fn wire_values() {
        for mode in ALL {
            assert_eq!(ControlMode::from_i32(mode.as_i32()), Some(mode));
        }
        assert_eq!(ControlMode::ServoJ.as_i32(), 1);
        assert_eq!(ControlMode::Stopped.as_i32(), -2);
        assert_eq!(ControlMode::from_i32(8), None);
    }

    #[test]
    fn every_mode_but_uninitialized_has_exactly_one_class() {
        for mode in ALL {
            let classes = [mode.is_realtime(), mode.is_non_realtime()];
            let expected = usize::from(mode != ControlMode::Uninitialized);
            assert_eq!(classes.iter().filter(|c| **c).count(), expected, "{mode}");
        }
    }
}
