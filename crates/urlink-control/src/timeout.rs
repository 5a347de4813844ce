use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::error::{ControlError, Result};
use crate::mode::ControlMode;

/// How long the robot keeps executing a command without hearing a new one.
///
/// Past this deadline the robot stops on its own. Realtime modes must set
/// one; non-realtime modes may run with it [`Off`](ReceiveTimeout::Off).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveTimeout {
    Millis(u32),
    Off,
}

impl ReceiveTimeout {
    pub fn millis(ms: u32) -> Self {
        Self::Millis(ms)
    }

    pub fn off() -> Self {
        Self::Off
    }

    /// Sub-millisecond remainders are truncated.
    pub fn from_duration(duration: Duration) -> Self {
        Self::Millis(u32::try_from(duration.as_millis()).unwrap_or(u32::MAX))
    }

    /// Whether no deadline is enforced. A zero deadline counts as off.
    pub fn is_off(self) -> bool {
        matches!(self, Self::Off | Self::Millis(0))
    }

    /// Validate against `mode` and produce the word sent on the wire.
    ///
    /// Realtime modes reject a disabled timeout. Deadlines shorter than one
    /// control step are raised to the step time.
    pub fn resolve(self, mode: ControlMode, step_time: StepTime) -> Result<i32> {
        if !mode.is_realtime() && !mode.is_non_realtime() {
            return Err(ControlError::UnknownControlMode(mode));
        }
        let ms = match self {
            Self::Millis(ms) if ms > 0 => ms,
            _ if mode.is_realtime() => return Err(ControlError::InvalidTimeout { mode }),
            _ => return Ok(0),
        };

        let step_ms = step_time.as_millis();
        let ms = if ms < step_ms {
            warn!(
                requested_ms = ms,
                step_ms,
                %mode,
                "receive timeout below control step time, using step time"
            );
            step_ms
        } else {
            ms
        };
        Ok(i32::try_from(ms).unwrap_or(i32::MAX))
    }
}

impl fmt::Display for ReceiveTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millis(ms) => write!(f, "{ms}ms"),
            Self::Off => f.write_str("off"),
        }
    }
}

/// Duration of one control cycle of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepTime(Duration);

impl StepTime {
    /// CB3 controllers run at 125 Hz.
    pub const CB3: Self = Self(Duration::from_millis(8));
    /// e-Series controllers run at 500 Hz.
    pub const E_SERIES: Self = Self(Duration::from_millis(2));

    pub fn new(step: Duration) -> Self {
        Self(step)
    }

    pub fn duration(self) -> Duration {
        self.0
    }

    /// Step time in whole milliseconds, rounded up.
    pub fn as_millis(self) -> u32 {
        let ms = self.0.as_micros().div_ceil(1000);
        u32::try_from(ms).unwrap_or(u32::MAX)
    }
}

impl Default for StepTime {
    fn default() -> Self {
        Self::CB3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REALTIME: [ControlMode; 4] = [
        ControlMode::ServoJ,
        ControlMode::SpeedJ,
        ControlMode::SpeedL,
        ControlMode::Pose,
    ];

    const NON_REALTIME: [ControlMode; 5] = [
        ControlMode::Idle,
        ControlMode::Forward,
        ControlMode::Freedrive,
        ControlMode::ToolInContact,
        ControlMode::Stopped,
    ];

    #[test]
    fn realtime_modes_reject_disabled_timeout() {
        for mode in REALTIME {
            for timeout in [ReceiveTimeout::Off, ReceiveTimeout::Millis(0)] {
                assert!(matches!(
                    timeout.resolve(mode, StepTime::default()),
                    Err(ControlError::InvalidTimeout { mode: m }) if m == mode
                ));
            }
        }
    }

    #[test]
    fn non_realtime_modes_accept_disabled_timeout() {
        for mode in NON_REALTIME {
            assert_eq!(ReceiveTimeout::off().resolve(mode, StepTime::default()).unwrap(), 0);
        }
    }

    #[test]
    fn uninitialized_mode_is_rejected() {
        assert!(matches!(
            ReceiveTimeout::millis(100).resolve(ControlMode::Uninitialized, StepTime::default()),
            Err(ControlError::UnknownControlMode(ControlMode::Uninitialized))
        ));
    }

    #[test]
    fn short_deadline_is_clamped_to_step_time() {
        let resolved = ReceiveTimeout::millis(3).resolve(ControlMode::ServoJ, StepTime::CB3);
        assert_eq!(resolved.unwrap(), 8);

        let resolved = ReceiveTimeout::millis(3).resolve(ControlMode::Forward, StepTime::E_SERIES);
        assert_eq!(resolved.unwrap(), 3);

        let resolved = ReceiveTimeout::millis(1).resolve(ControlMode::SpeedJ, StepTime::E_SERIES);
        assert_eq!(resolved.unwrap(), 2);
    }

    #[test]
    fn long_deadline_is_kept() {
        let resolved = ReceiveTimeout::millis(200).resolve(ControlMode::Pose, StepTime::default());
        assert_eq!(resolved.unwrap(), 200);

        let huge = ReceiveTimeout::millis(u32::MAX).resolve(ControlMode::Idle, StepTime::default());
        assert_eq!(huge.unwrap(), i32::MAX);
    }

    #[test]
    fn step_time_rounds_up() {
        assert_eq!(StepTime::new(Duration::from_micros(2500)).as_millis(), 3);
        assert_eq!(StepTime::CB3.as_millis(), 8);
        assert_eq!(StepTime::default(), StepTime::CB3);
    }

    #[test]
    fn from_duration() {
        assert_eq!(
            ReceiveTimeout::from_duration(Duration::from_millis(1500)),
            ReceiveTimeout::Millis(1500)
        );
        assert!(ReceiveTimeout::from_duration(Duration::from_micros(500)).is_off());
        assert_eq!(ReceiveTimeout::millis(20).to_string(), "20ms");
    }
}
