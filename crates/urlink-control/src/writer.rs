use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::command::{
    decode_words, ControlCommand, FreedriveAction, TrajectoryAction, COMMAND_FRAME_SIZE,
    COMMAND_WORDS,
};
use crate::error::{ControlError, Result};
use crate::mode::ControlMode;
use crate::timeout::{ReceiveTimeout, StepTime};

/// Writes command frames to the robot's reverse connection.
///
/// Every write carries a [`ReceiveTimeout`]. It is validated against the
/// command's mode before anything is encoded, so a rejected command never
/// reaches the wire.
pub struct CommandWriter<W> {
    inner: W,
    step_time: StepTime,
    buf: BytesMut,
}

impl<W: Write> CommandWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_step_time(inner, StepTime::default())
    }

    pub fn with_step_time(inner: W, step_time: StepTime) -> Self {
        Self {
            inner,
            step_time,
            buf: BytesMut::with_capacity(COMMAND_FRAME_SIZE),
        }
    }

    pub fn step_time(&self) -> StepTime {
        self.step_time
    }

    pub fn set_step_time(&mut self, step_time: StepTime) {
        self.step_time = step_time;
    }

    /// Validate, encode and send one command.
    pub fn write(&mut self, command: &ControlCommand, timeout: ReceiveTimeout) -> Result<()> {
        let mode = command.mode();
        let timeout_ms = timeout.resolve(mode, self.step_time)?;

        self.buf.clear();
        command.encode(timeout_ms, &mut self.buf);
        trace!(%mode, timeout_ms, "writing command");

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(ControlError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ControlError::Io(err)),
            }
        }
        self.flush()
    }

    /// Send six joint values in `mode`.
    pub fn write_joint_command(
        &mut self,
        values: [f64; 6],
        mode: ControlMode,
        timeout: ReceiveTimeout,
    ) -> Result<()> {
        self.write(&ControlCommand::Joint { values, mode }, timeout)
    }

    pub fn write_keepalive(&mut self, timeout: ReceiveTimeout) -> Result<()> {
        self.write(&ControlCommand::Keepalive, timeout)
    }

    pub fn write_freedrive(
        &mut self,
        action: FreedriveAction,
        timeout: ReceiveTimeout,
    ) -> Result<()> {
        self.write(&ControlCommand::Freedrive { action }, timeout)
    }

    pub fn write_trajectory_control(
        &mut self,
        action: TrajectoryAction,
        point_number: i32,
        timeout: ReceiveTimeout,
    ) -> Result<()> {
        self.write(
            &ControlCommand::Trajectory {
                action,
                point_number,
            },
            timeout,
        )
    }

    /// Tell the robot to leave external control.
    pub fn stop_control(&mut self) -> Result<()> {
        self.write(&ControlCommand::Stop, ReceiveTimeout::Off)
    }

    /// Words of the most recently encoded frame.
    pub fn last_frame(&self) -> Option<[i32; COMMAND_WORDS]> {
        let frame: &[u8; COMMAND_FRAME_SIZE] = self.buf.as_ref().try_into().ok()?;
        Some(decode_words(frame))
    }

    fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ControlError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(bytes: &[u8]) -> Vec<[i32; COMMAND_WORDS]> {
        bytes
            .chunks_exact(COMMAND_FRAME_SIZE)
            .map(|chunk| decode_words(chunk.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn realtime_without_timeout_writes_nothing() {
        let mut writer = CommandWriter::new(Vec::new());
        for mode in [
            ControlMode::ServoJ,
            ControlMode::SpeedJ,
            ControlMode::SpeedL,
            ControlMode::Pose,
        ] {
            let err = writer
                .write_joint_command([0.0; 6], mode, ReceiveTimeout::off())
                .unwrap_err();
            assert!(matches!(err, ControlError::InvalidTimeout { mode: m } if m == mode));
        }
        assert!(writer.get_ref().is_empty());
    }

    #[test]
    fn discrete_joint_command_without_timeout_is_written() {
        let mut writer = CommandWriter::new(Vec::new());
        writer
            .write_joint_command([0.0; 6], ControlMode::Idle, ReceiveTimeout::off())
            .unwrap();
        writer
            .write_joint_command([0.0; 6], ControlMode::Forward, ReceiveTimeout::off())
            .unwrap();
        writer
            .write_joint_command([0.5; 6], ControlMode::Forward, ReceiveTimeout::millis(200))
            .unwrap();

        let written = frames(writer.get_ref());
        assert_eq!(written.len(), 3);
        assert_eq!(written[0], [0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(written[1], [0, 0, 0, 0, 0, 0, 0, 3]);
        assert_eq!(
            written[2],
            [200, 500_000, 500_000, 500_000, 500_000, 500_000, 500_000, 3]
        );
    }

    #[test]
    fn non_realtime_without_timeout_is_written() {
        let mut writer = CommandWriter::new(Vec::new());
        writer.write_keepalive(ReceiveTimeout::off()).unwrap();
        writer
            .write_freedrive(FreedriveAction::Start, ReceiveTimeout::off())
            .unwrap();
        writer
            .write_trajectory_control(TrajectoryAction::Noop, 0, ReceiveTimeout::off())
            .unwrap();
        writer.stop_control().unwrap();

        let written = frames(writer.get_ref());
        assert_eq!(written.len(), 4);
        assert_eq!(written[0], [0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(written[1], [0, 1, 0, 0, 0, 0, 0, 6]);
        assert_eq!(written[2], [0, 0, 0, 0, 0, 0, 0, 3]);
        assert_eq!(written[3], [0, 0, 0, 0, 0, 0, 0, -2]);
    }

    #[test]
    fn deadline_below_step_time_is_clamped_on_the_wire() {
        let mut writer = CommandWriter::with_step_time(Vec::new(), StepTime::E_SERIES);
        writer
            .write_joint_command([1.0; 6], ControlMode::SpeedJ, ReceiveTimeout::millis(1))
            .unwrap();
        writer.set_step_time(StepTime::CB3);
        writer
            .write_joint_command([1.0; 6], ControlMode::ServoJ, ReceiveTimeout::millis(4))
            .unwrap();

        let written = frames(writer.get_ref());
        assert_eq!(written[0][0], 2);
        assert_eq!(written[0][7], ControlMode::SpeedJ.as_i32());
        assert_eq!(written[1][0], 8);
        assert_eq!(written[1][1], 1_000_000);
        assert_eq!(writer.last_frame(), Some(written[1]));
    }

    #[test]
    fn uninitialized_mode_is_never_written() {
        let mut writer = CommandWriter::new(Vec::new());
        let err = writer
            .write_joint_command([0.0; 6], ControlMode::Uninitialized, ReceiveTimeout::millis(10))
            .unwrap_err();
        assert!(matches!(err, ControlError::UnknownControlMode(_)));
        assert!(writer.get_ref().is_empty());
        assert_eq!(writer.last_frame(), None);
    }

    #[test]
    fn closed_connection_is_reported() {
        struct Closed;

        impl Write for Closed {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut writer = CommandWriter::new(Closed);
        assert!(matches!(
            writer.write_keepalive(ReceiveTimeout::millis(100)),
            Err(ControlError::ConnectionClosed)
        ));
    }

    #[test]
    fn partial_writes_are_completed() {
        struct Trickle(Vec<u8>);

        impl Write for Trickle {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                let n = buf.len().min(3);
                self.0.extend_from_slice(&buf[..n]);
                Ok(n)
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut writer = CommandWriter::new(Trickle(Vec::new()));
        writer.write_keepalive(ReceiveTimeout::millis(500)).unwrap();
        assert_eq!(frames(&writer.get_ref().0), vec![[500, 0, 0, 0, 0, 0, 0, 0]]);
    }
}
