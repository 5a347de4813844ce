//! Reverse command interface of UR robot controllers.
//!
//! The robot program connects back to [`COMMAND_PORT`] and executes the
//! commands it reads there. Every command frame carries a receive timeout:
//! if no new frame arrives within it, the robot stops. [`CommandWriter`]
//! enforces the rules around that timeout before a frame is written:
//!
//! - realtime modes (servoj, speedj, speedl, pose) must set one
//! - non-realtime modes may switch it off
//! - a timeout shorter than one control step is raised to the step time
//!
//! Enforcing the deadline itself is the controller's job.

pub mod command;
pub mod error;
pub mod listener;
pub mod mode;
pub mod timeout;
pub mod writer;

pub use command::{
    decode_words, ControlCommand, FreedriveAction, TrajectoryAction, COMMAND_FRAME_SIZE,
    COMMAND_WORDS, MULT_JOINTSTATE,
};
pub use error::{ControlError, Result};
pub use listener::{CommandListener, COMMAND_PORT};
pub use mode::ControlMode;
pub use timeout::{ReceiveTimeout, StepTime};
pub use writer::CommandWriter;
