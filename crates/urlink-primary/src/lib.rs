//! Primary interface of UR robot controllers.
//!
//! The controller streams two kinds of frames on port 30001: robot state
//! (a batch of sub-packages) and robot messages (text, version, error
//! codes, runtime exceptions, ...). [`PrimaryParser`] decodes them into
//! [`PrimaryPackage`]s, [`PrimaryConsumer`] visits them by concrete type and
//! [`PrimaryClient`] wires everything to a live connection.
//!
//! ```no_run
//! use std::sync::Arc;
//! use urlink_primary::{PrimaryClient, PrimaryClientConfig, PrimaryConsumer, VersionMessage};
//!
//! struct PrintVersion;
//!
//! impl PrimaryConsumer for PrintVersion {
//!     fn consume_version(&self, msg: &VersionMessage) -> bool {
//!         println!("{msg}");
//!         true
//!     }
//! }
//!
//! let mut client = PrimaryClient::new(PrimaryClientConfig::new("192.168.56.101"));
//! client.add_primary_consumer(Arc::new(PrintVersion));
//! client.start()?;
//! # Ok::<(), urlink_primary::PrimaryError>(())
//! ```

pub mod client;
pub mod consumer;
pub mod encode;
pub mod error;
pub mod package;
pub mod parser;
pub mod types;

pub use client::{ErrorCode, PrimaryClient, PrimaryClientConfig, PRIMARY_PORT};
pub use consumer::{PrimaryConsumer, PrimaryDispatcher};
pub use error::{PrimaryError, Result};
pub use package::{
    ErrorCodeMessage, KeyMessage, KinematicsInfo, PrimaryPackage, RobotMessageHeader,
    RobotStateRaw, RuntimeExceptionMessage, TextMessage, UnknownRobotMessage, VersionMessage,
};
pub use parser::PrimaryParser;
pub use types::{ReportLevel, RobotMessageType, RobotPackageType};
