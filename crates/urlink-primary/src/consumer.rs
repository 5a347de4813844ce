use std::sync::Arc;

use tracing::debug;
use urlink_pipeline::Consumer;

use crate::package::{
    ErrorCodeMessage, KeyMessage, KinematicsInfo, PrimaryPackage, RobotStateRaw,
    RuntimeExceptionMessage, TextMessage, UnknownRobotMessage, VersionMessage,
};

/// Visitor over [`PrimaryPackage`] variants.
///
/// Every handler defaults to accepting the package and doing nothing, so an
/// implementation overrides only the variants it cares about.
pub trait PrimaryConsumer: Send + Sync {
    fn consume_text(&self, _msg: &TextMessage) -> bool {
        true
    }

    fn consume_version(&self, _msg: &VersionMessage) -> bool {
        true
    }

    fn consume_error_code(&self, _msg: &ErrorCodeMessage) -> bool {
        true
    }

    fn consume_key(&self, _msg: &KeyMessage) -> bool {
        true
    }

    fn consume_runtime_exception(&self, _msg: &RuntimeExceptionMessage) -> bool {
        true
    }

    fn consume_unknown_robot_message(&self, _msg: &UnknownRobotMessage) -> bool {
        true
    }

    fn consume_kinematics_info(&self, _info: &KinematicsInfo) -> bool {
        true
    }

    fn consume_robot_state_raw(&self, _raw: &RobotStateRaw) -> bool {
        true
    }

    /// A frame of a type the primary parser does not know was skipped.
    fn on_unknown_package(&self, _package_type: u8, _length: usize) {}
}

/// Plugs a [`PrimaryConsumer`] into a pipeline as a plain consumer.
pub struct PrimaryDispatcher {
    inner: Arc<dyn PrimaryConsumer>,
}

impl PrimaryDispatcher {
    pub fn new(inner: Arc<dyn PrimaryConsumer>) -> Self {
        Self { inner }
    }

    /// Whether this dispatcher wraps exactly `consumer`.
    pub fn wraps(&self, consumer: &Arc<dyn PrimaryConsumer>) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.inner) as *const (),
            Arc::as_ptr(consumer) as *const (),
        )
    }
}

impl Consumer<PrimaryPackage> for PrimaryDispatcher {
    fn on_unknown(&self, package_type: u8, length: usize) {
        self.inner.on_unknown_package(package_type, length);
    }

    fn consume(&self, package: &PrimaryPackage) -> bool {
        let accepted = package.accept(self.inner.as_ref());
        if !accepted {
            debug!(kind = package.kind(), "primary consumer rejected package");
        }
        accepted
    }
}
