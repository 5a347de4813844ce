use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info};
use urlink_frame::FrameConfig;
use urlink_pipeline::{
    Consumer, MultiConsumer, Notifier, NullNotifier, Pipeline, PipelineConfig, PipelineState,
    Producer,
};
use urlink_transport::{ByteStream, Endpoint, StreamConfig};

use crate::consumer::{PrimaryConsumer, PrimaryDispatcher};
use crate::error::Result;
use crate::package::{ErrorCodeMessage, PrimaryPackage};
use crate::parser::PrimaryParser;
use crate::types::ReportLevel;

/// TCP port of the primary interface.
pub const PRIMARY_PORT: u16 = 30001;

/// An error code reported by the controller, as kept in the client's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCode {
    pub timestamp: u64,
    pub message_code: i32,
    pub message_argument: i32,
    pub report_level: ReportLevel,
    pub text: String,
    /// Human-readable rendering of the whole message.
    pub rendered: String,
}

impl From<&ErrorCodeMessage> for ErrorCode {
    fn from(msg: &ErrorCodeMessage) -> Self {
        Self {
            timestamp: msg.header.timestamp,
            message_code: msg.message_code,
            message_argument: msg.message_argument,
            report_level: msg.report_level,
            text: msg.text.clone(),
            rendered: msg.to_string(),
        }
    }
}

/// Configuration for a [`PrimaryClient`].
#[derive(Debug, Clone)]
pub struct PrimaryClientConfig {
    pub host: String,
    /// Default: 30001.
    pub port: u16,
    pub stream: StreamConfig,
    pub frame: FrameConfig,
    pub pipeline: PipelineConfig,
}

impl PrimaryClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: PRIMARY_PORT,
            stream: StreamConfig::default(),
            frame: FrameConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_frame(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }
}

type ErrorCodeQueue = Arc<Mutex<VecDeque<ErrorCode>>>;

/// Collects error code messages into the client's queue.
struct ErrorCodeCollector {
    queue: ErrorCodeQueue,
}

impl PrimaryConsumer for ErrorCodeCollector {
    fn consume_error_code(&self, msg: &ErrorCodeMessage) -> bool {
        debug!(
            code = msg.message_code,
            argument = msg.message_argument,
            level = %msg.report_level,
            "error code received"
        );
        lock_queue(&self.queue).push_back(ErrorCode::from(msg));
        true
    }
}

/// Client for the primary interface of a robot controller.
///
/// Owns the stream, parser and pipeline, and keeps every error code the
/// controller reports until [`PrimaryClient::drain_error_codes`] collects
/// them.
pub struct PrimaryClient {
    config: PrimaryClientConfig,
    consumers: Arc<MultiConsumer<PrimaryPackage>>,
    dispatchers: Mutex<Vec<Arc<PrimaryDispatcher>>>,
    error_codes: ErrorCodeQueue,
    pipeline: Pipeline<ByteStream, PrimaryParser>,
}

impl PrimaryClient {
    pub fn new(config: PrimaryClientConfig) -> Self {
        Self::with_notifier(config, Arc::new(NullNotifier))
    }

    pub fn with_notifier(config: PrimaryClientConfig, notifier: Arc<dyn Notifier>) -> Self {
        let error_codes: ErrorCodeQueue = Arc::new(Mutex::new(VecDeque::new()));
        let consumers: Arc<MultiConsumer<PrimaryPackage>> = Arc::new(MultiConsumer::new());
        let collector = ErrorCodeCollector {
            queue: Arc::clone(&error_codes),
        };
        consumers.add_consumer(Arc::new(PrimaryDispatcher::new(Arc::new(collector))));

        let stream = ByteStream::with_config(config.endpoint(), config.stream.clone());
        let producer = Producer::with_config(stream, PrimaryParser, config.frame.clone());
        let pipeline = Pipeline::new(
            format!("primary-{}", config.host),
            producer,
            Arc::clone(&consumers) as Arc<dyn Consumer<PrimaryPackage>>,
            notifier,
            config.pipeline.clone(),
        );

        Self {
            config,
            consumers,
            dispatchers: Mutex::new(Vec::new()),
            error_codes,
            pipeline,
        }
    }

    pub fn config(&self) -> &PrimaryClientConfig {
        &self.config
    }

    /// Connect to the controller and start dispatching.
    pub fn start(&mut self) -> Result<()> {
        self.pipeline.start()?;
        info!(endpoint = %self.config.endpoint(), "primary client started");
        Ok(())
    }

    /// Stop dispatching and close the connection. Idempotent.
    pub fn stop(&mut self) {
        self.pipeline.stop();
    }

    pub fn state(&self) -> PipelineState {
        self.pipeline.state()
    }

    /// Fails once the connection was lost for good.
    pub fn check(&self) -> Result<()> {
        Ok(self.pipeline.check()?)
    }

    /// Register a visitor for every package received from now on.
    pub fn add_primary_consumer(&self, consumer: Arc<dyn PrimaryConsumer>) {
        let dispatcher = Arc::new(PrimaryDispatcher::new(consumer));
        self.consumers
            .add_consumer(Arc::clone(&dispatcher) as Arc<dyn Consumer<PrimaryPackage>>);
        self.lock_dispatchers().push(dispatcher);
    }

    /// Unregister a visitor. Returns whether it was registered.
    pub fn remove_primary_consumer(&self, consumer: &Arc<dyn PrimaryConsumer>) -> bool {
        let mut dispatchers = self.lock_dispatchers();
        let Some(index) = dispatchers.iter().position(|d| d.wraps(consumer)) else {
            return false;
        };
        let dispatcher: Arc<dyn Consumer<PrimaryPackage>> = dispatchers.remove(index);
        self.consumers.remove_consumer(&dispatcher)
    }

    /// Register a plain consumer that sees every package as a whole.
    pub fn add_consumer(&self, consumer: Arc<dyn Consumer<PrimaryPackage>>) {
        self.consumers.add_consumer(consumer);
    }

    pub fn remove_consumer(&self, consumer: &Arc<dyn Consumer<PrimaryPackage>>) -> bool {
        self.consumers.remove_consumer(consumer)
    }

    /// Take every queued error code, oldest first.
    pub fn drain_error_codes(&self) -> Vec<ErrorCode> {
        lock_queue(&self.error_codes).drain(..).collect()
    }

    fn lock_dispatchers(&self) -> MutexGuard<'_, Vec<Arc<PrimaryDispatcher>>> {
        self.dispatchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn lock_queue(queue: &ErrorCodeQueue) -> MutexGuard<'_, VecDeque<ErrorCode>> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;
    use std::time::{Duration, Instant};

    use urlink_frame::RawFrame;
    use urlink_pipeline::ReconnectPolicy;

    use super::*;
    use crate::encode;
    use crate::package::{RobotMessageHeader, RuntimeExceptionMessage, VersionMessage};

    const HEADER: RobotMessageHeader = RobotMessageHeader {
        timestamp: 7,
        source: -2,
    };

    fn error_code(code: i32) -> PrimaryPackage {
        PrimaryPackage::ErrorCode(ErrorCodeMessage {
            header: HEADER,
            message_code: code,
            message_argument: 0,
            report_level: ReportLevel::Violation,
            data_type: 0,
            data: 0,
            text: format!("error {code}"),
        })
    }

    fn wire(packages: &[PrimaryPackage]) -> Vec<u8> {
        packages
            .iter()
            .flat_map(|pkg| {
                let frame = encode::robot_message_frame(pkg).unwrap();
                encode::to_wire(&frame).unwrap()
            })
            .collect()
    }

    /// Serve `bytes` to the first connection, then hold it open until `hold`.
    fn controller(bytes: Vec<u8>, hold: Duration) -> (u16, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(&bytes).unwrap();
            thread::sleep(hold);
        });
        (port, handle)
    }

    fn client(port: u16) -> PrimaryClient {
        let config = PrimaryClientConfig::new("127.0.0.1")
            .with_port(port)
            .with_pipeline(
                PipelineConfig::default()
                    .with_poll_interval(Duration::from_millis(10))
                    .with_reconnect(ReconnectPolicy {
                        max_attempts: 1,
                        initial_backoff: Duration::from_millis(1),
                        max_backoff: Duration::from_millis(1),
                    }),
            );
        PrimaryClient::new(config)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[derive(Default)]
    struct Versions {
        seen: Mutex<Vec<VersionMessage>>,
    }

    impl PrimaryConsumer for Versions {
        fn consume_version(&self, msg: &VersionMessage) -> bool {
            self.seen.lock().unwrap().push(msg.clone());
            true
        }
    }

    #[test]
    fn default_port_is_primary() {
        let config = PrimaryClientConfig::new("robot");
        assert_eq!(config.port, 30001);
        assert_eq!(config.endpoint().to_string(), "robot:30001");
    }

    #[test]
    fn version_message_reaches_primary_consumer() {
        let version = VersionMessage {
            header: HEADER,
            project_name: "URControl".into(),
            major_version: 5,
            minor_version: 15,
            svn_revision: 0,
            build_number: 120_000,
            build_date: "01-02-2024, 08:00:00".into(),
        };
        let (port, server) = controller(
            wire(&[PrimaryPackage::Version(version.clone())]),
            Duration::from_millis(300),
        );

        let mut client = client(port);
        let versions = Arc::new(Versions::default());
        client.add_primary_consumer(versions.clone());
        client.start().unwrap();
        wait_for(|| !versions.seen.lock().unwrap().is_empty());
        client.stop();
        server.join().unwrap();

        assert_eq!(*versions.seen.lock().unwrap(), vec![version]);
    }

    #[test]
    fn error_codes_drain_in_wire_order() {
        let runtime = PrimaryPackage::RuntimeException(RuntimeExceptionMessage {
            header: HEADER,
            line_number: 1,
            column_number: 1,
            text: "not an error code".into(),
        });
        let (port, server) = controller(
            wire(&[error_code(1), runtime, error_code(2), error_code(3)]),
            Duration::from_millis(300),
        );

        let mut client = client(port);
        client.start().unwrap();
        let mut drained = Vec::new();
        wait_for(|| {
            drained.extend(client.drain_error_codes());
            drained.len() >= 3
        });
        client.stop();
        server.join().unwrap();

        let codes: Vec<i32> = drained.iter().map(|code| code.message_code).collect();
        assert_eq!(codes, vec![1, 2, 3]);
        assert_eq!(drained[0].rendered, "C1A0 (VIOLATION): error 1");
        assert!(client.drain_error_codes().is_empty());
    }

    #[test]
    fn primary_consumer_registration() {
        let client = client(1);
        let versions: Arc<dyn PrimaryConsumer> = Arc::new(Versions::default());
        let other: Arc<dyn PrimaryConsumer> = Arc::new(Versions::default());
        client.add_primary_consumer(Arc::clone(&versions));

        assert!(!client.remove_primary_consumer(&other));
        assert!(client.remove_primary_consumer(&versions));
        assert!(!client.remove_primary_consumer(&versions));
    }

    #[test]
    fn truncated_frame_is_dropped_and_stream_continues() {
        let full = encode::robot_message_frame(&error_code(9)).unwrap();
        let short = RawFrame::new(full.package_type, full.payload.slice(..12));
        let mut bytes = encode::to_wire(&short).unwrap();
        bytes.extend(wire(&[error_code(10)]));
        let (port, server) = controller(bytes, Duration::from_millis(300));

        let mut client = client(port);
        client.start().unwrap();
        let mut drained = Vec::new();
        wait_for(|| {
            drained.extend(client.drain_error_codes());
            !drained.is_empty()
        });
        client.stop();
        server.join().unwrap();

        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].message_code, 10);
    }

    #[test]
    fn start_fails_without_controller() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut client = client(port);
        assert!(client.start().is_err());
        assert_eq!(client.state(), PipelineState::Idle);
    }
}
