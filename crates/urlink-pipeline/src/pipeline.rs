use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use urlink_transport::{StreamInterrupter, Transport};

use crate::consumer::Consumer;
use crate::error::{PipelineError, Result};
use crate::notifier::Notifier;
use crate::parser::{Event, Parser};
use crate::producer::Producer;

/// Default ingestion queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default interval at which blocked threads re-check for a stop request.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bounded exponential backoff for reconnecting a lost stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts before the pipeline goes down. Zero never reconnects.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ReconnectPolicy {
    /// Delay before the given attempt, counting from 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Configuration for a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Items buffered between the producer and dispatch threads. Default: 100.
    pub queue_capacity: usize,
    pub reconnect: ReconnectPolicy,
    /// Read timeout on the stream and wait granularity of the dispatch
    /// thread. Default: 100ms.
    pub poll_interval: Duration,
}

impl PipelineConfig {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            reconnect: ReconnectPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Externally visible lifecycle of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    /// The stream was lost and the reconnect policy is being applied.
    Reconnecting,
    /// Reconnect attempts were exhausted. Threads have exited.
    Down,
    Stopped,
}

struct Shared {
    running: AtomicBool,
    state: Mutex<PipelineState>,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn state(&self) -> PipelineState {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: PipelineState) {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }
}

/// Runs a [`Producer`] and dispatches what it yields.
///
/// Two threads per pipeline: the producer thread reads and decodes frames
/// and pushes them onto a bounded queue; the dispatch thread pops them in
/// order and offers each to the consumer. A slow consumer never blocks the
/// read loop: when the queue is full the newest item is dropped and logged.
pub struct Pipeline<S, P: Parser> {
    name: String,
    consumer: Arc<dyn Consumer<P::Package>>,
    notifier: Arc<dyn Notifier>,
    config: PipelineConfig,
    producer: Option<Producer<S, P>>,
    shared: Arc<Shared>,
    interrupter: Option<StreamInterrupter>,
    producer_thread: Option<JoinHandle<Producer<S, P>>>,
    dispatch_thread: Option<JoinHandle<()>>,
}

impl<S, P> Pipeline<S, P>
where
    S: Transport + 'static,
    P: Parser,
{
    pub fn new(
        name: impl Into<String>,
        producer: Producer<S, P>,
        consumer: Arc<dyn Consumer<P::Package>>,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            name: name.into(),
            consumer,
            notifier,
            config,
            producer: Some(producer),
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                state: Mutex::new(PipelineState::Idle),
            }),
            interrupter: None,
            producer_thread: None,
            dispatch_thread: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    /// Whether the pipeline threads are up.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Fails with [`PipelineError::Down`] once reconnect attempts ran out.
    pub fn check(&self) -> Result<()> {
        match self.shared.state() {
            PipelineState::Down => Err(PipelineError::Down {
                attempts: self.config.reconnect.max_attempts,
            }),
            _ => Ok(()),
        }
    }

    /// Borrow the producer while the pipeline is not running.
    pub fn producer(&self) -> Option<&Producer<S, P>> {
        self.producer.as_ref()
    }

    /// Connect and spawn the producer and dispatch threads.
    ///
    /// Returns once both threads are running; a failed initial connect is
    /// reported here rather than through the reconnect policy. Calling
    /// `start` on a running pipeline is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.producer_thread.is_some() {
            if self.shared.is_running() {
                return Ok(());
            }
            // Went down on its own; collect the threads before restarting.
            self.join_threads();
        }

        let mut producer = self
            .producer
            .take()
            .ok_or(PipelineError::ThreadPanic("producer"))?;
        let prepared = producer
            .set_read_timeout(Some(self.config.poll_interval))
            .and_then(|()| producer.start());
        if let Err(err) = prepared {
            self.producer = Some(producer);
            return Err(err);
        }

        self.interrupter = producer.interrupter();
        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.set_state(PipelineState::Running);

        let (tx, rx) = mpsc::sync_channel(self.config.queue_capacity.max(1));

        let dispatch = DispatchLoop {
            name: self.name.clone(),
            consumer: Arc::clone(&self.consumer),
            shared: Arc::clone(&self.shared),
            poll_interval: self.config.poll_interval,
        };
        let spawned = thread::Builder::new()
            .name(format!("{}-dispatch", self.name))
            .spawn(move || dispatch.run(rx));
        let dispatch_thread = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                self.abort_start(producer);
                return Err(PipelineError::Spawn("dispatch", err));
            }
        };
        self.dispatch_thread = Some(dispatch_thread);

        let read_loop = ReadLoop {
            name: self.name.clone(),
            notifier: Arc::clone(&self.notifier),
            shared: Arc::clone(&self.shared),
            policy: self.config.reconnect.clone(),
            poll_interval: self.config.poll_interval,
        };
        let handle = thread::Builder::new()
            .name(format!("{}-producer", self.name))
            .spawn(move || read_loop.run(producer, tx));
        match handle {
            Ok(handle) => self.producer_thread = Some(handle),
            Err(err) => {
                self.shared.running.store(false, Ordering::SeqCst);
                self.join_threads();
                self.shared.set_state(PipelineState::Stopped);
                return Err(PipelineError::Spawn("producer", err));
            }
        }

        info!(pipeline = %self.name, "pipeline started");
        Ok(())
    }

    /// Stop both threads and close the stream.
    ///
    /// Blocks until the threads have exited. Once this returns, no consumer
    /// is called again until the next `start`. Items still queued are
    /// discarded. Idempotent.
    pub fn stop(&mut self) {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        if was_running {
            if let Some(interrupter) = &self.interrupter {
                interrupter.interrupt();
            }
            self.consumer.stop();
        }

        self.join_threads();

        if was_running {
            self.shared.set_state(PipelineState::Stopped);
            self.notifier.stopped(&self.name);
            info!(pipeline = %self.name, "pipeline stopped");
        }
    }

    fn abort_start(&mut self, mut producer: Producer<S, P>) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.set_state(PipelineState::Stopped);
        producer.stop();
        self.producer = Some(producer);
    }

    fn join_threads(&mut self) {
        if let Some(handle) = self.producer_thread.take() {
            handle.thread().unpark();
            match handle.join() {
                Ok(producer) => self.producer = Some(producer),
                Err(_) => error!(pipeline = %self.name, "producer thread panicked"),
            }
        }
        if let Some(handle) = self.dispatch_thread.take() {
            if handle.join().is_err() {
                error!(pipeline = %self.name, "dispatch thread panicked");
            }
        }
        self.interrupter = None;
    }
}

impl<S, P: Parser> Drop for Pipeline<S, P> {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(interrupter) = &self.interrupter {
            interrupter.interrupt();
        }
        if let Some(handle) = self.producer_thread.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
        if let Some(handle) = self.dispatch_thread.take() {
            let _ = handle.join();
        }
    }
}

struct ReadLoop {
    name: String,
    notifier: Arc<dyn Notifier>,
    shared: Arc<Shared>,
    policy: ReconnectPolicy,
    poll_interval: Duration,
}

impl ReadLoop {
    fn run<S: Transport, P: Parser>(
        self,
        mut producer: Producer<S, P>,
        tx: SyncSender<Event<P::Package>>,
    ) -> Producer<S, P> {
        self.notifier.started(&self.name);

        while self.shared.is_running() {
            match producer.try_get() {
                Ok(events) => {
                    if !self.enqueue(events, &tx) {
                        break;
                    }
                }
                Err(PipelineError::Timeout) => {}
                Err(PipelineError::ReconnectNeeded(err)) => {
                    if !self.shared.is_running() {
                        break;
                    }
                    warn!(pipeline = %self.name, %err, "stream lost, reconnecting");
                    if !self.reconnect(&mut producer) {
                        break;
                    }
                }
                Err(err) => {
                    error!(pipeline = %self.name, %err, "producer failed");
                    break;
                }
            }
        }

        producer.stop();
        debug!(pipeline = %self.name, "producer thread exiting");
        producer
    }

    /// Returns `false` when the dispatch side has gone away.
    fn enqueue<T>(&self, events: Vec<Event<T>>, tx: &SyncSender<Event<T>>) -> bool {
        for event in events {
            match tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(pipeline = %self.name, "ingestion queue full, dropping item");
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
        true
    }

    fn reconnect<S: Transport, P: Parser>(&self, producer: &mut Producer<S, P>) -> bool {
        self.shared.set_state(PipelineState::Reconnecting);

        for attempt in 1..=self.policy.max_attempts {
            if !self.sleep(self.policy.backoff(attempt)) {
                return false;
            }
            match producer.reconnect() {
                Ok(()) => {
                    if let Err(err) = producer.set_read_timeout(Some(self.poll_interval)) {
                        warn!(pipeline = %self.name, %err, "failed to set read timeout");
                    }
                    self.shared.set_state(PipelineState::Running);
                    info!(pipeline = %self.name, attempt, "reconnected");
                    return true;
                }
                Err(err) => {
                    warn!(
                        pipeline = %self.name,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        %err,
                        "reconnect attempt failed"
                    );
                }
            }
        }

        let attempts = self.policy.max_attempts;
        error!(pipeline = %self.name, attempts, "giving up on reconnect, pipeline down");
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.set_state(PipelineState::Down);
        self.notifier.down(&self.name, attempts);
        false
    }

    /// Park for `duration`, waking early on stop. Returns whether still running.
    fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if !self.shared.is_running() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::park_timeout(deadline - now);
        }
    }
}

struct DispatchLoop<T> {
    name: String,
    consumer: Arc<dyn Consumer<T>>,
    shared: Arc<Shared>,
    poll_interval: Duration,
}

impl<T> DispatchLoop<T> {
    fn run(self, rx: Receiver<Event<T>>) {
        self.consumer.setup();

        while self.shared.is_running() {
            match rx.recv_timeout(self.poll_interval) {
                Ok(event) => {
                    if !self.shared.is_running() {
                        break;
                    }
                    self.dispatch(event);
                }
                Err(RecvTimeoutError::Timeout) => self.consumer.on_timeout(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.consumer.teardown();
        debug!(pipeline = %self.name, "dispatch thread exiting");
    }

    fn dispatch(&self, event: Event<T>) {
        match event {
            Event::Package(package) => {
                if !self.consumer.consume(&package) {
                    debug!(pipeline = %self.name, "package rejected");
                }
            }
            Event::UnknownPackageType {
                package_type,
                length,
            } => self.consumer.on_unknown(package_type, length),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;
    use crate::consumer::MultiConsumer;
    use crate::notifier::NullNotifier;
    use crate::producer::tests::{number_frame, NumberParser, ScriptedStream, Step};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<u32>>,
        unknown: Mutex<Vec<(u8, usize)>>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<u32> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Consumer<u32> for Recorder {
        fn on_unknown(&self, package_type: u8, length: usize) {
            self.unknown.lock().unwrap().push((package_type, length));
        }

        fn consume(&self, item: &u32) -> bool {
            self.seen.lock().unwrap().push(*item);
            true
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        started: AtomicU32,
        stopped: AtomicU32,
        down: Mutex<Option<u32>>,
    }

    impl Notifier for CountingNotifier {
        fn started(&self, _name: &str) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn stopped(&self, _name: &str) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }

        fn down(&self, _name: &str, attempts: u32) {
            *self.down.lock().unwrap() = Some(attempts);
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig::default()
            .with_poll_interval(Duration::from_millis(10))
            .with_reconnect(ReconnectPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
            })
    }

    fn pipeline(
        stream: ScriptedStream,
        consumer: Arc<dyn Consumer<u32>>,
        notifier: Arc<dyn Notifier>,
    ) -> Pipeline<ScriptedStream, NumberParser> {
        Pipeline::new(
            "test",
            Producer::new(stream, NumberParser),
            consumer,
            notifier,
            fast_config(),
        )
    }

    fn frames(values: impl IntoIterator<Item = u32>) -> Vec<u8> {
        values.into_iter().flat_map(number_frame).collect()
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(10), Duration::from_secs(5));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn dispatches_in_wire_order_to_every_consumer() {
        let stream = ScriptedStream::new(vec![vec![Step::Data(frames(1..=3))]]);
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let multi: Arc<MultiConsumer<u32>> = Arc::new(MultiConsumer::new());
        multi.add_consumer(first.clone());
        multi.add_consumer(second.clone());

        let mut pipeline = pipeline(stream, multi, Arc::new(NullNotifier));
        pipeline.start().unwrap();
        wait_for(|| second.seen().len() == 3);
        pipeline.stop();

        assert_eq!(first.seen(), vec![1, 2, 3]);
        assert_eq!(second.seen(), vec![1, 2, 3]);
    }

    #[test]
    fn consumers_join_and_leave_while_running() {
        let (feed, rx) = mpsc::channel();
        let stream = ScriptedStream::new(vec![vec![Step::Feed(rx)]]);
        let first = Arc::new(Recorder::default());
        let multi: Arc<MultiConsumer<u32>> = Arc::new(MultiConsumer::new());
        multi.add_consumer(first.clone());

        let mut pipeline = pipeline(stream, multi.clone(), Arc::new(NullNotifier));
        pipeline.start().unwrap();
        feed.send(frames([1])).unwrap();
        wait_for(|| first.seen() == [1]);

        let late = Arc::new(Recorder::default());
        let registered: Arc<dyn Consumer<u32>> = late.clone();
        multi.add_consumer(registered.clone());
        feed.send(frames([2])).unwrap();
        wait_for(|| late.seen() == [2]);

        assert!(multi.remove_consumer(&registered));
        feed.send(frames([3])).unwrap();
        wait_for(|| first.seen() == [1, 2, 3]);
        assert!(pipeline.is_running());
        pipeline.stop();

        assert_eq!(late.seen(), vec![2]);
        assert_eq!(multi.len(), 1);
    }

    #[test]
    fn unknown_frames_reach_consumer_hook() {
        let mut wire = bytes::BytesMut::new();
        urlink_frame::encode_frame(77, b"xyz", &mut wire).unwrap();
        let stream = ScriptedStream::new(vec![vec![Step::Data(wire.to_vec())]]);
        let recorder = Arc::new(Recorder::default());

        let mut pipeline = pipeline(stream, recorder.clone(), Arc::new(NullNotifier));
        pipeline.start().unwrap();
        wait_for(|| !recorder.unknown.lock().unwrap().is_empty());
        pipeline.stop();

        assert_eq!(*recorder.unknown.lock().unwrap(), vec![(77, 8)]);
    }

    #[test]
    fn reconnects_without_duplicates_or_gaps() {
        let first = number_frame(3);
        let mut before = frames(1..=2);
        before.extend_from_slice(&first[..4]);
        let stream = ScriptedStream::new(vec![
            vec![Step::Data(before), Step::Fail],
            vec![Step::Data(frames(3..=5))],
        ]);
        let recorder = Arc::new(Recorder::default());
        let notifier = Arc::new(CountingNotifier::default());

        let mut pipeline = pipeline(stream, recorder.clone(), notifier.clone());
        pipeline.start().unwrap();
        wait_for(|| recorder.seen().len() == 5);
        assert_eq!(pipeline.state(), PipelineState::Running);
        pipeline.stop();

        assert_eq!(recorder.seen(), vec![1, 2, 3, 4, 5]);
        let producer = pipeline.producer().unwrap();
        assert_eq!(producer.stats().reconnects, 1);
        assert_eq!(producer.stream().connects, 2);
        assert_eq!(notifier.started.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.stopped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn goes_down_after_exhausting_attempts() {
        let stream = ScriptedStream::new(vec![vec![Step::Data(frames([9])), Step::Fail]]);
        let recorder = Arc::new(Recorder::default());
        let notifier = Arc::new(CountingNotifier::default());

        let mut pipeline = pipeline(stream, recorder.clone(), notifier.clone());
        pipeline.start().unwrap();
        assert!(pipeline.check().is_ok());
        wait_for(|| pipeline.state() == PipelineState::Down);

        assert!(matches!(pipeline.check(), Err(PipelineError::Down { attempts: 3 })));
        assert_eq!(*notifier.down.lock().unwrap(), Some(3));
        assert!(!pipeline.is_running());
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Down);
        assert_eq!(notifier.stopped.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn initial_connect_failure_is_returned() {
        let stream = ScriptedStream::new(vec![vec![]]).refusing(1);
        let mut pipeline = pipeline(stream, Arc::new(Recorder::default()), Arc::new(NullNotifier));

        assert!(matches!(pipeline.start(), Err(PipelineError::Transport(_))));
        assert_eq!(pipeline.state(), PipelineState::Idle);
        pipeline.start().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
        pipeline.stop();
    }

    #[test]
    fn nothing_dispatches_after_stop() {
        let stream = ScriptedStream::new(vec![vec![
            Step::Data(frames([1])),
            Step::Timeout,
            Step::Data(frames([2])),
        ]]);
        let recorder = Arc::new(Recorder::default());
        let mut pipeline = pipeline(stream, recorder.clone(), Arc::new(NullNotifier));
        pipeline.start().unwrap();
        wait_for(|| !recorder.seen().is_empty());
        pipeline.stop();
        pipeline.stop();

        let after_stop = recorder.seen();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(recorder.seen(), after_stop);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert!(pipeline.producer().is_some());
    }

    #[test]
    fn start_is_idempotent() {
        let stream = ScriptedStream::new(vec![vec![]]);
        let mut pipeline = pipeline(stream, Arc::new(Recorder::default()), Arc::new(NullNotifier));
        pipeline.start().unwrap();
        pipeline.start().unwrap();
        assert!(pipeline.is_running());
        pipeline.stop();
        assert!(!pipeline.is_running());
    }
}
