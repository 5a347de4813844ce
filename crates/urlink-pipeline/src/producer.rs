use std::time::Duration;

use tracing::{debug, info, warn};
use urlink_frame::{FrameConfig, FrameError, FrameReader, RawFrame};
use urlink_transport::{ConnectionState, StreamInterrupter, Transport};

use crate::error::{PipelineError, Result};
use crate::parser::{Event, Parsed, Parser};

/// Lifecycle of a [`Producer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Idle,
    Running,
    Stopped,
}

/// Counters kept by a producer across reconnects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Well-formed frames read off the stream.
    pub frames: u64,
    /// Frames dropped because their payload failed to decode.
    pub decode_failures: u64,
    /// Frames whose discriminator no parser knew.
    pub unknown_frames: u64,
    /// Bytes skipped while resynchronising on bad length prefixes.
    pub skipped_bytes: u64,
    /// Successful reconnects.
    pub reconnects: u64,
}

/// Reads frames from a stream and decodes them into events.
///
/// The producer detects failure but never decides recovery: on a stream
/// error it stops and reports [`PipelineError::ReconnectNeeded`]; the owner
/// calls [`Producer::reconnect`] when its policy allows.
pub struct Producer<S, P> {
    reader: FrameReader<S>,
    parser: P,
    state: ProducerState,
    stats: ProducerStats,
    resyncing: bool,
}

impl<S: Transport, P: Parser> Producer<S, P> {
    pub fn new(stream: S, parser: P) -> Self {
        Self::with_config(stream, parser, FrameConfig::default())
    }

    pub fn with_config(stream: S, parser: P, config: FrameConfig) -> Self {
        Self {
            reader: FrameReader::with_config(stream, config),
            parser,
            state: ProducerState::Idle,
            stats: ProducerStats::default(),
            resyncing: false,
        }
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    pub fn stats(&self) -> ProducerStats {
        self.stats
    }

    /// Borrow the underlying stream.
    pub fn stream(&self) -> &S {
        self.reader.get_ref()
    }

    /// Handle to unblock a pending read from another thread, if the stream
    /// supports it.
    pub fn interrupter(&self) -> Option<StreamInterrupter> {
        self.reader.get_ref().interrupter()
    }

    /// Bound how long [`Producer::try_get`] may block.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_mut().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Open the stream if needed and start reading.
    pub fn start(&mut self) -> Result<()> {
        if self.state == ProducerState::Running {
            return Ok(());
        }
        if self.reader.get_ref().state() != ConnectionState::Connected {
            self.reader.get_mut().connect()?;
        }
        self.reader.reset();
        self.resyncing = false;
        self.state = ProducerState::Running;
        debug!(endpoint = %self.reader.get_ref().endpoint(), "producer started");
        Ok(())
    }

    /// Close and reopen the stream. Bytes buffered from the old connection
    /// are discarded so nothing is delivered twice.
    pub fn reconnect(&mut self) -> Result<()> {
        self.state = ProducerState::Stopped;
        self.reader.get_mut().reconnect()?;
        self.reader.reset();
        self.resyncing = false;
        self.state = ProducerState::Running;
        self.stats.reconnects += 1;
        info!(endpoint = %self.reader.get_ref().endpoint(), "producer reconnected");
        Ok(())
    }

    /// Close the stream and stop reading.
    pub fn stop(&mut self) {
        self.reader.get_mut().close();
        self.state = ProducerState::Stopped;
    }

    /// Read the next frame and decode it.
    ///
    /// Returns the events decoded from exactly one frame; the list is empty
    /// when the frame was dropped or bytes were skipped while resynchronising.
    pub fn try_get(&mut self) -> Result<Vec<Event<P::Package>>> {
        if self.state != ProducerState::Running {
            return Err(PipelineError::NotRunning);
        }

        match self.reader.read_frame() {
            Ok(frame) => {
                if self.resyncing {
                    info!("stream resynchronised");
                    self.resyncing = false;
                }
                self.stats.frames += 1;
                Ok(self.decode(&frame))
            }
            Err(err) if err.is_timeout() => Err(PipelineError::Timeout),
            Err(err) if err.is_malformed() => {
                self.stats.skipped_bytes += 1;
                if !self.resyncing {
                    warn!(%err, "bad length prefix, resynchronising at next byte");
                    self.resyncing = true;
                }
                Ok(Vec::new())
            }
            Err(err) => {
                self.lost(&err);
                Err(PipelineError::ReconnectNeeded(err))
            }
        }
    }

    fn lost(&mut self, err: &FrameError) {
        warn!(
            endpoint = %self.reader.get_ref().endpoint(),
            %err,
            buffered = self.reader.buffered(),
            "stream lost"
        );
        self.reader.get_mut().close();
        self.state = ProducerState::Stopped;
    }

    fn decode(&mut self, frame: &RawFrame) -> Vec<Event<P::Package>> {
        match self.parser.parse(frame) {
            Ok(Parsed::Packages(packages)) => packages.into_iter().map(Event::Package).collect(),
            Ok(Parsed::UnknownType) => {
                self.stats.unknown_frames += 1;
                debug!(
                    package_type = frame.package_type,
                    length = frame.wire_size(),
                    "skipping package of unknown type"
                );
                vec![Event::UnknownPackageType {
                    package_type: frame.package_type,
                    length: frame.wire_size(),
                }]
            }
            Err(err) => {
                self.stats.decode_failures += 1;
                warn!(
                    package_type = frame.package_type,
                    length = frame.wire_size(),
                    %err,
                    "dropping frame that failed to decode"
                );
                Vec::new()
            }
        }
    }
}
