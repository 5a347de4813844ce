//! Streaming pipeline for controller interfaces.
//!
//! A [`Producer`] pulls frames off a [`Transport`](urlink_transport::Transport)
//! and turns them into typed packages through a [`Parser`]. A [`Pipeline`]
//! runs the producer on its own thread, hands every decoded item to a
//! dispatch thread through a bounded queue, and offers it to a
//! [`Consumer`], usually a [`MultiConsumer`] fanning out to many.
//!
//! Connection loss is detected by the producer and recovered by the
//! pipeline's [`ReconnectPolicy`]; decode problems never stop the stream.

pub mod consumer;
pub mod error;
pub mod notifier;
pub mod parser;
pub mod pipeline;
pub mod producer;

pub use consumer::{Consumer, MultiConsumer};
pub use error::{PipelineError, Result};
pub use notifier::{Notifier, NullNotifier};
pub use parser::{Event, Parsed, Parser};
pub use pipeline::{Pipeline, PipelineConfig, PipelineState, ReconnectPolicy};
pub use producer::{Producer, ProducerState, ProducerStats};
