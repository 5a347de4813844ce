//! Blocking TCP byte-stream transport.
//!
//! Provides a single connection to one remote endpoint of a robot controller
//! (primary interface, reverse command interface, ...):
//! - [`ByteStream`] owns the socket and its connection state
//! - [`Transport`] abstracts it so upper layers can run over scripted streams
//!
//! This is the lowest layer of urlink. It never retries on its own; recovery
//! policy belongs to the pipeline.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{ByteStream, StreamConfig, StreamInterrupter};
pub use traits::{ConnectionState, Endpoint, Transport};
