//! Length-prefixed framing and binary parsing for controller streams.
//!
//! Every frame on the wire is:
//! - a 4-byte big-endian total length (header inclusive)
//! - a 1-byte package type discriminator
//! - `length - 5` bytes of type-specific payload
//!
//! [`FrameReader`] turns a partially delivered byte stream into complete
//! [`RawFrame`]s; [`BinParser`] decodes the payload fields.

pub mod codec;
pub mod error;
pub mod parser;
pub mod reader;

pub use codec::{
    decode_frame, encode_frame, FrameConfig, RawFrame, DEFAULT_MAX_FRAME_SIZE, HEADER_SIZE,
    LENGTH_PREFIX_SIZE,
};
pub use error::{FrameError, ParseError, Result};
pub use parser::BinParser;
pub use reader::FrameReader;
