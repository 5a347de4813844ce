//! Client library for Universal Robots controllers.
//!
//! urlink reads the controller's primary interface as a stream of typed
//! packages and writes commands to the reverse interface a robot program
//! opens back to the client.
//!
//! # Crate Structure
//!
//! - [`transport`]: reconnectable TCP byte stream
//! - [`frame`]: length-prefixed frame decoding and the big-endian field parser
//! - [`pipeline`]: producer, threaded pipeline and consumer fan-out
//! - [`primary`]: primary interface packages and client (behind `primary` feature)
//! - [`control`]: command encoding and the receive-timeout contract (behind `control` feature)

/// Re-export transport types.
pub mod transport {
    pub use urlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use urlink_frame::*;
}

/// Re-export pipeline types.
pub mod pipeline {
    pub use urlink_pipeline::*;
}

/// Re-export primary interface types (requires `primary` feature).
#[cfg(feature = "primary")]
pub mod primary {
    pub use urlink_primary::*;
}

/// Re-export command interface types (requires `control` feature).
#[cfg(feature = "control")]
pub mod control {
    pub use urlink_control::*;
}
