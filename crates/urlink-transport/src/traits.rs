use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::tcp::StreamInterrupter;

/// Remote address of a controller interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Connection state of a stream, owned by the stream itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A reconnectable byte stream to one endpoint.
///
/// [`ByteStream`](crate::ByteStream) is the production implementation. The
/// producer and pipeline layers are generic over this trait so they can run
/// against in-memory streams.
///
/// `read` follows `std::io::Read`: `Ok(0)` means the remote side closed the
/// stream, `WouldBlock`/`TimedOut` mean the read timeout expired with no data.
pub trait Transport: Read + Write + Send {
    /// Open the connection. Does nothing when already connected.
    fn connect(&mut self) -> Result<()>;

    /// Release the socket. Safe to call more than once.
    fn close(&mut self);

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// The remote endpoint this stream talks to.
    fn endpoint(&self) -> &Endpoint;

    /// Bound how long a single read may block.
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }

    /// Handle that can unblock a pending read from another thread.
    fn interrupter(&self) -> Option<StreamInterrupter> {
        None
    }

    /// Close, then connect again.
    fn reconnect(&mut self) -> Result<()> {
        self.close();
        self.connect()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn state(&self) -> ConnectionState {
        (**self).state()
    }

    fn endpoint(&self) -> &Endpoint {
        (**self).endpoint()
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn interrupter(&self) -> Option<StreamInterrupter> {
        (**self).interrupter()
    }

    fn reconnect(&mut self) -> Result<()> {
        (**self).reconnect()
    }
}
