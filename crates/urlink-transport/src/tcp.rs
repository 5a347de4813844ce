use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{ConnectionState, Endpoint, Transport};

/// Socket-level configuration for a [`ByteStream`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Upper bound for establishing the TCP connection. Default: 5s.
    pub connect_timeout: Duration,
    /// Read timeout applied after connecting. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied after connecting.
    pub write_timeout: Option<Duration>,
    /// Disable Nagle's algorithm. Command channels want this on.
    pub nodelay: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: None,
            write_timeout: Some(Duration::from_secs(1)),
            nodelay: true,
        }
    }
}

/// TCP connection to one controller interface.
///
/// Provides blocking reads and writes over a socket that can be closed and
/// reopened any number of times. Errors are surfaced as-is; this type never
/// retries.
pub struct ByteStream {
    endpoint: Endpoint,
    config: StreamConfig,
    state: ConnectionState,
    stream: Option<TcpStream>,
    /// Clone of the live socket, shared with interrupters.
    shared: Arc<Mutex<Option<TcpStream>>>,
}

impl ByteStream {
    /// Create a disconnected stream for `host:port` with default configuration.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_config(Endpoint::new(host, port), StreamConfig::default())
    }

    /// Create a disconnected stream with explicit configuration.
    pub fn with_config(endpoint: Endpoint, config: StreamConfig) -> Self {
        Self {
            endpoint,
            config,
            state: ConnectionState::Disconnected,
            stream: None,
            shared: Arc::new(Mutex::new(None)),
        }
    }

    /// Wrap an already connected socket, e.g. one accepted from a listener.
    pub fn from_connected(stream: TcpStream, config: StreamConfig) -> Result<Self> {
        let peer = stream.peer_addr()?;
        let mut this = Self::with_config(Endpoint::new(peer.ip().to_string(), peer.port()), config);
        this.install(stream)?;
        Ok(this)
    }

    /// Current configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Local address of the connected socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs = (self.endpoint.host.as_str(), self.endpoint.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        Ok(addrs.collect())
    }

    fn install(&mut self, stream: TcpStream) -> Result<()> {
        stream.set_nodelay(self.config.nodelay)?;
        stream.set_read_timeout(self.config.read_timeout)?;
        stream.set_write_timeout(self.config.write_timeout)?;

        let clone = stream.try_clone()?;
        *lock_slot(&self.shared) = Some(clone);
        self.stream = Some(stream);
        self.state = ConnectionState::Connected;
        Ok(())
    }

    fn mark_lost(&mut self) {
        if self.state == ConnectionState::Connected {
            debug!(endpoint = %self.endpoint, "stream lost");
        }
        self.stream = None;
        *lock_slot(&self.shared) = None;
        self.state = ConnectionState::Disconnected;
    }

    fn connected_stream(&mut self) -> std::io::Result<&mut TcpStream> {
        match self.stream.as_mut() {
            Some(stream) => Ok(stream),
            None => Err(std::io::Error::new(
                ErrorKind::NotConnected,
                format!("not connected to {}", self.endpoint),
            )),
        }
    }
}

impl Transport for ByteStream {
    fn connect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }

        self.state = ConnectionState::Connecting;
        let addrs = match self.resolve() {
            Ok(addrs) => addrs,
            Err(err) => {
                self.state = ConnectionState::Disconnected;
                return Err(err);
            }
        };

        let mut last_err =
            std::io::Error::new(ErrorKind::AddrNotAvailable, "endpoint resolved to no address");
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => {
                    if let Err(err) = self.install(stream) {
                        self.mark_lost();
                        return Err(err);
                    }
                    info!(endpoint = %self.endpoint, %addr, "connected");
                    return Ok(());
                }
                Err(err) => {
                    debug!(endpoint = %self.endpoint, %addr, %err, "connect attempt failed");
                    last_err = err;
                }
            }
        }

        self.state = ConnectionState::Disconnected;
        Err(TransportError::Connect {
            endpoint: self.endpoint.clone(),
            source: last_err,
        })
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!(endpoint = %self.endpoint, "stream closed");
        }
        *lock_slot(&self.shared) = None;
        self.state = ConnectionState::Disconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.config.read_timeout = timeout;
        if let Some(stream) = &self.stream {
            stream.set_read_timeout(timeout)?;
        }
        Ok(())
    }

    fn interrupter(&self) -> Option<StreamInterrupter> {
        Some(StreamInterrupter {
            slot: Arc::clone(&self.shared),
        })
    }
}

impl Read for ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let result = self.connected_stream()?.read(buf);
        match &result {
            Ok(0) if !buf.is_empty() => self.mark_lost(),
            Err(err) if is_fatal(err.kind()) => self.mark_lost(),
            _ => {}
        }
        result
    }
}

impl Write for ByteStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let result = self.connected_stream()?.write(buf);
        if let Err(err) = &result {
            if is_fatal(err.kind()) {
                warn!(endpoint = %self.endpoint, %err, "write failed");
                self.mark_lost();
            }
        }
        result
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.connected_stream()?.flush()
    }
}

impl Drop for ByteStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .finish()
    }
}

/// Unblocks a pending read on a [`ByteStream`] from another thread.
///
/// Follows the stream across reconnects: interrupting always targets the
/// socket that is live at the time of the call.
#[derive(Clone)]
pub struct StreamInterrupter {
    slot: Arc<Mutex<Option<TcpStream>>>,
}

impl StreamInterrupter {
    /// Shut the live socket down in both directions. The blocked reader sees
    /// EOF or an error on its next return.
    pub fn interrupt(&self) {
        if let Some(stream) = lock_slot(&self.slot).as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl std::fmt::Debug for StreamInterrupter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamInterrupter").finish_non_exhaustive()
    }
}

fn lock_slot(slot: &Mutex<Option<TcpStream>>) -> std::sync::MutexGuard<'_, Option<TcpStream>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_fatal(kind: ErrorKind) -> bool {
    !matches!(
        kind,
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn connect_read_write() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(b"hello").unwrap();
            let mut buf = [0u8; 4];
            conn.read_exact(&mut buf).unwrap();
            buf
        });

        let mut stream = ByteStream::new("127.0.0.1", port);
        assert_eq!(stream.state(), ConnectionState::Disconnected);
        stream.connect().unwrap();
        assert_eq!(stream.state(), ConnectionState::Connected);

        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        stream.write_all(b"pong").unwrap();

        assert_eq!(&server.join().unwrap(), b"pong");
    }

    #[test]
    fn connect_is_idempotent() {
        let (listener, port) = listener();
        let server = thread::spawn(move || listener.accept().map(|_| ()));

        let mut stream = ByteStream::new("127.0.0.1", port);
        stream.connect().unwrap();
        stream.connect().unwrap();
        assert_eq!(stream.state(), ConnectionState::Connected);
        server.join().unwrap().unwrap();
    }

    #[test]
    fn connect_refused_is_connect_error() {
        let (listener, port) = listener();
        drop(listener);

        let mut stream = ByteStream::new("127.0.0.1", port);
        let err = stream.connect().unwrap_err();
        assert!(err.is_connect());
        assert!(matches!(err, TransportError::Connect { .. }));
        assert_eq!(stream.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn close_is_safe_to_repeat() {
        let mut stream = ByteStream::new("127.0.0.1", 1);
        stream.close();
        stream.close();
        assert_eq!(stream.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn read_without_connection_fails() {
        let mut stream = ByteStream::new("127.0.0.1", 1);
        let mut buf = [0u8; 1];
        let err = stream.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }

    #[test]
    fn remote_close_marks_disconnected() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            drop(conn);
        });

        let mut stream = ByteStream::new("127.0.0.1", port);
        stream.connect().unwrap();
        server.join().unwrap();

        let mut buf = [0u8; 8];
        let err = stream.read_exact(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
        assert_eq!(stream.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn interrupter_unblocks_pending_read() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(300));
            drop(conn);
        });

        let mut stream = ByteStream::new("127.0.0.1", port);
        stream.connect().unwrap();
        let interrupter = stream.interrupter().unwrap();

        let reader = thread::spawn(move || {
            let mut buf = [0u8; 1];
            let n = stream.read(&mut buf).unwrap_or(0);
            (n, stream.state())
        });

        thread::sleep(Duration::from_millis(50));
        interrupter.interrupt();

        let (n, state) = reader.join().unwrap();
        assert_eq!(n, 0);
        assert_eq!(state, ConnectionState::Disconnected);
        server.join().unwrap();
    }

    #[test]
    fn reconnect_after_remote_close() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (first, _) = listener.accept().unwrap();
            drop(first);
            let (mut second, _) = listener.accept().unwrap();
            second.write_all(b"back").unwrap();
        });

        let mut stream = ByteStream::new("127.0.0.1", port);
        stream.connect().unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);

        stream.reconnect().unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"back");
        server.join().unwrap();
    }
}
