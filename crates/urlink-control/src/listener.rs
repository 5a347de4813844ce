use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{ControlError, Result};
use crate::timeout::StepTime;
use crate::writer::CommandWriter;

/// Port the robot connects back to for commands.
pub const COMMAND_PORT: u16 = 50001;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Waits for the robot program to open the reverse command connection.
pub struct CommandListener {
    listener: TcpListener,
    step_time: StepTime,
    write_timeout: Option<Duration>,
}

impl CommandListener {
    /// Listen on all interfaces at `port`.
    pub fn bind(port: u16) -> Result<Self> {
        Self::bind_addr(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)))
    }

    pub fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|source| ControlError::Bind { addr, source })?;
        info!(%addr, "listening for robot command connection");
        Ok(Self {
            listener,
            step_time: StepTime::default(),
            write_timeout: Some(Duration::from_secs(1)),
        })
    }

    /// Step time handed to accepted writers.
    pub fn with_step_time(mut self, step_time: StepTime) -> Self {
        self.step_time = step_time;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept the robot's connection (blocking).
    pub fn accept(&self) -> Result<CommandWriter<TcpStream>> {
        let (stream, peer) = self.listener.accept().map_err(ControlError::Accept)?;
        self.writer(stream, peer)
    }

    /// Accept the robot's connection, giving up after `timeout`.
    ///
    /// Returns `Ok(None)` when no robot connected in time.
    pub fn accept_timeout(&self, timeout: Duration) -> Result<Option<CommandWriter<TcpStream>>> {
        let deadline = Instant::now() + timeout;
        self.listener.set_nonblocking(true)?;
        let accepted = loop {
            match self.listener.accept() {
                Ok(accepted) => break Ok(Some(accepted)),
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        break Ok(None);
                    }
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => break Err(ControlError::Accept(err)),
            }
        };
        self.listener.set_nonblocking(false)?;

        let Some((stream, peer)) = accepted? else {
            return Ok(None);
        };
        stream.set_nonblocking(false)?;
        self.writer(stream, peer).map(Some)
    }

    fn writer(&self, stream: TcpStream, peer: SocketAddr) -> Result<CommandWriter<TcpStream>> {
        stream.set_nodelay(true)?;
        stream.set_write_timeout(self.write_timeout)?;
        debug!(%peer, "robot connected to command interface");
        Ok(CommandWriter::with_step_time(stream, self.step_time))
    }
}
