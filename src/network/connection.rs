//! Client Connection
//!
//! Owns one TCP socket to a RESP server and performs blocking
//! request/response exchanges over it.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};

use crate::config::ClientConfig;
use crate::error::{CallError, ConnectError};
use crate::protocol::{encode_command, Command, Decoded, Decoder, RespValue};

/// Size of each socket read
const READ_CHUNK_SIZE: usize = 4096;

/// Initial capacity of the reply buffer
const INITIAL_BUFFER_SIZE: usize = 4096;

/// A single connection to a RESP server
///
/// One call is in flight at a time (`call` takes `&mut self`). Bytes that
/// arrive after a complete reply stay buffered for the next call. Any call
/// error closes the socket, after which every call fails with
/// `CallError::Closed`.
pub struct Connection {
    /// The socket; `None` once closed
    stream: Option<TcpStream>,

    /// Received bytes not yet decoded into a value
    buffer: BytesMut,

    /// Progress through a reply that is still arriving
    decoder: Decoder,

    /// Peer address for logging
    peer_addr: SocketAddr,

    config: ClientConfig,
}

impl Connection {
    /// Connect to `host:port` with default settings
    pub fn connect(host: &str, port: u16) -> Result<Self, ConnectError> {
        let config = ClientConfig::builder().host(host).port(port).build();
        Self::connect_with(config)
    }

    /// Connect using the given configuration
    ///
    /// Every address `host` resolves to is tried in order; the error from
    /// the last attempt is returned if none succeeds.
    pub fn connect_with(config: ClientConfig) -> Result<Self, ConnectError> {
        let addr = config.addr();
        let candidates: Vec<SocketAddr> = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|source| ConnectError::Resolve {
                addr: addr.clone(),
                source,
            })?
            .collect();

        let mut last_err = None;
        for candidate in &candidates {
            let attempt = match config.connect_timeout() {
                Some(timeout) => TcpStream::connect_timeout(candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => return Self::from_stream(stream, config),
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", candidate, e);
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            None => ConnectError::NoAddress(addr),
            Some(e) => match e.kind() {
                ErrorKind::ConnectionRefused => ConnectError::Refused { addr, source: e },
                ErrorKind::TimedOut | ErrorKind::WouldBlock => ConnectError::Timeout { addr },
                _ => ConnectError::Io { addr, source: e },
            },
        })
    }

    /// Wrap an already-connected stream
    fn from_stream(stream: TcpStream, config: ClientConfig) -> Result<Self, ConnectError> {
        let io_err = |source| ConnectError::Io {
            addr: config.addr(),
            source,
        };

        let peer_addr = stream.peer_addr().map_err(io_err)?;
        stream.set_nodelay(config.nodelay).map_err(io_err)?;

        tracing::debug!("Connected to {}", peer_addr);

        Ok(Self {
            stream: Some(stream),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            decoder: Decoder::new(config.limits),
            peer_addr,
            config,
        })
    }

    /// Send a command and wait for its reply, bounded by the configured call
    /// timeout
    pub fn call(&mut self, command: &Command) -> Result<RespValue, CallError> {
        let deadline = self.config.call_timeout().map(|t| Instant::now() + t);
        self.call_until(command, deadline)
    }

    /// Send a command and wait for its reply, bounded by `timeout`
    /// (`None` waits indefinitely)
    pub fn call_with_timeout(
        &mut self,
        command: &Command,
        timeout: Option<Duration>,
    ) -> Result<RespValue, CallError> {
        self.call_until(command, timeout.map(|t| Instant::now() + t))
    }

    /// Send a command and wait for its reply until `deadline`
    ///
    /// A RESP error reply is a successful call returning
    /// `RespValue::Error`; only transport and framing failures are errors
    /// here, and they all close the connection.
    pub fn call_until(
        &mut self,
        command: &Command,
        deadline: Option<Instant>,
    ) -> Result<RespValue, CallError> {
        if self.stream.is_none() {
            return Err(CallError::Closed);
        }

        tracing::trace!(
            "Calling {} on {}",
            String::from_utf8_lossy(command.name()),
            self.peer_addr
        );

        let result = self
            .send(command, deadline)
            .and_then(|()| self.receive(deadline));

        if let Err(ref e) = result {
            if e.is_disconnect() {
                tracing::debug!("Connection to {} lost: {}", self.peer_addr, e);
            } else {
                tracing::warn!("Call to {} failed, closing connection: {}", self.peer_addr, e);
            }
            self.close();
        }
        result
    }

    /// Write the encoded command, retrying partial writes
    fn send(&mut self, command: &Command, deadline: Option<Instant>) -> Result<(), CallError> {
        let stream = self.stream.as_mut().ok_or(CallError::Closed)?;
        let bytes = encode_command(command);

        let mut written = 0;
        while written < bytes.len() {
            stream.set_write_timeout(remaining(deadline)?)?;
            match stream.write(&bytes[written..]) {
                Ok(0) => return Err(CallError::Closed),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => return Err(CallError::Timeout),
                Err(e) => return Err(CallError::Io(e)),
            }
        }
        stream.flush()?;
        Ok(())
    }

    /// Read until the buffer holds one complete value, then take it
    fn receive(&mut self, deadline: Option<Instant>) -> Result<RespValue, CallError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            // Leftover bytes from an earlier read may already hold the reply
            if let Decoded::Complete { value, consumed } = self.decoder.decode(&self.buffer)? {
                self.buffer.advance(consumed);
                return Ok(value);
            }

            let stream = self.stream.as_mut().ok_or(CallError::Closed)?;
            stream.set_read_timeout(remaining(deadline)?)?;

            match stream.read(&mut chunk) {
                Ok(0) => return Err(CallError::Closed),
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => return Err(CallError::Timeout),
                Err(e) => return Err(CallError::Io(e)),
            }
        }
    }

    /// Release the socket
    ///
    /// Idempotent. Later calls fail with `CallError::Closed`.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone; the socket is dropped either way
            let _ = stream.shutdown(Shutdown::Both);
            self.buffer.clear();
            self.decoder.reset();
            tracing::debug!("Closed connection to {}", self.peer_addr);
        }
    }

    /// Whether the socket is still held
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Address of the server
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Number of received bytes not yet consumed by a reply
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer_addr", &self.peer_addr)
            .field("open", &self.stream.is_some())
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

/// Time left until `deadline`, as a socket timeout
///
/// Socket timeouts must be non-zero, so an expired deadline is reported as
/// `Timeout` before any I/O is attempted.
fn remaining(deadline: Option<Instant>) -> Result<Option<Duration>, CallError> {
    match deadline {
        None => Ok(None),
        Some(deadline) => {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                Err(CallError::Timeout)
            } else {
                Ok(Some(left))
            }
        }
    }
}

/// Blocking sockets report an elapsed timeout as `WouldBlock` on Unix and
/// `TimedOut` on Windows
fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
