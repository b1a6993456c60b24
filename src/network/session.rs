//! Session Handler
//!
//! Serves a single accepted client socket.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};

use crate::config::{timeout_from_ms, ServerConfig};
use crate::engine::Engine;
use crate::error::{RespError, Result};
use crate::protocol::{encode_value_into, Command, Decoded, Decoder, RespValue};

/// How often a blocked read wakes up to check for shutdown and idleness
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

const READ_CHUNK_SIZE: usize = 4096;

/// Server-side state for one client
pub struct Session {
    stream: TcpStream,

    /// Received bytes not yet decoded into a request
    inbound: BytesMut,

    /// Encoded replies waiting to be written
    outbound: BytesMut,

    /// Progress through a request that is still arriving
    decoder: Decoder,

    engine: Arc<Engine>,
    idle_timeout: Option<Duration>,
    shutdown: Arc<AtomicBool>,

    /// Peer address for logging
    peer_addr: String,
}

impl Session {
    /// Create a session handler
    ///
    /// Sets up timeouts; reads wake every `POLL_INTERVAL` so the session
    /// notices shutdown even when the client is quiet.
    pub fn new(
        stream: TcpStream,
        engine: Arc<Engine>,
        config: &ServerConfig,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(POLL_INTERVAL))?;
        stream.set_write_timeout(timeout_from_ms(config.write_timeout_ms))?;

        Ok(Self {
            stream,
            inbound: BytesMut::with_capacity(READ_CHUNK_SIZE),
            outbound: BytesMut::with_capacity(READ_CHUNK_SIZE),
            decoder: Decoder::new(config.limits),
            engine,
            idle_timeout: timeout_from_ms(config.idle_timeout_ms),
            shutdown,
            peer_addr,
        })
    }

    /// Serve requests until the client leaves, goes idle, or the server
    /// shuts down
    ///
    /// Every complete request in the buffer is answered before the next
    /// read, so pipelined requests get their replies in order and in one
    /// write.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Session started for {}", self.peer_addr);
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut last_activity = Instant::now();

        loop {
            let keep_going = self.process_buffered();
            if let Err(e) = self.flush() {
                return self.finish_with_write_error(e);
            }
            if let Err(e) = keep_going {
                tracing::warn!("Closing session for {}: {}", self.peer_addr, e);
                return Err(e);
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Ok(n) => {
                    self.inbound.extend_from_slice(&chunk[..n]);
                    last_activity = Instant::now();
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        tracing::debug!("Closing session for {}: server shutting down", self.peer_addr);
                        return Ok(());
                    }
                    if self
                        .idle_timeout
                        .is_some_and(|limit| last_activity.elapsed() >= limit)
                    {
                        tracing::debug!("Idle timeout for client {}", self.peer_addr);
                        return Ok(());
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!("Connection reset by client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Answer every complete request in the inbound buffer
    ///
    /// Malformed input queues a protocol error reply and returns `Err`; the
    /// caller flushes that reply before closing.
    fn process_buffered(&mut self) -> Result<()> {
        loop {
            let (value, consumed) = match self.decoder.decode(&self.inbound) {
                Ok(Decoded::Complete { value, consumed }) => (value, consumed),
                Ok(Decoded::Incomplete) => return Ok(()),
                Err(e) => {
                    self.queue_reply(&RespValue::error(format!("ERR Protocol error: {}", e)));
                    return Err(e.into());
                }
            };
            self.inbound.advance(consumed);

            let command = match Command::from_value(value) {
                Ok(command) => command,
                Err(e) => {
                    self.queue_reply(&RespValue::error(format!("ERR Protocol error: {}", e)));
                    return Err(e);
                }
            };

            tracing::trace!("Received {:?} from {}", command, self.peer_addr);
            let reply = self.engine.execute(&command);
            self.queue_reply(&reply);
        }
    }

    fn queue_reply(&mut self, reply: &RespValue) {
        encode_value_into(reply, &mut self.outbound);
    }

    /// Write out queued replies
    fn flush(&mut self) -> std::io::Result<()> {
        if self.outbound.is_empty() {
            return Ok(());
        }
        self.stream.write_all(&self.outbound)?;
        self.outbound.clear();
        self.stream.flush()
    }

    /// A client that vanishes before reading its reply is not a server error
    fn finish_with_write_error(&self, e: std::io::Error) -> Result<()> {
        match e.kind() {
            ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
                tracing::debug!(
                    "Client {} disconnected before reply could be sent: {}",
                    self.peer_addr,
                    e
                );
                Ok(())
            }
            _ => {
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                Err(RespError::Io(e))
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
