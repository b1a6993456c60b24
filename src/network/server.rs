//! TCP Server
//!
//! Accepts connections and runs each one on its own session thread.

use std::io::{ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::sync::WaitGroup;

use super::session::{Session, POLL_INTERVAL};
use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::protocol::{encode_value, RespValue};

/// Reply sent to a client accepted while the server is full
const MAX_CLIENTS_REPLY: &str = "ERR max number of clients reached";

/// How long a rejected client gets to take its error reply
const REJECT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// TCP server for the in-memory engine
///
/// One acceptor (the thread calling `run`) spawns a session thread per
/// accepted socket, up to `max_connections` at once. Clients beyond that
/// get an error reply and are disconnected.
pub struct Server {
    config: ServerConfig,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,

    /// Sessions currently running
    active: Arc<AtomicUsize>,
}

/// Signals a running server to stop
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Ask the server to stop accepting and close its sessions
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Held by a session thread; releases its connection slot on drop
struct SessionSlot {
    active: Arc<AtomicUsize>,
    _running: WaitGroup,
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Server {
    /// Bind the listen address
    pub fn bind(config: ServerConfig, engine: Arc<Engine>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        // Non-blocking so the accept loop can observe shutdown
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The bound address (useful when binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Number of sessions currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Start the server (blocking)
    ///
    /// Returns after `ShutdownHandle::shutdown` once every session thread
    /// has finished.
    pub fn run(&self) -> Result<()> {
        tracing::info!(
            "Listening on {} (max {} connections)",
            self.local_addr()?,
            self.config.max_connections
        );

        let running = WaitGroup::new();
        let accept_result = self.accept_loop(&running);

        // Sessions see the shutdown flag within one poll interval
        running.wait();

        tracing::info!("Server stopped");
        accept_result
    }

    fn accept_loop(&self, running: &WaitGroup) -> Result<()> {
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    tracing::debug!("Accepted connection from {}", addr);
                    // Accepted sockets may inherit non-blocking mode
                    if let Err(e) = stream.set_nonblocking(false) {
                        tracing::warn!("Dropping connection from {}: {}", addr, e);
                        continue;
                    }
                    self.dispatch(stream, addr, running);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL / 10),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    // Transient failures (e.g. EMFILE) should not kill the server
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
        Ok(())
    }

    /// Start a session thread for `stream`, or turn it away if full
    fn dispatch(&self, stream: TcpStream, addr: SocketAddr, running: &WaitGroup) {
        let limit = self.config.max_connections.max(1);
        if self.active.fetch_add(1, Ordering::AcqRel) >= limit {
            self.active.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!("Rejecting {}: {} connections already open", addr, limit);
            reject(stream);
            return;
        }

        let slot = SessionSlot {
            active: Arc::clone(&self.active),
            _running: running.clone(),
        };
        let engine = Arc::clone(&self.engine);
        let shutdown = Arc::clone(&self.shutdown);
        let config = self.config.clone();

        let spawned = thread::Builder::new()
            .name(format!("resp-session-{}", addr))
            .spawn(move || {
                let _slot = slot;
                serve(stream, engine, &config, shutdown);
            });

        // A failed spawn drops the closure, and with it the socket and slot
        if let Err(e) = spawned {
            tracing::error!("Failed to spawn session thread for {}: {}", addr, e);
        }
    }
}

/// Tell a client the server is full, then drop it
fn reject(mut stream: TcpStream) {
    let reply = encode_value(&RespValue::error(MAX_CLIENTS_REPLY));
    let sent = stream
        .set_write_timeout(Some(REJECT_WRITE_TIMEOUT))
        .and_then(|()| stream.write_all(&reply));
    if let Err(e) = sent {
        tracing::debug!("Could not send rejection: {}", e);
    }
}

/// Run one session to completion on its own thread
fn serve(stream: TcpStream, engine: Arc<Engine>, config: &ServerConfig, shutdown: Arc<AtomicBool>) {
    let mut session = match Session::new(stream, engine, config, shutdown) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Failed to set up session: {}", e);
            return;
        }
    };

    if let Err(e) = session.handle() {
        tracing::debug!("Session for {} ended with error: {}", session.peer_addr(), e);
    }
}
