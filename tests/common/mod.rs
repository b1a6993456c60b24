//! Shared helpers for integration tests
//!
//! - Scripted peers: a one-shot TCP listener whose behaviour is a closure
//! - An in-process server bound to an ephemeral port

#![allow(dead_code)]

use std::io::Read;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::{Buf, BytesMut};
use resplite::network::ShutdownHandle;
use resplite::protocol::{decode, Command, Decoded};
use resplite::{Engine, Server, ServerConfig};

// =============================================================================
// Scripted Peers
// =============================================================================

/// A server that accepts exactly one connection and runs `script` on it
pub struct ScriptedPeer {
    pub port: u16,
    handle: JoinHandle<()>,
}

impl ScriptedPeer {
    pub fn spawn<F>(script: F) -> Self
    where
        F: FnOnce(PeerStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            stream.set_nodelay(true).unwrap();
            script(PeerStream {
                stream,
                buffer: BytesMut::new(),
            });
        });

        Self { port, handle }
    }

    /// Wait for the script to finish, surfacing its assertion failures
    pub fn join(self) {
        self.handle.join().expect("scripted peer panicked");
    }
}

/// The peer's side of the socket, with request decoding
pub struct PeerStream {
    pub stream: TcpStream,
    buffer: BytesMut,
}

impl PeerStream {
    /// Read one complete request; `None` once the client hangs up
    pub fn read_command(&mut self) -> Option<Command> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Decoded::Complete { value, consumed } = decode(&self.buffer).unwrap() {
                self.buffer.advance(consumed);
                return Some(Command::from_value(value).unwrap());
            }
            match self.stream.read(&mut chunk) {
                Ok(0) | Err(_) => return None,
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
            }
        }
    }

    /// Block until the client closes its end
    pub fn wait_for_hangup(&mut self) {
        while self.read_command().is_some() {}
    }
}

// =============================================================================
// In-process Server
// =============================================================================

/// A running server on an ephemeral port; stopped on drop
pub struct TestServer {
    pub addr: SocketAddr,
    pub engine: Arc<Engine>,
    shutdown: ShutdownHandle,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn start() -> Self {
        Self::start_with(ServerConfig::builder())
    }

    pub fn start_with(builder: resplite::config::ServerConfigBuilder) -> Self {
        let config = builder.listen_addr("127.0.0.1:0").build();
        let engine = Arc::new(Engine::new());
        let server = Server::bind(config, Arc::clone(&engine)).unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();

        let handle = thread::spawn(move || {
            server.run().unwrap();
        });

        Self {
            addr,
            engine,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
