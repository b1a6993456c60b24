//! Network Module
//!
//! TCP client and server plumbing.
//!
//! ## Client
//! - `Connection`: one socket, one in-flight call, buffered incremental reads
//! - `SharedConnection`: mutex-serialized handle for multi-threaded callers
//!
//! ## Server
//! - Single acceptor thread
//! - One thread per session, capped by `max_connections`
//! - Commands routed through Engine

mod connection;
mod shared;
mod server;
mod session;

pub use connection::Connection;
pub use shared::SharedConnection;
pub use server::{Server, ShutdownHandle};
pub use session::Session;
