//! # resplite
//!
//! A small RESP2 client, plus a minimal in-memory server that speaks the
//! same protocol:
//! - Binary-safe command encoding
//! - Resumable decoding over arbitrary TCP chunk boundaries
//! - Blocking request/response calls with per-call deadlines
//! - Typed errors for connect, protocol and call failures
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────┐           ┌─────────────────────────┐
//! │   Connection (client)   │   RESP2   │   Server (acceptor)     │
//! │ encode → write          │◄─────────►│ thread per Session      │
//! │ read → buffer → decode  │    TCP    │ decode → Engine → reply │
//! └────────────┬────────────┘           └────────────┬────────────┘
//!              │                                     │
//!              ▼                                     ▼
//!      ┌───────────────┐                     ┌───────────────┐
//!      │   Protocol    │                     │    Engine     │
//!      │ (RESP codec)  │                     │   (RwLock)    │
//!      └───────────────┘                     └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use resplite::{Command, Connection};
//!
//! let mut conn = Connection::connect("127.0.0.1", 6379)?;
//! let reply = conn.call(&Command::new("ECHO").arg("hey"))?;
//! println!("{}", reply);
//! # Ok::<(), resplite::RespError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CallError, ConnectError, ProtocolError, RespError, Result};
pub use config::{ClientConfig, ServerConfig};
pub use protocol::{Command, RespValue};
pub use network::{Connection, Server, SharedConnection};
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of resplite
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
