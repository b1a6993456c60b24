//! Configuration for resplite
//!
//! Centralized client and server configuration with sensible defaults.
//! Timeouts are in milliseconds; `0` disables the timeout.

use std::time::Duration;

use crate::protocol::DecodeLimits;

/// Convert a millisecond setting into an optional timeout
pub(crate) fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for a client connection
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Target
    // -------------------------------------------------------------------------
    /// Server host name or IP address
    pub host: String,

    /// Server TCP port
    pub port: u16,

    // -------------------------------------------------------------------------
    // Timeouts
    // -------------------------------------------------------------------------
    /// Time allowed for establishing the TCP connection (per address)
    pub connect_timeout_ms: u64,

    /// Deadline for a whole request/response exchange
    pub call_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Socket / Protocol
    // -------------------------------------------------------------------------
    /// Disable Nagle's algorithm
    pub nodelay: bool,

    /// Limits applied when decoding replies
    pub limits: DecodeLimits,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            connect_timeout_ms: 5000,
            call_timeout_ms: 5000,
            nodelay: true,
            limits: DecodeLimits::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// `host:port`, as used in log and error messages
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.connect_timeout_ms)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.call_timeout_ms)
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the per-call deadline (in milliseconds)
    pub fn call_timeout_ms(mut self, ms: u64) -> Self {
        self.config.call_timeout_ms = ms;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Set the reply decode limits
    pub fn limits(mut self, limits: DecodeLimits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the in-memory RESP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP listen address
    pub listen_addr: String,

    /// Sessions served at once; clients beyond this are turned away
    pub max_connections: usize,

    /// Close a session after this long without a request
    pub idle_timeout_ms: u64,

    /// Socket write timeout
    pub write_timeout_ms: u64,

    /// Limits applied when decoding requests
    pub limits: DecodeLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:6379".to_string(),
            max_connections: 1024,
            idle_timeout_ms: 300_000,
            write_timeout_ms: 5000,
            limits: DecodeLimits::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for ServerConfig
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent sessions (at least one)
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the idle session timeout (in milliseconds)
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the request decode limits
    pub fn limits(mut self, limits: DecodeLimits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}
