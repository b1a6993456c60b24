//! resplite Server Binary
//!
//! Starts the in-memory RESP server.

use std::sync::Arc;

use clap::Parser;
use resplite::{Engine, Server, ServerConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// resplite Server
#[derive(Parser, Debug)]
#[command(name = "resp-server")]
#[command(about = "Minimal in-memory RESP server (PING, ECHO, SET, GET)")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    listen: String,

    /// Maximum concurrent client sessions
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Close sessions idle for this many milliseconds (0 never)
    #[arg(long, default_value = "300000")]
    idle_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,resplite=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("resplite server v{}", resplite::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let config = ServerConfig::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .idle_timeout_ms(args.idle_timeout_ms)
        .build();

    let server = match Server::bind(config, Arc::new(Engine::new())) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
