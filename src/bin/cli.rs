//! resplite CLI Client
//!
//! Sends one command to a RESP server and prints the reply.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use resplite::protocol::encode_value;
use resplite::{ClientConfig, Command, Connection, RespValue};
use tracing_subscriber::{fmt, EnvFilter};

/// resplite CLI
#[derive(Parser, Debug)]
#[command(name = "resp-cli")]
#[command(about = "Send a single command to a RESP server")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "6379")]
    port: u16,

    /// Connect and call timeout in milliseconds (0 waits forever)
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    /// Print the reply as raw RESP instead of redis-cli style
    #[arg(long)]
    raw: bool,

    /// Command name followed by its arguments, e.g. `ECHO hey`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(reply) if reply.is_error() => {
            print_reply(&reply, args.raw);
            ExitCode::FAILURE
        }
        Ok(reply) => {
            print_reply(&reply, args.raw);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> resplite::Result<RespValue> {
    let command = Command::from_parts(&args.command)?;

    let config = ClientConfig::builder()
        .host(&args.host)
        .port(args.port)
        .connect_timeout_ms(args.timeout_ms)
        .call_timeout_ms(args.timeout_ms)
        .build();

    let mut connection = Connection::connect_with(config)?;
    let reply = connection.call(&command)?;
    connection.close();
    Ok(reply)
}

fn print_reply(reply: &RespValue, raw: bool) {
    if raw {
        let mut stdout = std::io::stdout();
        // Nothing useful to do if stdout is gone
        let _ = stdout.write_all(&encode_value(reply));
        let _ = stdout.flush();
    } else {
        println!("{}", reply);
    }
}
