//! Chat client: entry point.
//!
//! Connects to a chat broker and reads commands from standard input.  Type
//! `help` for the command list.
//!
//! # Usage
//!
//! ```text
//! chat-client [OPTIONS]
//!
//! Options:
//!   --host <HOST>   Broker hostname or IP [default: 127.0.0.1]
//!   --port <PORT>   Broker port [default: 9999]
//! ```
//!
//! | Variable    | Default     |
//! |-------------|-------------|
//! | `CHAT_HOST` | `127.0.0.1` |
//! | `CHAT_PORT` | `9999`      |
//!
//! Diagnostics go to stderr through `tracing` (default level `warn`, change
//! with `RUST_LOG`); chat output goes to stdout.

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use chat_client::infrastructure::{ChatClient, Connection, Flow};

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "chat-client", about = "Command-line client for the chat broker", version)]
struct Cli {
    /// Hostname or IP address of the broker.
    #[arg(long, default_value = "127.0.0.1", env = "CHAT_HOST")]
    host: String,

    /// TCP port of the broker.
    #[arg(long, default_value_t = 9999, env = "CHAT_PORT")]
    port: u16,
}

impl Cli {
    fn broker_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let addr = cli.broker_addr();
    let conn = Connection::connect(&addr)
        .await
        .with_context(|| format!("could not reach the chat broker at {addr}"))?;

    // Everything the user should see is printed by this one task.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(line) = out_rx.recv().await {
            println!("{line}");
        }
    });

    println!("[Welcome] Simple chat client");
    println!("[Welcome] Type help for the command list");

    let mut client = ChatClient::new(conn, out_tx);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let result: anyhow::Result<()> = async {
        loop {
            tokio::select! {
                line = stdin.next_line() => {
                    let Some(line) = line.context("failed to read standard input")? else {
                        break;
                    };
                    if client.handle_line(&line).await? == Flow::Quit {
                        break;
                    }
                }
                _ = client.disconnected() => {
                    eprintln!("[Client] connection closed by broker");
                    break;
                }
            }
        }
        Ok(())
    }
    .await;

    // Dropping the client closes the output channel so the printer drains
    // and exits.
    drop(client);
    printer.await.ok();
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────
