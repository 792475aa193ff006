//! urlfetch relay
//!
//! Accepts compressed, length-prefixed request frames over plain HTTP,
//! forwards them to the named origin and returns the origin response
//! XOR-obfuscated under an innocuous media Content-Type.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────┐
//!                       │                  URLFETCH RELAY                  │
//!   Client frame        │  ┌─────────┐   ┌────────┐   ┌──────────┐         │
//!   ────────────────────┼─▶│   net   │──▶│  http  │──▶│  codec   │         │
//!                       │  │listener │   │ server │   │ decode   │         │
//!                       │  └─────────┘   └────────┘   └────┬─────┘         │
//!                       │                                  ▼               │
//!                       │                             ┌──────────┐         │
//!                       │                             │ security │         │
//!                       │                             │  policy  │         │
//!                       │                             └────┬─────┘         │
//!                       │                                  ▼               │
//!   Disguised response  │  ┌───────────┐             ┌──────────┐          │
//!   ◀───────────────────┼──│obfuscation│◀────────────│ upstream │◀─────────┼── Origin
//!                       │  │ xor+type  │             │forwarder │          │
//!                       │  └───────────┘             └──────────┘          │
//!                       │                                                  │
//!                       │  relay mode: http ─▶ load_balancer ─▶ upstream   │
//!                       └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use urlfetch_relay::config::{loader, Mode, RelayConfig};
use urlfetch_relay::http::HttpServer;
use urlfetch_relay::lifecycle::{shutdown_signal, Shutdown};
use urlfetch_relay::net::Listener;
use urlfetch_relay::observability::{init_logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "urlfetch-relay", version, about = "Obfuscating HTTP urlfetch relay")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(long)]
    bind: Option<String>,

    /// Override the operating mode (fetch or relay)
    #[arg(long)]
    mode: Option<Mode>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => loader::load_config(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    // Overrides can invalidate a file that passed validation.
    loader::check(&config)?;

    let level = match cli.verbose {
        0 => config.observability.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    init_logging(level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.mode,
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        upstream_timeout_secs = config.upstream.timeout_secs,
        "Configuration loaded"
    );

    if config.mode == Mode::Fetch && config.fetch.password.is_empty() {
        tracing::warn!("fetch.password is empty, the relay is open to anyone");
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = Listener::bind(&config.listener).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown.trigger();
    });

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
