//! Turnstile CLI
//!
//! Bridges a reopenable device (serial port, FIFO, named pipe) to TCP, one
//! connection at a time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use turnstile::{Device, ReopenConfig, ReopenDialer, ReopenListener};

mod bridge;
mod relay;

#[derive(Parser, Debug)]
#[command(name = "turnstile")]
#[command(about = "Serve or dial TCP over a reopenable device", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Delay after the first failed device open, in milliseconds
    #[arg(long, default_value_t = 100, global = true)]
    initial_backoff_ms: u64,

    /// Cap on the delay between device opens, in milliseconds
    #[arg(long, default_value_t = 2000, global = true)]
    max_backoff_ms: u64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Accept connections over the device and forward each to a TCP upstream
    Serve {
        /// Device path (e.g., /dev/ttyUSB0)
        #[arg(long)]
        device: PathBuf,
        /// TCP address to forward to (e.g., 127.0.0.1:8080)
        #[arg(long)]
        upstream: String,
    },
    /// Listen on TCP and carry each client over the device, one at a time
    Dial {
        /// Device path (e.g., /dev/ttyUSB0)
        #[arg(long)]
        device: PathBuf,
        /// TCP address to listen on (e.g., ":8080" or "0.0.0.0:8080")
        #[arg(long)]
        listen: String,
    },
}

impl Cli {
    fn reopen_config(&self) -> ReopenConfig {
        ReopenConfig {
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.reopen_config();
    match cli.command {
        Commands::Serve { device, upstream } => serve(Device::new(device), upstream, config).await,
        Commands::Dial { device, listen } => dial(Device::new(device), &listen, config).await,
    }
}

async fn serve(device: Device, upstream: String, config: ReopenConfig) -> Result<()> {
    let name = device.name();
    let listener = Arc::new(ReopenListener::with_config(device, name, config));
    info!("Serving {} to {}", listener.local_addr(), upstream);

    let l = Arc::clone(&listener);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            l.close();
        }
    });

    relay::serve(&listener, &upstream).await
}

async fn dial(device: Device, listen: &str, config: ReopenConfig) -> Result<()> {
    let addr = if listen.starts_with(':') {
        format!("0.0.0.0{}", listen)
    } else {
        listen.to_string()
    };

    let name = device.name();
    let dialer = Arc::new(ReopenDialer::with_config(device, name, config));
    let tcp = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("TCP listening on {}, dialing over {}", tcp.local_addr()?, dialer.local_addr());

    relay::dial(dialer, tcp, async {
        let _ = signal::ctrl_c().await;
    })
    .await
}
