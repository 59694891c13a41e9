// CLI entry point for the Othello matchmaking relay.
//
// Starts a standalone relay that game clients connect to. The relay pairs
// connections into rooms and forwards lines between room members; it never
// runs the game. See `server.rs` for the networking architecture and
// `matchmaker.rs` for room bookkeeping.
//
// Usage:
//   relay [OPTIONS]
//     --config <FILE>     YAML file with any subset of `RelayConfig` fields
//     --bind <ADDR>       Bind address (default: 0.0.0.0)
//     --port <PORT>       Listen port (default: 8080)
//     --workers <N>       Connection workers (default: 10)
//
// Command-line values override the config file. Log verbosity follows
// `RUST_LOG` on top of an `info` default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use othello_relay::server::{RelayConfig, start_relay};

/// Matchmaking relay for two-player Othello
#[derive(Parser)]
#[command(name = "relay", version)]
struct Cli {
    /// YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Number of connection workers
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => read_config_file(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }

    let workers = config.workers;
    let (handle, addr) = start_relay(config).context("Failed to start relay")?;
    info!("relay listening on {addr} with {workers} workers");

    // Runs until the process is killed.
    handle.wait();
    Ok(())
}

fn read_config_file(path: &Path) -> Result<RelayConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}
