use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gridfall_simulator::{Api, Simulator, SimulatorConfig};
use gridfall_types::Wallet;
use tracing::info;

/// Standalone economy backend for frontend development.
#[derive(Parser, Debug)]
#[command(name = "gridfall-simulator", about = "Local gridfall economy backend")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Bearer token accepted by every endpoint.
    #[arg(long, default_value = "dev-token")]
    token: String,

    /// Starting coin balance.
    #[arg(long, default_value_t = 1000)]
    coins: u64,

    /// Starting ticket balance.
    #[arg(long, default_value_t = 5)]
    tickets: u64,

    /// Coins per ticket. Zero simulates unconfigured exchange settings.
    #[arg(long, default_value_t = 100)]
    rate: u64,

    /// Exchange quota (tickets per period).
    #[arg(long, default_value_t = 50)]
    quota: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let simulator = Arc::new(Simulator::new(SimulatorConfig {
        bearer_token: args.token,
        initial_wallet: Wallet::new(args.coins, args.tickets),
        rate: args.rate,
        quota_limit: args.quota,
        ..SimulatorConfig::default()
    }));
    let api = Api::new(simulator);

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "simulator listening");
    axum::serve(listener, api.router())
        .await
        .context("server exited")?;
    Ok(())
}
