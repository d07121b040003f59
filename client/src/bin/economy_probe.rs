use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use gridfall_client::{
    AchievementEngine, ConnectionMonitor, DailyRewardEngine, ExchangeEngine, Gateway,
    GatewayConfig, StaticCredentials, WalletStore,
};
use gridfall_types::Wallet;
use tracing::info;

/// Smoke-checks a gridfall economy backend: fetches exchange, daily-reward,
/// and achievement status and prints what came back.
#[derive(Parser, Debug)]
#[command(name = "economy-probe", about = "Smoke-checks a gridfall economy backend")]
struct Args {
    /// Gateway base URL.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    gateway: String,

    /// Bearer token.
    #[arg(long, default_value = "dev-token")]
    token: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let gateway = Gateway::new(
        GatewayConfig::new(&args.gateway),
        StaticCredentials::new(args.token),
    )?;
    let wallet = WalletStore::new(Wallet::default());
    let monitor = ConnectionMonitor::new();

    let exchange = ExchangeEngine::new(gateway.clone(), Arc::clone(&wallet), monitor.clone());
    if exchange.fetch_status().await {
        let state = exchange.state();
        info!(
            rate = state.rate,
            max_tickets = state.max_tickets_possible,
            can_exchange = state.can_exchange,
            "exchange status"
        );
    }

    let daily = DailyRewardEngine::new(gateway.clone(), Arc::clone(&wallet), monitor.clone());
    if daily.fetch_status().await {
        let state = daily.state();
        info!(
            can_claim = state.can_claim,
            days = state.rewards.len(),
            "daily rewards"
        );
    }

    let achievements = AchievementEngine::new(gateway, Arc::clone(&wallet), monitor.clone());
    if achievements.fetch_achievements(None, 1).await {
        let state = achievements.state();
        info!(
            listed = state.achievements.len(),
            claimable = state.available_count,
            "achievements"
        );
    }

    info!(wallet = ?wallet.get(), link = ?monitor.state(), "probe complete");
    Ok(())
}
