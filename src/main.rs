// src/main.rs
use spot_trader::config::Config;
use spot_trader::domain::errors::AppResult;
use spot_trader::exchange::client::{MarketDataClient, OrderClient};
use spot_trader::exchange::BinanceSpotClient;
use spot_trader::notifier::{format, Notifier, TelegramNotifier};
use spot_trader::orchestrator::Orchestrator;

use std::sync::Arc;
use tokio::signal::ctrl_c;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting spot_trader v{}", env!("CARGO_PKG_VERSION"));

    // Misconfigured tiers or strategies are fatal before any worker spawns.
    config.validate()?;
    log::info!(
        "Configuration valid: {} assets, {:?} mode",
        config.assets.len(),
        config.orchestrator.mode
    );

    let client = Arc::new(BinanceSpotClient::new(
        &config.exchange.api_key,
        &config.exchange.api_secret,
    ));
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(
        &config.telegram.bot_token,
        &config.telegram.chat_id,
    ));

    let orchestrator = Orchestrator::new(
        client.clone() as Arc<dyn MarketDataClient>,
        client as Arc<dyn OrderClient>,
        notifier.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = orchestrator.spawn(&config, shutdown_rx)?;
    log::info!("Spawned {} workers", handles.len());

    if let Err(e) = notifier.send(&format::startup_message(&config)).await {
        log::warn!("Startup notification failed: {}", e);
    }

    // Wait for shutdown signal
    log::info!("Bot is running. Press Ctrl+C to stop.");
    ctrl_c().await?;

    log::info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }

    log::info!("Shutdown complete. Goodbye!");
    Ok(())
}
