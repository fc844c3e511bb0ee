// Indie Star Market - Main Entry Point

use std::sync::Arc;

use tracing::{error, info};

use indie_star_market::app_state::AppState;
use indie_star_market::clock::SystemClock;
use indie_star_market::config::Config;
use indie_star_market::routes;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_target(false)
        .init();

    info!("═══════════════════════════════════════════════");
    info!("     🌟 Indie Star Prediction Market");
    info!("═══════════════════════════════════════════════");

    let addr = config.bind_addr;
    let state = AppState::new(config, Arc::new(SystemClock))?.shared();
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "🚀 server running");
    info!("📋 Available Endpoints:");
    info!("   GET  /markets                          - List all markets");
    info!("   POST /markets                          - Create a market");
    info!("   GET  /markets/:id                      - Market details and odds");
    info!("   GET  /markets/:id/account              - Encoded market account");
    info!("   POST /markets/:id/quote                - Preview a trade");
    info!("   POST /markets/:id/buy                  - Buy YES or NO tokens");
    info!("   POST /markets/:id/sell                 - Sell YES or NO tokens");
    info!("   POST /markets/:id/settle               - Settle after the deadline");
    info!("   POST /markets/:id/redeem               - Redeem winning tokens");
    info!("   GET  /markets/:id/positions/:holder    - Holder position");
    info!("   GET  /balance/:owner                   - Ledger balances");
    info!("   GET  /activity                         - Recent activity");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Goodbye!");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received...");
}
