// Routes module - wires every HTTP endpoint to its handler

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::SharedState;
use crate::handlers::*;

pub fn router(state: SharedState) -> Router {
    Router::new()
        // ===== MARKET ENDPOINTS =====
        .route("/markets", get(get_markets).post(create_market))
        .route("/markets/:id", get(get_market))
        .route("/markets/:id/account", get(get_market_account))
        .route("/markets/:id/positions/:holder", get(get_position))

        // ===== TRADING ENDPOINTS =====
        .route("/markets/:id/quote", post(quote_trade))
        .route("/markets/:id/buy", post(buy))
        .route("/markets/:id/sell", post(sell))

        // ===== RESOLUTION ENDPOINTS =====
        .route("/markets/:id/settle", post(settle_market))
        .route("/markets/:id/redeem", post(redeem))

        // ===== LEDGER ENDPOINTS =====
        .route("/balance/:owner", get(get_balance))
        .route("/activity", get(get_activity))

        // ===== HEALTH CHECK =====
        .route("/", get(health_check))
        .route("/health", get(health_check))

        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
