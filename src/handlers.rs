// HTTP request handlers for the market API

use std::sync::MutexGuard;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::{AppState, SharedState};
use crate::error::MarketError;
use crate::ledger::TokenLedger;
use crate::market_resolve::{TradeDirection, TradeIntent};
use crate::models::*;

// ===== ERRORS =====

/// Error body returned by every endpoint: `{ success: false, error, code }`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn state_unavailable() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Application state is unavailable".into(),
            code: "StateUnavailable".into(),
        }
    }
}

pub fn status_for(error: &MarketError) -> StatusCode {
    match error {
        MarketError::MarketNotFound(_) | MarketError::AccountNotFound(_) => StatusCode::NOT_FOUND,
        MarketError::Unauthorized | MarketError::ReservedAccount(_) => StatusCode::FORBIDDEN,
        MarketError::MarketAlreadyExists(_)
        | MarketError::MarketSettled
        | MarketError::DeadlinePassed
        | MarketError::DeadlineNotPassed
        | MarketError::AlreadySettled
        | MarketError::MarketNotSettled => StatusCode::CONFLICT,
        MarketError::ArithmeticOverflow => StatusCode::UNPROCESSABLE_ENTITY,
        MarketError::CorruptAccount(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl From<MarketError> for ApiError {
    fn from(error: MarketError) -> Self {
        Self {
            status: status_for(&error),
            error: error.to_string(),
            code: error.code().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse { success: false, error: self.error, code: self.code };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

fn lock(state: &SharedState) -> ApiResult<MutexGuard<'_, AppState>> {
    state.lock().map_err(|_| ApiError::state_unavailable())
}

// ===== HEALTH =====

pub async fn health_check(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let app_state = lock(&state)?;
    Ok(Json(json!({
        "status": "ok",
        "service": "indie-star-market",
        "markets": app_state.manager.markets().len(),
        "ledger": app_state.manager.ledger().stats(),
        "timestamp": app_state.manager.now(),
    })))
}

// ===== MARKETS =====

pub async fn get_markets(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let app_state = lock(&state)?;
    let now = app_state.manager.now();
    let markets: Vec<MarketView> = app_state
        .manager
        .markets()
        .into_iter()
        .map(|market| MarketView::new(market, now))
        .collect();
    Ok(Json(json!({ "success": true, "count": markets.len(), "markets": markets })))
}

pub async fn create_market(
    State(state): State<SharedState>,
    Json(request): Json<CreateMarketRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut app_state = lock(&state)?;
    let market_id = app_state.manager.create_market(
        &request.authority,
        &request.project_name,
        request.fundraising_goal,
        request.deadline,
    )?;

    let view = MarketView::new(app_state.manager.market(&market_id)?, app_state.manager.now());
    app_state.log_activity(
        "🌟",
        "MARKET_CREATED",
        &format!(
            "{} by {} | goal {} | deadline {}",
            request.project_name, request.authority, request.fundraising_goal, request.deadline
        ),
    );
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "market": view }))))
}

pub async fn get_market(
    State(state): State<SharedState>,
    Path(market_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let app_state = lock(&state)?;
    let market = app_state.manager.market(&market_id)?;
    let view = MarketView::new(market, app_state.manager.now());
    let custody = app_state.manager.custody(&market_id)?;
    Ok(Json(json!({ "success": true, "market": view, "custody": custody })))
}

/// Encoded market account, hex
pub async fn get_market_account(
    State(state): State<SharedState>,
    Path(market_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let app_state = lock(&state)?;
    let bytes = app_state.manager.market(&market_id)?.to_account_bytes()?;
    Ok(Json(json!({
        "success": true,
        "market_id": market_id,
        "size": bytes.len(),
        "data": hex::encode(bytes),
    })))
}

// ===== TRADING =====

pub async fn quote_trade(
    State(state): State<SharedState>,
    Path(market_id): Path<String>,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<Json<Value>> {
    let app_state = lock(&state)?;
    let intent = TradeIntent { direction: request.direction, outcome: request.outcome, amount: request.amount };
    let quote = app_state.manager.quote(&market_id, &intent)?;
    Ok(Json(json!({ "success": true, "quote": quote })))
}

pub async fn buy(
    State(state): State<SharedState>,
    Path(market_id): Path<String>,
    Json(request): Json<TradeRequest>,
) -> ApiResult<Json<Value>> {
    trade(&state, &market_id, TradeIntent::buy(request.outcome, request.amount), &request)
}

pub async fn sell(
    State(state): State<SharedState>,
    Path(market_id): Path<String>,
    Json(request): Json<TradeRequest>,
) -> ApiResult<Json<Value>> {
    trade(&state, &market_id, TradeIntent::sell(request.outcome, request.amount), &request)
}

fn trade(state: &SharedState, market_id: &str, intent: TradeIntent, request: &TradeRequest) -> ApiResult<Json<Value>> {
    let mut app_state = lock(state)?;
    let receipt = app_state.manager.execute(market_id, &request.trader, &intent, request.min_out)?;

    let (emoji, action, units_in, units_out) = match intent.direction {
        TradeDirection::Buy => ("🎯", "BUY", "currency", "tokens"),
        TradeDirection::Sell => ("💸", "SELL", "tokens", "currency"),
    };
    app_state.log_activity(
        emoji,
        action,
        &format!(
            "{} {} {} {} → {} {} | market {}",
            request.trader,
            intent.outcome,
            receipt.fill.amount_in,
            units_in,
            receipt.fill.amount_out,
            units_out,
            market_id
        ),
    );

    let view = MarketView::new(app_state.manager.market(market_id)?, app_state.manager.now());
    Ok(Json(json!({ "success": true, "receipt": receipt, "market": view })))
}

// ===== SETTLEMENT =====

pub async fn settle_market(
    State(state): State<SharedState>,
    Path(market_id): Path<String>,
    Json(request): Json<SettleRequest>,
) -> ApiResult<Json<Value>> {
    let mut app_state = lock(&state)?;
    let winner = app_state.manager.settle(&market_id, &request.caller, request.observed_result)?;
    app_state.log_activity(
        "⚖️",
        "SETTLED",
        &format!("market {} | observed {} | {} wins", market_id, request.observed_result, winner),
    );
    let view = MarketView::new(app_state.manager.market(&market_id)?, app_state.manager.now());
    Ok(Json(json!({ "success": true, "winning_outcome": winner, "market": view })))
}

pub async fn redeem(
    State(state): State<SharedState>,
    Path(market_id): Path<String>,
    Json(request): Json<RedeemRequest>,
) -> ApiResult<Json<Value>> {
    let mut app_state = lock(&state)?;
    let receipt = app_state.manager.redeem_with_receipt(&market_id, &request.holder, request.amount)?;
    app_state.log_activity(
        "🏆",
        "REDEEM",
        &format!(
            "{} redeemed {} {} tokens → {} currency | market {}",
            request.holder,
            request.amount,
            receipt.redemption.winning_outcome,
            receipt.redemption.currency_out,
            market_id
        ),
    );
    Ok(Json(json!({ "success": true, "receipt": receipt })))
}

// ===== ACCOUNTS =====

pub async fn get_position(
    State(state): State<SharedState>,
    Path((market_id, holder)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let app_state = lock(&state)?;
    let position = app_state.manager.position(&market_id, &holder)?;
    Ok(Json(json!({ "success": true, "position": position })))
}

pub async fn get_balance(
    State(state): State<SharedState>,
    Path(owner): Path<String>,
) -> ApiResult<Json<Value>> {
    let app_state = lock(&state)?;
    let ledger = app_state.manager.ledger();
    let currency_mint = app_state.manager.currency_mint();
    let balance = ledger.balance_of(currency_mint, &owner).unwrap_or(0);
    let accounts: Vec<Value> = ledger
        .accounts_of(&owner)
        .into_iter()
        .map(|(mint, amount)| json!({ "mint": mint, "balance": amount }))
        .collect();
    Ok(Json(json!({
        "owner": owner,
        "currency_mint": currency_mint,
        "balance": balance,
        "accounts": accounts,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

pub async fn get_activity(
    State(state): State<SharedState>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<Value>> {
    let app_state = lock(&state)?;
    let activity = app_state.recent_activity(query.limit.unwrap_or(100));
    Ok(Json(json!({ "count": activity.len(), "activity": activity })))
}
