//! Order controller: account gates, sizing, and confirmed open/close.
//!
//! Every trade decision is fail-closed. An order acknowledgement is never
//! trusted; the only proof of an open or closed position is the position
//! amount the exchange reports afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api::FuturesClient;
use crate::models::{CloseReason, OpenPosition, PositionIntent, Side};
use crate::retry::RetryPolicy;
use crate::trading::config::TradeConfig;
use crate::trading::sizer::size_position;

/// Outcome of the pre-trade account gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    TradingDisabled,
    InsufficientFunds,
    DepositOverloaded,
}

impl GateDecision {
    pub fn allowed(self) -> bool {
        matches!(self, GateDecision::Allowed)
    }
}

/// Shared controller: one instance serves every engine.
pub struct OrderController {
    client: Arc<FuturesClient>,
    config: TradeConfig,
    retry: RetryPolicy,
    open_positions: Mutex<HashMap<String, OpenPosition>>,
}

impl OrderController {
    pub fn new(client: Arc<FuturesClient>, config: TradeConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
            open_positions: Mutex::new(HashMap::new()),
        }
    }

    /// The recorded open position for a symbol, if any.
    pub async fn open_position(&self, symbol: &str) -> Option<OpenPosition> {
        self.open_positions.lock().await.get(symbol).cloned()
    }

    /// Run the account gates against a fresh snapshot and return the
    /// decision together with the margin balance the sizer should use.
    pub async fn check_trading_conditions(
        &self,
        symbol: &str,
        requested_risk: Decimal,
    ) -> Result<(GateDecision, Decimal)> {
        let account = {
            let client = Arc::clone(&self.client);
            self.retry
                .retry("account", move || {
                    let client = Arc::clone(&client);
                    async move { client.account().await }
                })
                .await?
        };
        let decision = evaluate_gates(
            account.can_trade,
            account.total_margin_balance,
            account.total_maint_margin,
            requested_risk,
            self.config.depo_load_pct,
        );
        if !decision.allowed() {
            warn!(symbol = %symbol, decision = ?decision, "trade blocked by account gate");
        }
        Ok((decision, account.total_margin_balance))
    }

    /// Open a market position for an intent. Returns `Ok(true)` only after
    /// the exchange reports a non-zero position amount for the symbol.
    pub async fn open_market_position(&self, intent: &PositionIntent) -> Result<bool> {
        let (decision, balance) = self
            .check_trading_conditions(&intent.symbol, intent.risk_usdt)
            .await?;
        if !decision.allowed() {
            return Ok(false);
        }

        let filters = {
            let client = Arc::clone(&self.client);
            let symbol = intent.symbol.clone();
            self.retry
                .retry("symbol filters", move || {
                    let client = Arc::clone(&client);
                    let symbol = symbol.clone();
                    async move { client.symbol_filters(&symbol).await }
                })
                .await?
        };

        let entry = decimal_price(intent.entry_price)?;
        let stop_loss = decimal_price(intent.stop_loss)?;
        let take_profit = decimal_price(intent.take_profit)?;

        let quantity = match size_position(
            intent.risk_usdt,
            entry,
            stop_loss,
            take_profit,
            &filters,
            balance,
            self.config.leverage,
            self.config.depo_load_pct,
        ) {
            Ok(quantity) => quantity,
            Err(err) => {
                warn!(symbol = %intent.symbol, error = %err, "sizing rejected the trade");
                return Ok(false);
            }
        };

        if let Err(err) = self
            .client
            .market_order(&intent.symbol, intent.side, quantity)
            .await
        {
            warn!(symbol = %intent.symbol, error = %err, "entry order failed");
            return Ok(false);
        }

        // Confirmation: the observed position, not the order ack.
        let amt = {
            let client = Arc::clone(&self.client);
            let symbol = intent.symbol.clone();
            self.retry
                .retry("position amount", move || {
                    let client = Arc::clone(&client);
                    let symbol = symbol.clone();
                    async move { client.position_amt(&symbol).await }
                })
                .await?
        };
        if amt == Decimal::ZERO {
            warn!(symbol = %intent.symbol, "entry order acknowledged but no position observed");
            return Ok(false);
        }

        let position = OpenPosition {
            symbol: intent.symbol.clone(),
            quantity: amt.abs(),
            stop_loss: intent.stop_loss,
            take_profit: intent.take_profit,
        };
        self.open_positions
            .lock()
            .await
            .insert(intent.symbol.clone(), position);
        info!(
            symbol = %intent.symbol,
            side = %intent.side,
            quantity = %amt.abs(),
            entry = intent.entry_price,
            stop_loss = intent.stop_loss,
            take_profit = intent.take_profit,
            reason = intent.reason,
            "position opened"
        );
        Ok(true)
    }

    /// Flatten the recorded position for a symbol. Returns `Ok(true)` only
    /// after the exchange reports a zero position amount. Idempotent: with
    /// no recorded position this is a no-op that returns `Ok(false)`.
    pub async fn close_market_position(
        &self,
        symbol: &str,
        entry_side: Side,
        reason: CloseReason,
    ) -> Result<bool> {
        let position = {
            let table = self.open_positions.lock().await;
            table.get(symbol).cloned()
        };
        let Some(position) = position else {
            warn!(symbol = %symbol, "close requested with no recorded position");
            return Ok(false);
        };

        if let Err(err) = self
            .client
            .market_order(symbol, entry_side.opposite(), position.quantity)
            .await
        {
            warn!(symbol = %symbol, error = %err, "close order failed");
            return Ok(false);
        }

        let amt = {
            let client = Arc::clone(&self.client);
            let symbol = symbol.to_string();
            self.retry
                .retry("position amount", move || {
                    let client = Arc::clone(&client);
                    let symbol = symbol.clone();
                    async move { client.position_amt(&symbol).await }
                })
                .await?
        };
        if amt != Decimal::ZERO {
            warn!(symbol = %symbol, remaining = %amt, "close order sent but position remains");
            return Ok(false);
        }

        self.open_positions.lock().await.remove(symbol);
        info!(symbol = %symbol, reason = %reason, "position closed");
        Ok(true)
    }
}

/// The three fail-closed account gates, in order.
fn evaluate_gates(
    can_trade: bool,
    balance: Decimal,
    maint_margin: Decimal,
    requested_risk: Decimal,
    max_load_pct: Decimal,
) -> GateDecision {
    if !can_trade {
        return GateDecision::TradingDisabled;
    }
    if balance <= Decimal::ZERO || balance < requested_risk {
        return GateDecision::InsufficientFunds;
    }
    // Strictly above the limit; a load exactly at it still trades.
    let load = (maint_margin / (balance * dec!(0.01))).round_dp(2);
    if load > max_load_pct {
        return GateDecision::DepositOverloaded;
    }
    GateDecision::Allowed
}

fn decimal_price(value: f64) -> Result<Decimal> {
    Decimal::try_from(value).map_err(|err| anyhow::anyhow!("price {value} not representable: {err}"))
}
