//! Knife-catch engine: short a vertical pump once price stabilizes.
//!
//! The engine compares the forming one-minute candle against the previous
//! closed one. A qualifying pump arms a stop diapason around the current
//! price; if price is still inside it when the dwell expires, the short
//! opens. Leaving the bounds breaks the diapason and resets the hunt.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::analyzer;
use crate::api::{CandleStream, FuturesClient, KlineTick, STREAM_BASE};
use crate::engine::{exit_signal, next_control_window, Action};
use crate::models::{Candle, PositionIntent, Side, StopDiapason, StrategyMode, Timeframe};
use crate::retry::RetryPolicy;
use crate::trading::{OrderController, TradeConfig};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnifeState {
    Idle,
    PumpDetected,
    DiapasonArmed,
    PositionOpen,
}

/// Reference values from the previous closed candle.
#[derive(Debug, Clone, Copy)]
struct WindowBaseline {
    prev_high: f64,
    prev_volume: f64,
}

/// Pure knife-catch state machine over forming-candle ticks.
pub struct KnifeDetector {
    config: TradeConfig,
    state: KnifeState,
    baseline: Option<WindowBaseline>,
    volume_qualified: bool,
    pump_qualified: bool,
    diapason: Option<StopDiapason>,
    next_window: i64,
    stop_loss: f64,
    take_profit: f64,
}

impl KnifeDetector {
    pub fn new(config: TradeConfig) -> Self {
        Self {
            config,
            state: KnifeState::Idle,
            baseline: None,
            volume_qualified: false,
            pump_qualified: false,
            diapason: None,
            next_window: 0,
            stop_loss: 0.0,
            take_profit: 0.0,
        }
    }

    pub fn state(&self) -> KnifeState {
        self.state
    }

    pub fn window_due(&self, now: i64) -> bool {
        self.state != KnifeState::PositionOpen && now >= self.next_window
    }

    /// Start a control window against a fresh previous-candle baseline.
    pub fn begin_window(&mut self, now: i64, previous: Option<&Candle>) {
        self.next_window = next_control_window(now, self.config.timeframe.seconds());
        self.volume_qualified = false;
        self.pump_qualified = false;
        self.diapason = None;
        if self.state != KnifeState::PositionOpen {
            self.state = KnifeState::Idle;
        }
        self.baseline = previous.map(|c| WindowBaseline {
            prev_high: c.high,
            prev_volume: c.volume,
        });
    }

    /// Consume one forming-candle tick.
    pub fn on_candle(&mut self, tick: &KlineTick, now: i64) -> Action {
        if self.state == KnifeState::PositionOpen {
            return match exit_signal(tick.close, self.stop_loss, self.take_profit) {
                Some(reason) => Action::Close(reason),
                None => Action::Hold,
            };
        }
        let Some(baseline) = self.baseline else {
            return Action::Hold;
        };

        match self.state {
            KnifeState::Idle => {
                // Both qualifications latch once seen within the window.
                if !self.volume_qualified
                    && tick.volume > 0.0
                    && (baseline.prev_volume / tick.volume).floor() >= self.config.volume_ratio
                {
                    self.volume_qualified = true;
                }
                let pump_level = baseline.prev_high * (1.0 + self.config.pump_height_pct * 0.01);
                if !self.pump_qualified && tick.high >= pump_level {
                    self.pump_qualified = true;
                }
                if self.volume_qualified
                    && self.pump_qualified
                    && tick.open < tick.close
                    && tick.close > baseline.prev_high
                {
                    self.state = KnifeState::PumpDetected;
                    info!(close = tick.close, pump_level, "pump found, arming diapason");
                    // The diapason centers on the detecting tick's close.
                    return self.arm_diapason(tick.close, now);
                }
                Action::Hold
            }
            KnifeState::PumpDetected => self.arm_diapason(tick.close, now),
            KnifeState::DiapasonArmed => {
                let Some(diapason) = self.diapason else {
                    self.break_diapason();
                    return Action::Hold;
                };
                let inside = diapason.contains(tick.close);
                if diapason.expired(now) && inside {
                    Action::OpenShort {
                        price: tick.close,
                        stop_loss: tick.close * (1.0 + self.config.stop_loss_pct * 0.01),
                        take_profit: tick.close * (1.0 - self.config.take_profit_pct * 0.01),
                    }
                } else if !inside {
                    info!(close = tick.close, "stop diapason broken");
                    self.break_diapason();
                    Action::Hold
                } else {
                    Action::Hold
                }
            }
            KnifeState::PositionOpen => Action::Hold,
        }
    }

    fn arm_diapason(&mut self, center: f64, now: i64) -> Action {
        let diapason = StopDiapason::arm(
            center,
            self.config.stop_diap_pct,
            now,
            self.config.stop_diap_secs,
        );
        info!(
            center = diapason.center,
            lower = diapason.lower,
            upper = diapason.upper,
            "stop diapason armed"
        );
        self.diapason = Some(diapason);
        self.state = KnifeState::DiapasonArmed;
        Action::Hold
    }

    fn break_diapason(&mut self) {
        self.state = KnifeState::Idle;
        self.volume_qualified = false;
        self.pump_qualified = false;
        self.diapason = None;
    }

    pub fn confirm_entry(&mut self, stop_loss: f64, take_profit: f64) {
        self.state = KnifeState::PositionOpen;
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self.diapason = None;
    }

    pub fn confirm_close(&mut self) {
        self.state = KnifeState::Idle;
        self.volume_qualified = false;
        self.pump_qualified = false;
    }
}

/// Async driver: one per symbol, runs until shutdown.
pub struct KnifeEngine {
    symbol: String,
    config: TradeConfig,
    client: Arc<FuturesClient>,
    controller: Arc<OrderController>,
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl KnifeEngine {
    pub fn new(
        symbol: String,
        config: TradeConfig,
        client: Arc<FuturesClient>,
        controller: Arc<OrderController>,
        retry: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            symbol,
            config,
            client,
            controller,
            retry,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut detector = KnifeDetector::new(self.config.clone());
        loop {
            if *self.shutdown.borrow() {
                return Ok(());
            }
            let mut stream = match CandleStream::connect(STREAM_BASE, &self.symbol).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(symbol = %self.symbol, error = %err, "kline stream connect failed");
                    if self.sleep_or_shutdown(RECONNECT_DELAY).await {
                        return Ok(());
                    }
                    continue;
                }
            };

            loop {
                tokio::select! {
                    _ = self.shutdown.changed() => {
                        if *self.shutdown.borrow() {
                            info!(symbol = %self.symbol, "knife engine shutting down");
                            return Ok(());
                        }
                    }
                    tick = stream.next() => {
                        let Some(tick) = tick else {
                            warn!(symbol = %self.symbol, "kline stream ended, reconnecting");
                            break;
                        };
                        if let Err(err) = self.process_candle(&mut detector, &tick).await {
                            error!(symbol = %self.symbol, error = %err, "candle processing failed");
                        }
                    }
                }
            }
        }
    }

    async fn process_candle(&self, detector: &mut KnifeDetector, tick: &KlineTick) -> Result<()> {
        let now = Utc::now().timestamp();
        if detector.window_due(now) {
            // The baseline candle is always the last closed one-minute
            // candle, regardless of the configured signal timeframe.
            let previous =
                analyzer::last_closed_candle(&self.client, &self.symbol, Timeframe::M1, &self.retry)
                    .await?;
            detector.begin_window(now, previous.as_ref());
        }

        match detector.on_candle(tick, now) {
            Action::Hold => {}
            Action::OpenShort {
                price,
                stop_loss,
                take_profit,
            } => {
                let intent = PositionIntent {
                    symbol: self.symbol.clone(),
                    side: Side::Sell,
                    risk_usdt: self.config.risk_usdt,
                    entry_price: price,
                    stop_loss,
                    take_profit,
                    mode: StrategyMode::KnifeCatch,
                    reason: "pump stabilized in diapason",
                };
                if self.controller.open_market_position(&intent).await? {
                    detector.confirm_entry(stop_loss, take_profit);
                }
            }
            Action::Close(reason) => {
                if self
                    .controller
                    .close_market_position(&self.symbol, Side::Sell, reason)
                    .await?
                {
                    detector.confirm_close();
                }
            }
        }
        Ok(())
    }

    async fn sleep_or_shutdown(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = self.shutdown.changed() => *self.shutdown.borrow(),
        }
    }
}
