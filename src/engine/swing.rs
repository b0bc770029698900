//! Swing engine: short a pump after a confirmed rollback.
//!
//! At each control window boundary the engine snapshots the most recent
//! bearish candle and derives a pump level from its low. Once live trades
//! push the high above that level the engine watches for a rollback toward
//! the bear low and opens a short when it arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::analyzer;
use crate::api::{FuturesClient, TradeStream, STREAM_BASE};
use crate::engine::{exit_signal, next_control_window, Action};
use crate::models::{BearCandleSnapshot, PositionIntent, Side, StrategyMode};
use crate::retry::RetryPolicy;
use crate::trading::{OrderController, TradeConfig};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const PRICE_SENTINEL: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingState {
    Idle,
    WatchingPump,
    PositionOpen,
}

/// Signal levels derived from one control window's bear candle.
#[derive(Debug, Clone, Copy)]
struct WindowSignal {
    pump_level: f64,
    volume_qualified: bool,
    bear_low: f64,
}

/// Pure swing state machine. Consumes window snapshots and trade prices,
/// emits actions.
pub struct SwingDetector {
    config: TradeConfig,
    state: SwingState,
    current_high: f64,
    window: Option<WindowSignal>,
    next_window: i64,
    stop_loss: f64,
    take_profit: f64,
}

impl SwingDetector {
    pub fn new(config: TradeConfig) -> Self {
        Self {
            config,
            state: SwingState::Idle,
            current_high: PRICE_SENTINEL,
            window: None,
            next_window: 0,
            stop_loss: 0.0,
            take_profit: 0.0,
        }
    }

    pub fn state(&self) -> SwingState {
        self.state
    }

    /// Whether a new control window should be started at `now`. An open
    /// position freezes the window until it closes.
    pub fn window_due(&self, now: i64) -> bool {
        self.state != SwingState::PositionOpen && now >= self.next_window
    }

    /// Start a control window from a fresh bear-candle snapshot. The whole
    /// signal is replaced and a watch in progress is abandoned, but the
    /// running high survives: it only resets after a confirmed entry.
    pub fn begin_window(&mut self, now: i64, snapshot: Option<&BearCandleSnapshot>) {
        self.next_window = next_control_window(now, self.config.timeframe.seconds());
        if self.state == SwingState::WatchingPump {
            self.state = SwingState::Idle;
        }
        self.window = snapshot.map(|snap| WindowSignal {
            pump_level: snap.low * (1.0 + self.config.pump_height_pct * 0.01),
            volume_qualified: snap.volume > 0.0
                && snap.swing_max_volume / snap.volume >= self.config.volume_ratio,
            bear_low: snap.low,
        });
    }

    /// Consume one trade price.
    pub fn on_tick(&mut self, price: f64) -> Action {
        if self.state == SwingState::PositionOpen {
            return match exit_signal(price, self.stop_loss, self.take_profit) {
                Some(reason) => Action::Close(reason),
                None => Action::Hold,
            };
        }

        if price > self.current_high {
            self.current_high = price;
        }
        let Some(window) = self.window else {
            return Action::Hold;
        };

        match self.state {
            SwingState::Idle => {
                if self.current_high >= window.pump_level {
                    self.state = SwingState::WatchingPump;
                    info!(
                        price,
                        pump_level = window.pump_level,
                        "pump found, watching for rollback"
                    );
                }
                Action::Hold
            }
            SwingState::WatchingPump => {
                if window.volume_qualified
                    && analyzer::rollback_satisfied(
                        window.bear_low,
                        self.current_high,
                        price,
                        self.config.rollback_pct,
                    )
                {
                    Action::OpenShort {
                        price,
                        stop_loss: price * (1.0 + self.config.stop_loss_pct * 0.01),
                        take_profit: price * (1.0 - self.config.take_profit_pct * 0.01),
                    }
                } else {
                    Action::Hold
                }
            }
            SwingState::PositionOpen => Action::Hold,
        }
    }

    /// Record a confirmed entry.
    pub fn confirm_entry(&mut self, stop_loss: f64, take_profit: f64) {
        self.state = SwingState::PositionOpen;
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self.current_high = PRICE_SENTINEL;
        self.window = None;
    }

    /// Record a confirmed close.
    pub fn confirm_close(&mut self) {
        self.state = SwingState::Idle;
    }
}

/// Async driver: one per symbol, runs until shutdown.
pub struct SwingEngine {
    symbol: String,
    config: TradeConfig,
    client: Arc<FuturesClient>,
    controller: Arc<OrderController>,
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl SwingEngine {
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
        let mut detector = SwingDetector::new(self.config.clone());
        loop {
            if *self.shutdown.borrow() {
                return Ok(());
            }
            let mut stream = match TradeStream::connect(STREAM_BASE, &self.symbol).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(symbol = %self.symbol, error = %err, "trade stream connect failed");
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
                            info!(symbol = %self.symbol, "swing engine shutting down");
                            return Ok(());
                        }
                    }
                    event = stream.next() => {
                        let Some(event) = event else {
                            warn!(symbol = %self.symbol, "trade stream ended, reconnecting");
                            break;
                        };
                        if let Err(err) = self.process_tick(&mut detector, event.price).await {
                            error!(symbol = %self.symbol, error = %err, "tick processing failed");
                        }
                    }
                }
            }
        }
    }

    async fn process_tick(&self, detector: &mut SwingDetector, price: f64) -> Result<()> {
        let now = Utc::now().timestamp();
        if detector.window_due(now) {
            let snapshot = analyzer::last_bear_candle(
                &self.client,
                &self.symbol,
                self.config.timeframe,
                &self.retry,
            )
            .await?;
            detector.begin_window(now, snapshot.as_ref());
        }

        match detector.on_tick(price) {
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
                    mode: StrategyMode::Swing,
                    reason: "pump rollback",
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

    /// Sleep for `delay` unless shutdown arrives first. Returns true on
    /// shutdown.
    async fn sleep_or_shutdown(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = self.shutdown.changed() => *self.shutdown.borrow(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CloseReason;
    use chrono::TimeZone;

    fn snapshot(low: f64, volume: f64, swing_max: f64) -> BearCandleSnapshot {
        BearCandleSnapshot {
            low,
            volume,
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            swing_max_volume: swing_max,
        }
    }

    #[test]
    fn full_swing_entry_scenario() {
        // Bear low 100, pump height 1% puts the pump level at 101. The bear
        // candle's volume 100 against a window max of 400 gives ratio 4.
        let mut detector = SwingDetector::new(TradeConfig::default());
        detector.begin_window(0, Some(&snapshot(100.0, 100.0, 400.0)));
        assert_eq!(detector.state(), SwingState::Idle);

        assert_eq!(detector.on_tick(100.5), Action::Hold);
        assert_eq!(detector.state(), SwingState::Idle);

        // High reaches 102: pump found.
        assert_eq!(detector.on_tick(102.0), Action::Hold);
        assert_eq!(detector.state(), SwingState::WatchingPump);

        // Rollback target: 102 - (102 - 100) * 0.10 = 101.8.
        assert_eq!(detector.on_tick(101.9), Action::Hold);
        let action = detector.on_tick(101.5);
        match action {
            Action::OpenShort {
                price,
                stop_loss,
                take_profit,
            } => {
                assert!((price - 101.5).abs() < 1e-9);
                assert!((stop_loss - 101.5 * 1.01).abs() < 1e-9);
                assert!((take_profit - 101.5 * 0.99).abs() < 1e-9);
                detector.confirm_entry(stop_loss, take_profit);
            }
            other => panic!("expected OpenShort, got {other:?}"),
        }
        assert_eq!(detector.state(), SwingState::PositionOpen);

        // Stop loss hit.
        let action = detector.on_tick(101.5 * 1.01 + 0.01);
        assert_eq!(action, Action::Close(CloseReason::StopLoss));
        detector.confirm_close();
        assert_eq!(detector.state(), SwingState::Idle);
    }

    #[test]
    fn volume_unqualified_window_never_enters() {
        // Ratio 400/200 = 2 is below the default 3.
        let mut detector = SwingDetector::new(TradeConfig::default());
        detector.begin_window(0, Some(&snapshot(100.0, 200.0, 400.0)));
        assert_eq!(detector.on_tick(102.0), Action::Hold);
        assert_eq!(detector.state(), SwingState::WatchingPump);
        assert_eq!(detector.on_tick(95.0), Action::Hold);
    }

    #[test]
    fn empty_window_holds() {
        let mut detector = SwingDetector::new(TradeConfig::default());
        detector.begin_window(0, None);
        assert_eq!(detector.on_tick(102.0), Action::Hold);
        assert_eq!(detector.state(), SwingState::Idle);
    }

    #[test]
    fn new_window_abandons_watch() {
        let mut detector = SwingDetector::new(TradeConfig::default());
        detector.begin_window(0, Some(&snapshot(100.0, 100.0, 400.0)));
        detector.on_tick(102.0);
        assert_eq!(detector.state(), SwingState::WatchingPump);

        detector.begin_window(60, Some(&snapshot(110.0, 100.0, 400.0)));
        assert_eq!(detector.state(), SwingState::Idle);
        // The carried high of 102 sits below the new pump level of 111.1.
        assert_eq!(detector.on_tick(105.0), Action::Hold);
        assert_eq!(detector.state(), SwingState::Idle);
    }

    #[test]
    fn running_high_survives_window_boundaries() {
        let mut detector = SwingDetector::new(TradeConfig::default());
        detector.begin_window(0, Some(&snapshot(100.0, 100.0, 400.0)));
        detector.on_tick(102.0);
        assert_eq!(detector.state(), SwingState::WatchingPump);

        // Same pump level of 101 in the next window; the high of 102 from
        // the previous window still clears it without a fresh spike.
        detector.begin_window(60, Some(&snapshot(100.0, 100.0, 400.0)));
        assert_eq!(detector.state(), SwingState::Idle);
        detector.on_tick(100.5);
        assert_eq!(detector.state(), SwingState::WatchingPump);
    }

    #[test]
    fn open_position_freezes_windows() {
        let mut detector = SwingDetector::new(TradeConfig::default());
        detector.begin_window(0, Some(&snapshot(100.0, 100.0, 400.0)));
        detector.confirm_entry(102.0, 99.0);
        assert!(!detector.window_due(i64::MAX));
        detector.confirm_close();
        assert!(detector.window_due(61));
    }
}
