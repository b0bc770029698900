//! Runtime trading parameters, assembled once at startup.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{StrategyMode, Timeframe};

/// All tunables shared by the engines, the sizer, and the order controller.
#[derive(Debug, Clone)]
pub struct TradeConfig {
    /// Signal timeframe for the swing strategy's control windows.
    pub timeframe: Timeframe,
    /// Percent rise above the bear-candle low (swing) or previous high
    /// (knife) that counts as a pump.
    pub pump_height_pct: f64,
    /// Stop loss distance above the short entry, in percent.
    pub stop_loss_pct: f64,
    /// Take profit distance below the short entry, in percent.
    pub take_profit_pct: f64,
    /// Risk budget per trade in USDT; divided by the stop distance to get a
    /// raw quantity.
    pub risk_usdt: Decimal,
    /// Account leverage assumed when computing the balance ceiling.
    pub leverage: u32,
    /// Maximum tolerated deposit load, and the share of balance a single
    /// position may consume, in percent.
    pub depo_load_pct: Decimal,
    /// Minimum ratio of reference volume to current volume for a pump to
    /// qualify.
    pub volume_ratio: f64,
    pub mode: StrategyMode,
    /// Swing only: percent of the pump's rise that must be given back before
    /// entry.
    pub rollback_pct: f64,
    /// Knife only: stop diapason width as a percent of price.
    pub stop_diap_pct: f64,
    /// Knife only: seconds price must dwell inside the diapason.
    pub stop_diap_secs: u64,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::M1,
            pump_height_pct: 1.0,
            stop_loss_pct: 1.0,
            take_profit_pct: 1.0,
            risk_usdt: dec!(1),
            leverage: 20,
            depo_load_pct: dec!(70),
            volume_ratio: 3.0,
            mode: StrategyMode::Swing,
            rollback_pct: 10.0,
            stop_diap_pct: 0.2,
            stop_diap_secs: 2,
        }
    }
}
