//! Signal-side types shared by the analyzer and the instrument engines.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Strategy variant, selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyMode {
    /// Short the pump once price rolls back from its high.
    Swing,
    /// Short the pump once price stabilizes inside a stop diapason.
    KnifeCatch,
}

impl FromStr for StrategyMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "swing" => Ok(StrategyMode::Swing),
            "knife" | "knife-catch" => Ok(StrategyMode::KnifeCatch),
            other => anyhow::bail!("unknown strategy mode: {other} (expected swing or knife)"),
        }
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyMode::Swing => f.write_str("swing"),
            StrategyMode::KnifeCatch => f.write_str("knife"),
        }
    }
}

/// Order side as the exchange spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// The offsetting side used to flatten a position.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an open position is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::StopLoss => f.write_str("stop loss"),
            CloseReason::TakeProfit => f.write_str("take profit"),
        }
    }
}

/// The most recent bearish candle in a lookback window, plus the maximum
/// volume observed from that candle onward.
///
/// Invariant: `swing_max_volume >= volume`, since the window always includes
/// the bear candle itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BearCandleSnapshot {
    pub low: f64,
    pub volume: f64,
    pub open_time: DateTime<Utc>,
    pub swing_max_volume: f64,
}

/// Price range the knife-catch engine uses to confirm stabilization before
/// entry. Lives only inside one engine instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopDiapason {
    pub center: f64,
    pub upper: f64,
    pub lower: f64,
    /// Epoch seconds when the diapason was armed.
    pub armed_at: i64,
    /// Epoch seconds after which a price still inside the bounds qualifies.
    pub expires_at: i64,
}

impl StopDiapason {
    /// Arm a diapason centered on `center`, `width_pct` percent of price
    /// wide, expiring `dwell_secs` from `armed_at`.
    pub fn arm(center: f64, width_pct: f64, armed_at: i64, dwell_secs: u64) -> Self {
        let width = center * width_pct * 0.01;
        Self {
            center,
            upper: center + width * 0.5,
            lower: center - width * 0.5,
            armed_at,
            expires_at: armed_at + dwell_secs as i64,
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.lower && price <= self.upper
    }

    pub fn expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// A request to open a position, produced by an engine and consumed by the
/// order controller.
///
/// Carries the risk budget rather than a quantity: the executable quantity
/// only exists once the sizer has consulted live filters and balance.
#[derive(Debug, Clone)]
pub struct PositionIntent {
    pub symbol: String,
    pub side: Side,
    pub risk_usdt: Decimal,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub mode: StrategyMode,
    pub reason: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!("swing".parse::<StrategyMode>().unwrap(), StrategyMode::Swing);
        assert_eq!("knife".parse::<StrategyMode>().unwrap(), StrategyMode::KnifeCatch);
        assert_eq!(
            "Knife-Catch".parse::<StrategyMode>().unwrap(),
            StrategyMode::KnifeCatch
        );
        assert!("martingale".parse::<StrategyMode>().is_err());
    }

    #[test]
    fn diapason_bounds() {
        // 0.2% of 103 is 0.206, half of it on either side of the center.
        let diap = StopDiapason::arm(103.0, 0.2, 100, 2);
        assert!((diap.upper - 103.103).abs() < 1e-9);
        assert!((diap.lower - 102.897).abs() < 1e-9);
        assert_eq!(diap.expires_at, 102);

        assert!(diap.contains(103.0));
        assert!(diap.contains(102.9));
        assert!(!diap.contains(103.2));
        assert!(!diap.contains(102.8));

        assert!(!diap.expired(101));
        assert!(diap.expired(102));
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Sell.opposite(), Side::Buy);
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.as_str(), "SELL");
    }
}
