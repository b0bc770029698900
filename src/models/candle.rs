//! Candle data and the supported analysis timeframes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV candle as returned by the exchange.
///
/// Immutable once produced; the analyzer recomputes everything derived from
/// candles on every evaluation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// A bearish candle closes below its open.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// A bullish candle closes above its open.
    pub fn is_bullish(&self) -> bool {
        self.open < self.close
    }
}

/// Supported analysis timeframes.
///
/// Anything outside this set is a fatal configuration error: parsing fails
/// before any engine starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
}

impl Timeframe {
    /// Timeframe length in minutes.
    pub fn minutes(self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
        }
    }

    /// Timeframe length in seconds, for control-window arithmetic.
    pub fn seconds(self) -> i64 {
        self.minutes() as i64 * 60
    }

    /// Number of history candles to fetch when looking for the last bearish
    /// candle. Shorter timeframes get a shorter lookback: the pattern is
    /// short-lived.
    pub fn lookback(self) -> u32 {
        match self {
            Timeframe::M1 => 50,  // ~50 minutes
            Timeframe::M5 => 48,  // ~4 hours
            Timeframe::M15 => 48, // ~12 hours
        }
    }

    /// Interval token understood by the exchange API.
    pub fn as_interval(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
        }
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            other => anyhow::bail!("unsupported timeframe: {other} (expected 1m, 5m or 15m)"),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn timeframe_parsing() {
        assert_eq!("1m".parse::<Timeframe>().unwrap(), Timeframe::M1);
        assert_eq!("5m".parse::<Timeframe>().unwrap(), Timeframe::M5);
        assert_eq!("15m".parse::<Timeframe>().unwrap(), Timeframe::M15);
        assert!("4h".parse::<Timeframe>().is_err());
        assert!("".parse::<Timeframe>().is_err());
    }

    #[test]
    fn timeframe_minutes() {
        assert_eq!(Timeframe::M1.minutes(), 1);
        assert_eq!(Timeframe::M5.minutes(), 5);
        assert_eq!(Timeframe::M15.minutes(), 15);
        assert_eq!(Timeframe::M5.seconds(), 300);
    }

    #[test]
    fn shorter_timeframe_never_gets_longer_wall_clock_lookback() {
        let m1 = Timeframe::M1.lookback() * Timeframe::M1.minutes();
        let m5 = Timeframe::M5.lookback() * Timeframe::M5.minutes();
        let m15 = Timeframe::M15.lookback() * Timeframe::M15.minutes();
        assert!(m1 < m5 && m5 < m15);
    }

    #[test]
    fn candle_direction() {
        let mut candle = Candle {
            open_time: Utc::now(),
            open: 100.0,
            high: 105.0,
            low: 99.0,
            close: 101.0,
            volume: 10.0,
        };
        assert!(candle.is_bullish());
        assert!(!candle.is_bearish());

        candle.close = 99.5;
        assert!(candle.is_bearish());
    }
}
