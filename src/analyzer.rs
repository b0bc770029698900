//! Candle analysis: instrument discovery, bear-candle snapshots, and the
//! rollback entry test.

use anyhow::Result;
use tracing::debug;

use crate::api::FuturesClient;
use crate::models::{BearCandleSnapshot, Candle, Timeframe};
use crate::retry::RetryPolicy;

/// Quote asset marker used to pick the instrument universe.
pub const QUOTE_MARKER: &str = "USDT";

/// All instruments quoted in USDT, in exchange order.
pub async fn instrument_universe(client: &FuturesClient) -> Result<Vec<String>> {
    let info = client.exchange_info().await?;
    let symbols: Vec<String> = info
        .symbols
        .into_iter()
        .map(|s| s.symbol)
        .filter(|s| s.contains(QUOTE_MARKER))
        .collect();
    debug!(count = symbols.len(), "instrument universe resolved");
    Ok(symbols)
}

/// Fetch the lookback window for `timeframe` and snapshot its most recent
/// bearish candle. `None` when the window holds no bearish candle.
pub async fn last_bear_candle(
    client: &FuturesClient,
    symbol: &str,
    timeframe: Timeframe,
    retry: &RetryPolicy,
) -> Result<Option<BearCandleSnapshot>> {
    let candles = retry
        .retry("klines", || client.klines(symbol, timeframe, timeframe.lookback()))
        .await?;
    Ok(bear_snapshot(&candles))
}

/// Fetch the most recent closed candle for `timeframe`. The last row of a
/// klines response is still forming, so this takes the one before it.
pub async fn last_closed_candle(
    client: &FuturesClient,
    symbol: &str,
    timeframe: Timeframe,
    retry: &RetryPolicy,
) -> Result<Option<Candle>> {
    let candles = retry
        .retry("klines", || client.klines(symbol, timeframe, 2))
        .await?;
    if candles.len() < 2 {
        return Ok(None);
    }
    Ok(candles.get(candles.len() - 2).copied())
}

/// Snapshot the most recent bearish candle in `candles` along with the
/// maximum volume seen from that candle onward.
pub fn bear_snapshot(candles: &[Candle]) -> Option<BearCandleSnapshot> {
    let bear = candles.iter().rev().find(|c| c.is_bearish())?;
    let swing_max_volume = candles
        .iter()
        .filter(|c| c.open_time >= bear.open_time)
        .fold(bear.volume, |max, c| max.max(c.volume));
    Some(BearCandleSnapshot {
        low: bear.low,
        volume: bear.volume,
        open_time: bear.open_time,
        swing_max_volume,
    })
}

/// Whether price has pulled back far enough from the window high toward the
/// bear-candle low to justify a short entry.
pub fn rollback_satisfied(bear_low: f64, current_high: f64, current_price: f64, rollback_pct: f64) -> bool {
    current_price <= current_high - (current_high - bear_low) * rollback_pct * 0.01
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candle(minute: u32, open: f64, close: f64, volume: f64) -> Candle {
        Candle {
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
            open,
            high: open.max(close) + 0.5,
            low: open.min(close) - 0.5,
            close,
            volume,
        }
    }

    #[test]
    fn snapshot_picks_most_recent_bear() {
        let candles = vec![
            candle(0, 100.0, 98.0, 500.0),
            candle(1, 98.0, 99.0, 200.0),
            candle(2, 99.0, 97.0, 300.0),
            candle(3, 97.0, 98.5, 800.0),
        ];
        let snapshot = bear_snapshot(&candles).unwrap();
        assert_eq!(snapshot.open_time.timestamp() % 3600, 2 * 60);
        assert!((snapshot.volume - 300.0).abs() < 1e-9);
        // max over the bear candle and everything after it
        assert!((snapshot.swing_max_volume - 800.0).abs() < 1e-9);
        assert!(snapshot.swing_max_volume >= snapshot.volume);
    }

    #[test]
    fn snapshot_none_without_bear_candle() {
        let candles = vec![candle(0, 100.0, 101.0, 500.0), candle(1, 101.0, 102.0, 200.0)];
        assert!(bear_snapshot(&candles).is_none());
        assert!(bear_snapshot(&[]).is_none());
    }

    #[test]
    fn bear_as_last_candle_covers_only_itself() {
        let candles = vec![candle(0, 100.0, 101.0, 900.0), candle(1, 101.0, 99.0, 250.0)];
        let snapshot = bear_snapshot(&candles).unwrap();
        assert!((snapshot.swing_max_volume - 250.0).abs() < 1e-9);
    }

    #[test]
    fn rollback_threshold() {
        // low 90, high 110, 10% rollback puts the target at 108.
        assert!(rollback_satisfied(90.0, 110.0, 95.0, 10.0));
        assert!(rollback_satisfied(90.0, 110.0, 108.0, 10.0));
        assert!(!rollback_satisfied(90.0, 110.0, 108.1, 10.0));
        assert!(!rollback_satisfied(90.0, 110.0, 110.0, 10.0));
    }
}
