//! Wire types for the Binance USDT-M futures REST and stream APIs.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

/// Numeric values the exchange encodes as JSON strings.
pub(crate) mod str_f64 {
    use super::*;

    pub fn deserialize<'de, D>(d: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Response from `/fapi/v1/exchangeInfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

/// One instrument from the exchange info list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilterEntry>,
}

/// One entry of an instrument's filter list; fields depend on `filter_type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFilterEntry {
    pub filter_type: String,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub max_qty: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub min_qty: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub step_size: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub tick_size: Option<Decimal>,
}

/// Account state from `/fapi/v2/account` (signed).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub can_trade: bool,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_margin_balance: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_maint_margin: Decimal,
    #[serde(default)]
    pub positions: Vec<AccountPosition>,
}

/// Per-symbol position line inside the account snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPosition {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub position_amt: Decimal,
}

/// Raw confirmation payload from `/fapi/v1/order` (signed).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub status: String,
}

/// Aggregated trade event from a `<symbol>@aggTrade` stream.
#[derive(Debug, Clone, Deserialize)]
pub struct AggTradeEvent {
    #[serde(rename = "s", default)]
    pub symbol: String,
    #[serde(rename = "p", with = "str_f64")]
    pub price: f64,
    #[serde(rename = "q", with = "str_f64")]
    pub quantity: f64,
    #[serde(rename = "T", default)]
    pub trade_time: i64,
}

/// Envelope of a `<symbol>@kline_1m` stream event.
#[derive(Debug, Clone, Deserialize)]
pub struct KlineEvent {
    #[serde(rename = "s", default)]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: KlineTick,
}

/// The forming candle inside a kline stream event.
#[derive(Debug, Clone, Deserialize)]
pub struct KlineTick {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "o", with = "str_f64")]
    pub open: f64,
    #[serde(rename = "h", with = "str_f64")]
    pub high: f64,
    #[serde(rename = "l", with = "str_f64")]
    pub low: f64,
    #[serde(rename = "c", with = "str_f64")]
    pub close: f64,
    #[serde(rename = "v", with = "str_f64")]
    pub volume: f64,
    /// Whether this candle is closed (no longer forming).
    #[serde(rename = "x", default)]
    pub closed: bool,
}
