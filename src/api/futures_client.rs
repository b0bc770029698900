//! REST client for the Binance USDT-M futures API.
//!
//! Public endpoints (exchange info, klines) go out unsigned. Account and
//! order endpoints carry an HMAC-SHA256 signature over the query string plus
//! the `X-MBX-APIKEY` header.

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use crate::api::types::{AccountSnapshot, ExchangeInfo, OrderAck, SymbolInfo};
use crate::models::{Candle, Side, SymbolFilters, Timeframe};

const REST_BASE: &str = "https://fapi.binance.com";

type HmacSha256 = Hmac<Sha256>;

/// HTTP client bound to one API key pair.
#[derive(Debug, Clone)]
pub struct FuturesClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl FuturesClient {
    pub fn new(api_key: String, api_secret: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: REST_BASE.to_string(),
            api_key,
            api_secret,
        })
    }

    /// Build a client from `BINANCE_API_KEY` / `BINANCE_API_SECRET`.
    pub fn from_env() -> Result<Self> {
        let api_key =
            std::env::var("BINANCE_API_KEY").context("BINANCE_API_KEY must be set")?;
        let api_secret =
            std::env::var("BINANCE_API_SECRET").context("BINANCE_API_SECRET must be set")?;
        Self::new(api_key, api_secret)
    }

    /// Fetch the full instrument list with per-symbol filters.
    pub async fn exchange_info(&self) -> Result<ExchangeInfo> {
        let url = format!("{}/fapi/v1/exchangeInfo", self.base_url);
        let resp = self.http.get(&url).send().await.context("exchangeInfo request failed")?;
        let resp = check(resp, "exchangeInfo").await?;
        resp.json().await.context("failed to decode exchangeInfo response")
    }

    /// Fetch the most recent `limit` candles for one symbol and interval.
    /// The last row is the currently forming candle.
    pub async fn klines(&self, symbol: &str, timeframe: Timeframe, limit: u32) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/fapi/v1/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol,
            timeframe.as_interval(),
            limit
        );
        let resp = self.http.get(&url).send().await.context("klines request failed")?;
        let resp = check(resp, "klines").await?;
        let rows: Vec<Value> = resp.json().await.context("failed to decode klines response")?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            match parse_kline_row(row) {
                Some(candle) => candles.push(candle),
                None => bail!("malformed kline row for {symbol}: {row}"),
            }
        }
        Ok(candles)
    }

    /// Fetch the signed account snapshot.
    pub async fn account(&self) -> Result<AccountSnapshot> {
        let query = self.signed_query(String::new());
        let url = format!("{}/fapi/v2/account?{}", self.base_url, query);
        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .context("account request failed")?;
        let resp = check(resp, "account").await?;
        resp.json().await.context("failed to decode account response")
    }

    /// The signed position amount for one symbol; zero when the account has
    /// no line for it.
    pub async fn position_amt(&self, symbol: &str) -> Result<Decimal> {
        let account = self.account().await?;
        Ok(account
            .positions
            .iter()
            .find(|p| p.symbol == symbol)
            .map(|p| p.position_amt)
            .unwrap_or(Decimal::ZERO))
    }

    /// Look up the lot-size and tick filters for one symbol.
    pub async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        let info = self.exchange_info().await?;
        let entry = info
            .symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .with_context(|| format!("symbol {symbol} not found in exchange info"))?;
        filters_from(entry)
    }

    /// Place a market order and return the raw acknowledgement. The ack says
    /// nothing about fills; callers confirm by re-reading the position.
    pub async fn market_order(&self, symbol: &str, side: Side, quantity: Decimal) -> Result<OrderAck> {
        let params = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&newClientOrderId={}",
            symbol,
            side.as_str(),
            quantity,
            Uuid::new_v4()
        );
        let query = self.signed_query(params);
        let url = format!("{}/fapi/v1/order?{}", self.base_url, query);
        debug!(symbol = %symbol, side = %side, quantity = %quantity, "submitting market order");
        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .context("order request failed")?;
        let resp = check(resp, "order").await?;
        resp.json().await.context("failed to decode order response")
    }

    /// Append a timestamp and HMAC-SHA256 signature to a query string.
    fn signed_query(&self, params: String) -> String {
        let timestamp = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("timestamp={timestamp}")
        } else {
            format!("{params}&timestamp={timestamp}")
        };
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("{query}&signature={signature}")
    }
}

/// Surface non-2xx responses as errors carrying the status and body.
async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    bail!("{what} returned {status}: {body}")
}

/// Decode one kline row. The REST API encodes each candle as a JSON array
/// with numeric fields serialized as strings.
fn parse_kline_row(row: &Value) -> Option<Candle> {
    let arr = row.as_array()?;
    let open_time = Utc.timestamp_millis_opt(arr.first()?.as_i64()?).single()?;
    let field = |i: usize| arr.get(i)?.as_str()?.parse::<f64>().ok();
    Some(Candle {
        open_time,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    })
}

/// Extract lot-size bounds from a symbol's filter list. Market orders obey
/// MARKET_LOT_SIZE where present, falling back to LOT_SIZE.
fn filters_from(info: &SymbolInfo) -> Result<SymbolFilters> {
    let lot = info
        .filters
        .iter()
        .find(|f| f.filter_type == "MARKET_LOT_SIZE")
        .or_else(|| info.filters.iter().find(|f| f.filter_type == "LOT_SIZE"))
        .with_context(|| format!("no lot size filter for {}", info.symbol))?;

    let tick_size = info
        .filters
        .iter()
        .find(|f| f.filter_type == "PRICE_FILTER")
        .and_then(|f| f.tick_size)
        .unwrap_or(Decimal::ZERO);

    Ok(SymbolFilters {
        max_qty: lot.max_qty.with_context(|| format!("missing maxQty for {}", info.symbol))?,
        min_qty: lot.min_qty.with_context(|| format!("missing minQty for {}", info.symbol))?,
        step_size: lot
            .step_size
            .with_context(|| format!("missing stepSize for {}", info.symbol))?,
        tick_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::SymbolFilterEntry;
    use rust_decimal_macros::dec;

    fn lot_entry(filter_type: &str) -> SymbolFilterEntry {
        SymbolFilterEntry {
            filter_type: filter_type.to_string(),
            max_qty: Some(dec!(1000)),
            min_qty: Some(dec!(0.001)),
            step_size: Some(dec!(0.001)),
            tick_size: None,
        }
    }

    #[test]
    fn parses_kline_row() {
        let row = serde_json::json!([
            1700000000000i64,
            "100.0",
            "102.0",
            "99.5",
            "101.0",
            "300.0",
            1700000059999i64,
            "30000.0",
            10,
            "150.0",
            "15000.0",
            "0"
        ]);
        let candle = parse_kline_row(&row).unwrap();
        assert_eq!(candle.open_time.timestamp_millis(), 1700000000000);
        assert!((candle.open - 100.0).abs() < 1e-9);
        assert!((candle.high - 102.0).abs() < 1e-9);
        assert!((candle.low - 99.5).abs() < 1e-9);
        assert!((candle.close - 101.0).abs() < 1e-9);
        assert!((candle.volume - 300.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_kline_row() {
        assert!(parse_kline_row(&serde_json::json!({"not": "an array"})).is_none());
        assert!(parse_kline_row(&serde_json::json!([1700000000000i64, "100.0"])).is_none());
        assert!(parse_kline_row(&serde_json::json!([1700000000000i64, "x", "1", "1", "1", "1"]))
            .is_none());
    }

    #[test]
    fn prefers_market_lot_size() {
        let mut market = lot_entry("MARKET_LOT_SIZE");
        market.max_qty = Some(dec!(500));
        let info = SymbolInfo {
            symbol: "BTCUSDT".to_string(),
            status: "TRADING".to_string(),
            filters: vec![lot_entry("LOT_SIZE"), market],
        };
        let filters = filters_from(&info).unwrap();
        assert_eq!(filters.max_qty, dec!(500));
    }

    #[test]
    fn falls_back_to_lot_size() {
        let mut price = lot_entry("PRICE_FILTER");
        price.tick_size = Some(dec!(0.01));
        let info = SymbolInfo {
            symbol: "BTCUSDT".to_string(),
            status: "TRADING".to_string(),
            filters: vec![lot_entry("LOT_SIZE"), price],
        };
        let filters = filters_from(&info).unwrap();
        assert_eq!(filters.min_qty, dec!(0.001));
        assert_eq!(filters.tick_size, dec!(0.01));
    }

    #[test]
    fn missing_lot_filter_is_an_error() {
        let info = SymbolInfo {
            symbol: "BTCUSDT".to_string(),
            status: "TRADING".to_string(),
            filters: vec![],
        };
        assert!(filters_from(&info).is_err());
    }
}
