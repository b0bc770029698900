//! Websocket market-data streams.
//!
//! One connection per symbol per stream. Malformed frames are logged and
//! skipped; a closed or failed connection ends the stream and the engine
//! driver reconnects.

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::api::types::{AggTradeEvent, KlineEvent, KlineTick};

pub const STREAM_BASE: &str = "wss://fstream.binance.com/ws";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Aggregated trade stream for one symbol.
pub struct TradeStream {
    inner: WsStream,
    symbol: String,
}

impl TradeStream {
    pub async fn connect(base: &str, symbol: &str) -> Result<Self> {
        let url = format!("{}/{}@aggTrade", base, symbol.to_lowercase());
        let (inner, _) = connect_async(&url)
            .await
            .with_context(|| format!("failed to connect trade stream for {symbol}"))?;
        debug!(symbol = %symbol, "trade stream connected");
        Ok(Self {
            inner,
            symbol: symbol.to_string(),
        })
    }

    /// Next trade event, or `None` when the connection is gone.
    pub async fn next(&mut self) -> Option<AggTradeEvent> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                    Ok(event) => return Some(event),
                    Err(err) => {
                        warn!(symbol = %self.symbol, error = %err, "skipping malformed trade frame");
                    }
                },
                Ok(Message::Ping(payload)) => {
                    if self.inner.send(Message::Pong(payload)).await.is_err() {
                        return None;
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }
}

/// One-minute kline stream for one symbol. Events arrive on every trade
/// while the candle is forming.
pub struct CandleStream {
    inner: WsStream,
    symbol: String,
}

impl CandleStream {
    pub async fn connect(base: &str, symbol: &str) -> Result<Self> {
        let url = format!("{}/{}@kline_1m", base, symbol.to_lowercase());
        let (inner, _) = connect_async(&url)
            .await
            .with_context(|| format!("failed to connect kline stream for {symbol}"))?;
        debug!(symbol = %symbol, "kline stream connected");
        Ok(Self {
            inner,
            symbol: symbol.to_string(),
        })
    }

    /// Next forming-candle tick, or `None` when the connection is gone.
    pub async fn next(&mut self) -> Option<KlineTick> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => match serde_json::from_str::<KlineEvent>(&text) {
                    Ok(event) => return Some(event.kline),
                    Err(err) => {
                        warn!(symbol = %self.symbol, error = %err, "skipping malformed kline frame");
                    }
                },
                Ok(Message::Ping(payload)) => {
                    if self.inner.send(Message::Pong(payload)).await.is_err() {
                        return None;
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }
}
