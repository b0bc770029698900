//! Exchange gateway: REST client, websocket streams, and wire types.

mod futures_client;
mod stream;
mod types;

pub use futures_client::FuturesClient;
pub use stream::{CandleStream, TradeStream, STREAM_BASE};
pub use types::KlineTick;
