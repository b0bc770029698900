//! Domain types for candles, signals, positions, and trading filters.

mod candle;
mod filters;
mod position;
mod signal;

pub use candle::{Candle, Timeframe};
pub use filters::SymbolFilters;
pub use position::OpenPosition;
pub use signal::{
    BearCandleSnapshot, CloseReason, PositionIntent, Side, StopDiapason, StrategyMode,
};
