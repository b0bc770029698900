//! Risk gates, position sizing, and order execution.

mod config;
mod controller;
mod sizer;

pub use config::TradeConfig;
pub use controller::{GateDecision, OrderController};
pub use sizer::size_position;
