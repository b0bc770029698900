//! Open-position bookkeeping owned by the order controller.

use rust_decimal::Decimal;

/// A confirmed open position, keyed by symbol in the controller's table.
///
/// At most one exists per symbol at a time. The entry is created only after
/// the exchange reports a non-zero position and removed only after it reports
/// zero again. No on-disk persistence: a process restart loses track of it.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub symbol: String,
    pub quantity: Decimal,
    pub stop_loss: f64,
    pub take_profit: f64,
}
