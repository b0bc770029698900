//! Per-symbol trading filters fetched from the exchange.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Quantity and price constraints for one instrument.
///
/// Treated as read-only and re-fetched on every sizing decision rather than
/// cached locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFilters {
    pub max_qty: Decimal,
    pub min_qty: Decimal,
    pub step_size: Decimal,
    pub tick_size: Decimal,
}
