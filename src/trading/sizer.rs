//! Position sizing against exchange filters and account balance.

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::SymbolFilters;

/// Exchange minimum notional for a market order, in USDT.
const MIN_NOTIONAL_USDT: Decimal = dec!(5);

/// Compute an executable short quantity from a risk budget.
///
/// The raw quantity is `risk / stop_distance`, then clamped in order against
/// the exchange minimum-notional floor, the filter maximum, and the balance
/// ceiling, and finally snapped down to the step grid. Errors mean the trade
/// must not happen.
pub fn size_position(
    risk_usdt: Decimal,
    entry_price: Decimal,
    stop_loss: Decimal,
    take_profit: Decimal,
    filters: &SymbolFilters,
    balance: Decimal,
    leverage: u32,
    depo_load_pct: Decimal,
) -> Result<Decimal> {
    if filters.step_size <= Decimal::ZERO || filters.min_qty <= Decimal::ZERO {
        bail!("degenerate filters: step {} min {}", filters.step_size, filters.min_qty);
    }
    if entry_price <= Decimal::ZERO || take_profit <= Decimal::ZERO {
        bail!("non-positive price: entry {entry_price} take profit {take_profit}");
    }

    // Short entry: the stop sits above the entry.
    let stop_distance = stop_loss - entry_price;
    if stop_distance <= Decimal::ZERO {
        bail!("stop loss {stop_loss} not above entry {entry_price}");
    }
    if balance <= Decimal::ZERO {
        bail!("no balance to size against");
    }

    let raw = risk_usdt / stop_distance;

    // Smallest quantity whose notional at the take-profit price clears the
    // exchange minimum, plus one lot of headroom.
    let min_floor =
        ((MIN_NOTIONAL_USDT / take_profit) / filters.min_qty).floor() * filters.min_qty
            + filters.min_qty;

    // Largest quantity the account can carry at the configured load.
    let max_balance_qty = ((balance * Decimal::from(leverage) / entry_price * depo_load_pct
        / dec!(100))
        / filters.step_size)
        .floor()
        * filters.step_size;

    let sized = if raw < min_floor {
        filters.min_qty
    } else if raw > filters.max_qty {
        filters.max_qty
    } else if raw > max_balance_qty {
        max_balance_qty
    } else {
        (raw / filters.step_size).floor() * filters.step_size
    };

    if sized < filters.min_qty || sized > filters.max_qty {
        bail!("sized quantity {sized} outside [{}, {}]", filters.min_qty, filters.max_qty);
    }
    if sized % filters.step_size != Decimal::ZERO {
        bail!("sized quantity {sized} off the {} step grid", filters.step_size);
    }
    Ok(sized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters() -> SymbolFilters {
        SymbolFilters {
            max_qty: dec!(1000),
            min_qty: dec!(0.1),
            step_size: dec!(0.1),
            tick_size: dec!(0.01),
        }
    }

    #[test]
    fn snaps_to_step_grid() {
        // risk 1 / stop distance 0.03 = 33.33..., snapped down to 33.3
        let qty = size_position(
            dec!(1),
            dec!(10.00),
            dec!(10.03),
            dec!(9.90),
            &filters(),
            dec!(1000),
            20,
            dec!(70),
        )
        .unwrap();
        assert_eq!(qty, dec!(33.3));
    }

    #[test]
    fn stop_at_entry_is_an_error() {
        let result = size_position(
            dec!(1),
            dec!(10),
            dec!(10),
            dec!(9.9),
            &filters(),
            dec!(1000),
            20,
            dec!(70),
        );
        assert!(result.is_err());
    }

    #[test]
    fn clamps_to_filter_maximum() {
        // risk 100 / 0.01 = 10000, beyond max_qty, and the balance ceiling
        // (1M * 20 / 10 * 0.7 = 1.4M) is not binding.
        let qty = size_position(
            dec!(100),
            dec!(10.00),
            dec!(10.01),
            dec!(9.9),
            &filters(),
            dec!(1000000),
            20,
            dec!(70),
        )
        .unwrap();
        assert_eq!(qty, dec!(1000));
    }

    #[test]
    fn clamps_to_balance_ceiling() {
        // raw = 5 / 0.05 = 100. Ceiling: 10 * 20 / 10 * 0.7 = 14.0.
        let qty = size_position(
            dec!(5),
            dec!(10.00),
            dec!(10.05),
            dec!(9.9),
            &filters(),
            dec!(10),
            20,
            dec!(70),
        )
        .unwrap();
        assert_eq!(qty, dec!(14.0));
    }

    #[test]
    fn below_notional_floor_takes_min_qty() {
        // raw = 0.1 / 1 = 0.1; floor at take profit 9.9 is
        // floor((5/9.9)/0.1)*0.1 + 0.1 = 0.6, so raw falls below it.
        let qty = size_position(
            dec!(0.1),
            dec!(10.00),
            dec!(11.00),
            dec!(9.9),
            &filters(),
            dec!(1000),
            20,
            dec!(70),
        )
        .unwrap();
        assert_eq!(qty, filters().min_qty);
    }

    #[test]
    fn zero_step_is_an_error() {
        let mut bad = filters();
        bad.step_size = Decimal::ZERO;
        let result = size_position(
            dec!(1),
            dec!(10.00),
            dec!(10.03),
            dec!(9.9),
            &bad,
            dec!(1000),
            20,
            dec!(70),
        );
        assert!(result.is_err());
    }

    #[test]
    fn zero_balance_is_an_error() {
        let result = size_position(
            dec!(1),
            dec!(10.00),
            dec!(10.03),
            dec!(9.9),
            &filters(),
            Decimal::ZERO,
            20,
            dec!(70),
        );
        assert!(result.is_err());
    }
}
