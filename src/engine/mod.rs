//! Per-symbol strategy engines.
//!
//! Each engine splits into a pure detector (state machine over market
//! events) and an async driver that feeds it from a stream and hands its
//! actions to the order controller.

mod knife;
mod swing;

pub use knife::{KnifeDetector, KnifeEngine, KnifeState};
pub use swing::{SwingDetector, SwingEngine, SwingState};

use crate::models::CloseReason;

/// What a detector wants done after consuming one market event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Hold,
    OpenShort {
        price: f64,
        stop_loss: f64,
        take_profit: f64,
    },
    Close(CloseReason),
}

/// Start of the next control window after `now`, aligned to the timeframe.
pub fn next_control_window(now: i64, timeframe_secs: i64) -> i64 {
    now - now % timeframe_secs + timeframe_secs
}

/// Exit test for an open short: stop loss above entry, take profit below.
pub fn exit_signal(price: f64, stop_loss: f64, take_profit: f64) -> Option<CloseReason> {
    if price >= stop_loss {
        Some(CloseReason::StopLoss)
    } else if price <= take_profit {
        Some(CloseReason::TakeProfit)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_window_alignment() {
        // 60s windows
        assert_eq!(next_control_window(0, 60), 60);
        assert_eq!(next_control_window(59, 60), 60);
        assert_eq!(next_control_window(60, 60), 120);
        assert_eq!(next_control_window(61, 60), 120);
        // 5m windows
        assert_eq!(next_control_window(301, 300), 600);
    }

    #[test]
    fn short_exit_signals() {
        assert_eq!(exit_signal(101.0, 101.0, 99.0), Some(CloseReason::StopLoss));
        assert_eq!(exit_signal(102.0, 101.0, 99.0), Some(CloseReason::StopLoss));
        assert_eq!(exit_signal(99.0, 101.0, 99.0), Some(CloseReason::TakeProfit));
        assert_eq!(exit_signal(98.5, 101.0, 99.0), Some(CloseReason::TakeProfit));
        assert_eq!(exit_signal(100.0, 101.0, 99.0), None);
    }
}
