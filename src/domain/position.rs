//! Open positions and closed trades.

use crate::domain::candle::Candle;
use crate::domain::signal::Side;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    ForcedClose,
}

impl ExitReason {
    pub fn all() -> [ExitReason; 4] {
        [
            ExitReason::Signal,
            ExitReason::StopLoss,
            ExitReason::TakeProfit,
            ExitReason::ForcedClose,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::ForcedClose => "forced_close",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub size: f64,
    pub entry_timestamp: NaiveDateTime,
    pub stop_loss_price: Option<f64>,
    pub take_profit_price: Option<f64>,
    /// Capital at risk when the position was sized; bounds the trade's P&L.
    pub risk_amount: f64,
    pub margin: f64,
}

impl Position {
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size * self.side.sign()
    }

    /// Fill price if the candle's range touched the stop. A candle that opens
    /// beyond the stop fills at the open.
    pub fn stop_fill(&self, candle: &Candle) -> Option<f64> {
        let stop = self.stop_loss_price?;
        match self.side {
            Side::Long if candle.low <= stop => Some(candle.open.min(stop)),
            Side::Short if candle.high >= stop => Some(candle.open.max(stop)),
            _ => None,
        }
    }

    /// Fill price if the candle's range touched the take-profit. A candle
    /// that opens beyond the target fills at the open.
    pub fn take_profit_fill(&self, candle: &Candle) -> Option<f64> {
        let target = self.take_profit_price?;
        match self.side {
            Side::Long if candle.high >= target => Some(candle.open.max(target)),
            Side::Short if candle.low <= target => Some(candle.open.min(target)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub side: Side,
    pub size: f64,
    pub entry_timestamp: NaiveDateTime,
    pub exit_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn holding_seconds(&self) -> i64 {
        (self.exit_timestamp - self.entry_timestamp).num_seconds()
    }

    /// P&L relative to the entry notional.
    pub fn return_pct(&self) -> f64 {
        let notional = self.entry_price * self.size;
        if notional > 0.0 {
            self.pnl / notional
        } else {
            0.0
        }
    }
}
