//! Capital tracking and the equity curve.

use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// Realised capital of one engine. Sizing always reads `initial_capital`.
#[derive(Debug, Clone, PartialEq)]
pub struct CapitalState {
    pub initial_capital: f64,
    pub current_capital: f64,
    pub peak_capital: f64,
    pub max_drawdown: f64,
}

impl CapitalState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            current_capital: initial_capital,
            peak_capital: initial_capital,
            max_drawdown: 0.0,
        }
    }

    /// Book a realised P&L and update the peak and the worst drawdown seen.
    pub fn apply_pnl(&mut self, pnl: f64) {
        self.current_capital += pnl;
        if self.current_capital > self.peak_capital {
            self.peak_capital = self.current_capital;
        }
        self.max_drawdown = self.max_drawdown.max(self.drawdown());
    }

    /// Current decline from peak as a fraction of the peak.
    pub fn drawdown(&self) -> f64 {
        if self.peak_capital > 0.0 {
            ((self.peak_capital - self.current_capital) / self.peak_capital).max(0.0)
        } else {
            0.0
        }
    }

    pub fn total_return(&self) -> f64 {
        if self.initial_capital > 0.0 {
            (self.current_capital - self.initial_capital) / self.initial_capital
        } else {
            0.0
        }
    }
}
