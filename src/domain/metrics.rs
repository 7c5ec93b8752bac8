//! Performance metrics and statistics over a finished run.

use crate::domain::capital::EquityPoint;
use crate::domain::engine::RunResult;
use crate::domain::position::{ExitReason, Trade};
use std::collections::HashMap;

pub const DEFAULT_PERIODS_PER_YEAR: f64 = 365.0;

/// Which return series the risk-adjusted ratios are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnBasis {
    /// Candle-to-candle returns of the equity curve.
    #[default]
    PerPeriod,
    /// Each trade's P&L relative to capital before it closed.
    PerTrade,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsConfig {
    /// Annualisation factor: candles per year, or trades per year for
    /// [`ReturnBasis::PerTrade`].
    pub periods_per_year: f64,
    /// Annual risk-free rate.
    pub risk_free_rate: f64,
    pub basis: ReturnBasis,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            risk_free_rate: 0.0,
            basis: ReturnBasis::PerPeriod,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    /// Recomputed from the mark-to-market equity curve.
    pub max_drawdown: f64,
    /// Longest run of periods spent below a prior peak.
    pub max_drawdown_duration: usize,
    /// Realised drawdown tracked by the engine while trading.
    pub tracked_max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_seconds: f64,
    pub exit_reasons: HashMap<ExitReason, usize>,
}

impl Metrics {
    pub fn compute(result: &RunResult, config: &StatsConfig) -> Self {
        let equity_curve = &result.equity_curve;
        let trades = &result.trades;
        let initial_capital = result.initial_capital;

        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(result.final_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let years = equity_curve.len() as f64 / config.periods_per_year;
        let annualized_return = if years > 0.0 && total_return.is_finite() && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let returns = match config.basis {
            ReturnBasis::PerPeriod => period_returns(equity_curve),
            ReturnBasis::PerTrade => trade_returns(trades, initial_capital),
        };
        let period_rf = if config.periods_per_year > 0.0 {
            config.risk_free_rate / config.periods_per_year
        } else {
            0.0
        };
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(&returns, period_rf, config.periods_per_year);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_holding_seconds = 0i64;
        let mut exit_reasons: HashMap<ExitReason, usize> =
            ExitReason::all().into_iter().map(|r| (r, 0)).collect();

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                if pnl > largest_win {
                    largest_win = pnl;
                }
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                if pnl.abs() > largest_loss {
                    largest_loss = pnl.abs();
                }
            } else {
                trades_breakeven += 1;
            }

            total_holding_seconds += trade.holding_seconds();
            *exit_reasons.entry(trade.exit_reason).or_default() += 1;
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let avg_holding_seconds = if total_trades > 0 {
            total_holding_seconds as f64 / total_trades as f64
        } else {
            0.0
        };

        Metrics {
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            total_return,
            annualized_return,
            max_drawdown,
            max_drawdown_duration,
            tracked_max_drawdown: result.max_drawdown,
            sharpe_ratio,
            sortino_ratio,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_holding_seconds,
            exit_reasons,
        }
    }

    pub fn exits(&self, reason: ExitReason) -> usize {
        self.exit_reasons.get(&reason).copied().unwrap_or(0)
    }

    /// True when the engine's realised drawdown exceeds the one recomputed
    /// from the equity curve by more than `tolerance`. The curve is marked
    /// to market and so never shows less drawdown than realised capital.
    pub fn max_drawdown_mismatch(&self, tolerance: f64) -> bool {
        self.tracked_max_drawdown - self.max_drawdown > tolerance
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}

fn period_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev > 0.0 {
                (curr - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

fn trade_returns(trades: &[Trade], initial_capital: f64) -> Vec<f64> {
    let mut capital = initial_capital;
    trades
        .iter()
        .map(|t| {
            let r = if capital > 0.0 { t.pnl / capital } else { 0.0 };
            capital += t.pnl;
            r
        })
        .collect()
}

fn compute_risk_adjusted(returns: &[f64], period_rf: f64, periods_per_year: f64) -> (f64, f64) {
    if returns.len() < 2 || periods_per_year <= 0.0 {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;

    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let excess_return = mean - period_rf;
    let annualisation = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * annualisation
    } else {
        0.0
    };

    let downside_sum: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sum / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * annualisation
    } else {
        0.0
    };

    (sharpe, sortino)
}
