//! CSV report adapter.
//!
//! For an output path `out/run.csv` it writes `out/run_trades.csv`,
//! `out/run_equity.csv` and `out/run_summary.csv`.

use crate::domain::engine::RunResult;
use crate::domain::error::TraderError;
use crate::domain::metrics::Metrics;
use crate::domain::position::{ExitReason, Trade};
use crate::domain::signal::Side;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct TradeRecord<'a> {
    market: &'a str,
    strategy: &'a str,
    side: Side,
    size: f64,
    entry_timestamp: NaiveDateTime,
    exit_timestamp: NaiveDateTime,
    entry_price: f64,
    exit_price: f64,
    pnl: f64,
    return_pct: f64,
    exit_reason: ExitReason,
    holding_seconds: i64,
}

impl<'a> TradeRecord<'a> {
    fn new(result: &'a RunResult, trade: &Trade) -> Self {
        Self {
            market: &result.market,
            strategy: &result.strategy,
            side: trade.side,
            size: trade.size,
            entry_timestamp: trade.entry_timestamp,
            exit_timestamp: trade.exit_timestamp,
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            pnl: trade.pnl,
            return_pct: trade.return_pct(),
            exit_reason: trade.exit_reason,
            holding_seconds: trade.holding_seconds(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SummaryRecord {
    metric: String,
    value: String,
}

fn summary_rows(result: &RunResult, metrics: &Metrics) -> Vec<SummaryRecord> {
    let mut rows = vec![
        ("market", result.market.clone()),
        ("strategy", result.strategy.clone()),
        ("initial_capital", format!("{:.2}", result.initial_capital)),
        ("final_capital", format!("{:.2}", result.final_capital)),
        ("total_return", format!("{:.6}", metrics.total_return)),
        ("annualized_return", format!("{:.6}", metrics.annualized_return)),
        ("max_drawdown", format!("{:.6}", metrics.max_drawdown)),
        ("tracked_max_drawdown", format!("{:.6}", metrics.tracked_max_drawdown)),
        ("max_drawdown_duration", metrics.max_drawdown_duration.to_string()),
        ("sharpe_ratio", format!("{:.4}", metrics.sharpe_ratio)),
        ("sortino_ratio", format!("{:.4}", metrics.sortino_ratio)),
        ("total_trades", metrics.total_trades.to_string()),
        ("trades_won", metrics.trades_won.to_string()),
        ("trades_lost", metrics.trades_lost.to_string()),
        ("trades_breakeven", metrics.trades_breakeven.to_string()),
        ("win_rate", format!("{:.4}", metrics.win_rate)),
        ("profit_factor", format!("{:.4}", metrics.profit_factor)),
        ("avg_win", format!("{:.2}", metrics.avg_win)),
        ("avg_loss", format!("{:.2}", metrics.avg_loss)),
        ("largest_win", format!("{:.2}", metrics.largest_win)),
        ("largest_loss", format!("{:.2}", metrics.largest_loss)),
        ("avg_holding_seconds", format!("{:.1}", metrics.avg_holding_seconds)),
        ("rejected_intents", result.rejected_intents.to_string()),
        ("skipped_candles", result.skipped_candles.to_string()),
        ("clamp_events", result.clamp_events.len().to_string()),
    ];
    for reason in ExitReason::all() {
        rows.push((reason.as_str(), metrics.exits(reason).to_string()));
    }
    rows.into_iter()
        .map(|(metric, value)| SummaryRecord {
            metric: metric.to_string(),
            value,
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// `<dir>/<stem>_<suffix>.csv` for the given output path.
    pub fn sibling_path(output_path: &Path, suffix: &str) -> PathBuf {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        output_path.with_file_name(format!("{stem}_{suffix}.csv"))
    }

    fn write_rows<T: Serialize>(
        path: &Path,
        rows: impl IntoIterator<Item = T>,
    ) -> Result<(), TraderError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &RunResult,
        metrics: &Metrics,
        output_path: &Path,
    ) -> Result<(), TraderError> {
        let trades_path = Self::sibling_path(output_path, "trades");
        let equity_path = Self::sibling_path(output_path, "equity");
        let summary_path = Self::sibling_path(output_path, "summary");

        Self::write_rows(
            &trades_path,
            result.trades.iter().map(|t| TradeRecord::new(result, t)),
        )?;
        Self::write_rows(&equity_path, result.equity_curve.iter().copied())?;
        Self::write_rows(&summary_path, summary_rows(result, metrics))?;

        tracing::info!(
            trades = %trades_path.display(),
            equity = %equity_path.display(),
            summary = %summary_path.display(),
            "report written"
        );
        Ok(())
    }
}
