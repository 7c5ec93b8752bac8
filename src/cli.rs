//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::adapters::csv_adapter::{CsvCandleFeed, VecCandleFeed, list_markets};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::tracing_sink::TracingSink;
use crate::domain::candle::Candle;
use crate::domain::config_validation::{
    BacktestSettings, build_backtest_settings, build_risk_params, build_stats_config,
    build_strategy_config,
};
use crate::domain::engine::{Engine, RunResult, SimulationContext};
use crate::domain::error::TraderError;
use crate::domain::metrics::{Metrics, StatsConfig};
use crate::domain::position::ExitReason;
use crate::domain::risk::RiskParams;
use crate::domain::runner::{BacktestJob, run_live, run_parallel};
use crate::domain::strategy::{StrategyConfig, StrategyKind, build_strategy};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "scalptrader", about = "Rule-based scalping backtester and live simulator")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over a CSV file, or over every <market>.csv in a directory
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Report path; writes <stem>_trades.csv, <stem>_equity.csv and <stem>_summary.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Run every strategy kind side by side, configured kind included
        #[arg(long)]
        all_strategies: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Replay a CSV file candle by candle as a live feed; Ctrl-C stops the feed
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Stop after this many candles
        #[arg(long)]
        max_candles: Option<usize>,
        /// Pause between candles
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
        /// Leave an open position open instead of force-closing it
        #[arg(long)]
        keep_open: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List available strategies
    Strategies,
}

/// Default log filter for a `-v` count.
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            all_strategies,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, &data, output.as_deref(), all_strategies)
            }
        }
        Command::Simulate {
            config,
            data,
            max_candles,
            delay_ms,
            keep_open,
        } => run_simulate(&config, &data, max_candles, delay_ms, keep_open),
        Command::Validate { config } => run_dry_run(&config),
        Command::Strategies => {
            run_strategies();
            Ok(())
        }
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Everything a run needs from the config file.
pub struct RunConfig {
    pub settings: BacktestSettings,
    pub risk: RiskParams,
    pub strategy: StrategyConfig,
    pub stats: StatsConfig,
}

pub fn load_run_config(path: &Path) -> Result<RunConfig, TraderError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    Ok(RunConfig {
        settings: build_backtest_settings(&adapter)?,
        risk: build_risk_params(&adapter)?,
        strategy: build_strategy_config(&adapter)?,
        stats: build_stats_config(&adapter)?,
    })
}

fn context(config: &RunConfig, market: &str) -> SimulationContext {
    SimulationContext::new(market, config.risk.clone())
        .with_history_limit(config.settings.history_limit)
        .with_sink(Box::new(TracingSink))
}

fn load_candles(path: &Path, market: &str) -> Result<Arc<[Candle]>, TraderError> {
    let feed = VecCandleFeed::collect_from(CsvCandleFeed::open(path, market)?)?;
    if feed.is_empty() {
        return Err(TraderError::NoData {
            market: market.to_string(),
        });
    }
    Ok(Arc::clone(feed.candles()))
}

fn run_backtest(
    config_path: &Path,
    data: &Path,
    output: Option<&Path>,
    all_strategies: bool,
) -> Result<(), TraderError> {
    let config = load_run_config(config_path)?;

    let datasets: Vec<(String, PathBuf)> = if data.is_dir() {
        list_markets(data)?
            .into_iter()
            .map(|m| {
                let path = data.join(format!("{m}.csv"));
                (m, path)
            })
            .collect()
    } else {
        vec![(config.settings.market.clone(), data.to_path_buf())]
    };
    if datasets.is_empty() {
        return Err(TraderError::Data {
            reason: format!("no <market>.csv files in {}", data.display()),
        });
    }

    let strategies: Vec<StrategyConfig> = if all_strategies {
        StrategyKind::all()
            .into_iter()
            .map(|kind| {
                if kind == config.strategy.kind() {
                    config.strategy.clone()
                } else {
                    StrategyConfig::default_for(kind)
                }
            })
            .collect()
    } else {
        vec![config.strategy.clone()]
    };

    let mut jobs = Vec::with_capacity(datasets.len() * strategies.len());
    for (market, path) in &datasets {
        let candles = load_candles(path, market)?;
        eprintln!("Loaded {} candles for {}", candles.len(), market);
        for strategy in &strategies {
            jobs.push(BacktestJob {
                strategy: build_strategy(strategy),
                context: context(&config, market),
                candles: Arc::clone(&candles),
            });
        }
    }

    eprintln!(
        "Running {} backtest(s): {} market(s) x {} strategy(ies)",
        jobs.len(),
        datasets.len(),
        strategies.len()
    );

    let mut failures = 0usize;
    let mut last_error = None;
    let multiple = jobs.len() > 1;
    for result in run_parallel(jobs) {
        match result {
            Ok(result) => {
                let metrics = Metrics::compute(&result, &config.stats);
                print_summary(&result, &metrics);
                if let Some(output) = output {
                    let path = if multiple {
                        job_output_path(output, &result)
                    } else {
                        output.to_path_buf()
                    };
                    CsvReportAdapter::new().write(&result, &metrics, &path)?;
                    eprintln!("Report written to: {}", path.display());
                }
            }
            Err(e) => {
                eprintln!("warning: backtest failed: {e}");
                failures += 1;
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if failures == datasets.len() * strategies.len() => Err(e),
        _ => Ok(()),
    }
}

/// `out/run.csv` -> `out/run_<market>_<strategy>.csv`
fn job_output_path(output: &Path, result: &RunResult) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    output.with_file_name(format!("{stem}_{}_{}.csv", result.market, result.strategy))
}

fn print_summary(result: &RunResult, metrics: &Metrics) {
    eprintln!("\n=== {} / {} ===", result.market, result.strategy);
    eprintln!("Candles:          {}", result.candles_processed);
    eprintln!("Final Capital:    {:.2}", result.final_capital);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Avg Holding:      {:.0}s", metrics.avg_holding_seconds);
    let exits: Vec<String> = ExitReason::all()
        .into_iter()
        .map(|r| format!("{}={}", r, metrics.exits(r)))
        .collect();
    eprintln!("Exits:            {}", exits.join(", "));
    if result.skipped_candles > 0 || result.rejected_intents > 0 || !result.clamp_events.is_empty() {
        eprintln!(
            "Anomalies:        {} skipped candles, {} rejected intents, {} clamps",
            result.skipped_candles,
            result.rejected_intents,
            result.clamp_events.len()
        );
    }
    if metrics.max_drawdown_mismatch(1e-9) {
        eprintln!(
            "warning: tracked drawdown {:.4} exceeds equity-curve drawdown {:.4}",
            metrics.tracked_max_drawdown, metrics.max_drawdown
        );
    }
}

fn run_simulate(
    config_path: &Path,
    data: &Path,
    max_candles: Option<usize>,
    delay_ms: u64,
    keep_open: bool,
) -> Result<(), TraderError> {
    let config = load_run_config(config_path)?;
    let market = config.settings.market.clone();
    let mut engine = Engine::new(build_strategy(&config.strategy), context(&config, &market))?;

    let delay = Duration::from_millis(delay_ms);
    let mut feed = CsvCandleFeed::open(data, market.as_str())?.inspect(|_| {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    });
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::warn!("received interrupt, stopping feed");
        flag.store(true, Ordering::Relaxed);
    }) {
        tracing::warn!("failed to set Ctrl-C handler: {e}; the feed runs to completion");
    }

    eprintln!("Simulating {} with {}", market, engine.strategy_name());
    let summary = run_live(&mut engine, &mut feed, &cancel, max_candles)?;
    eprintln!("Feed stopped after {} candles ({:?})", summary.candles, summary.stop);

    if keep_open {
        match engine.position() {
            Some(p) => eprintln!(
                "Open position: {} {:.6} @ {:.4} since {}",
                p.side, p.size, p.entry_price, p.entry_timestamp
            ),
            None => eprintln!("No open position"),
        }
        eprintln!(
            "Closed trades: {}, capital {:.2}",
            engine.trades().len(),
            engine.manager().capital().current_capital
        );
        return Ok(());
    }

    let result = engine.finish()?;
    let metrics = Metrics::compute(&result, &config.stats);
    print_summary(&result, &metrics);
    Ok(())
}

pub fn run_dry_run(config_path: &Path) -> Result<(), TraderError> {
    let config = load_run_config(config_path)?;
    eprintln!("Config validated successfully");

    eprintln!("\nBacktest:");
    eprintln!("  market:           {}", config.settings.market);
    eprintln!("  history_limit:    {}", config.settings.history_limit);
    eprintln!("  periods_per_year: {}", config.stats.periods_per_year);
    eprintln!("  return_basis:     {:?}", config.stats.basis);

    let r = &config.risk;
    eprintln!("\nRisk:");
    eprintln!("  initial_capital:  {:.2}", r.initial_capital);
    eprintln!("  risk_per_trade:   {}", r.risk_per_trade);
    eprintln!("  stop / take:      {} / {}", r.stop_loss_pct, r.take_profit_pct);
    eprintln!("  price_risk_floor: {}", r.min_price_risk_floor);
    eprintln!("  max_position:     {}", r.max_position_fraction);
    eprintln!("  max_pnl_multiple: {}", r.max_pnl_multiple);
    eprintln!("  leverage:         {}", r.leverage);
    eprintln!("  drawdown_halt:    {}", r.max_drawdown_halt);
    eprintln!("  allow_shorting:   {}", r.allow_shorting);

    let strategy = build_strategy(&config.strategy);
    eprintln!("\nStrategy: {}", strategy.name());
    eprintln!("  {:?}", config.strategy);
    eprintln!("  lookback: {} candles", strategy.lookback());

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

fn run_strategies() {
    for kind in StrategyKind::all() {
        println!("{:<16} {}", kind.as_str(), kind.description());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_filter() {
        assert_eq!(log_filter(0), "warn");
        assert_eq!(log_filter(1), "info");
        assert_eq!(log_filter(2), "debug");
        assert_eq!(log_filter(7), "trace");
    }

    #[test]
    fn parses_backtest_arguments() {
        let cli = Cli::try_parse_from([
            "scalptrader",
            "-vv",
            "backtest",
            "--config",
            "c.ini",
            "--data",
            "d.csv",
            "--all-strategies",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Backtest {
                all_strategies,
                dry_run,
                output,
                ..
            } => {
                assert!(all_strategies);
                assert!(!dry_run);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn job_output_paths_are_distinct() {
        let result = RunResult {
            strategy: "ma_rsi".into(),
            market: "BTCUSDT".into(),
            initial_capital: 1.0,
            final_capital: 1.0,
            max_drawdown: 0.0,
            trades: vec![],
            equity_curve: vec![],
            clamp_events: vec![],
            rejected_intents: 0,
            skipped_candles: 0,
            candles_processed: 0,
        };
        assert_eq!(
            job_output_path(Path::new("out/run.csv"), &result),
            PathBuf::from("out/run_BTCUSDT_ma_rsi.csv")
        );
    }
}
