//! Configuration validation and typed builders.
//!
//! Every builder validates before returning, so a run never starts with a
//! configuration the engine would reject.

use crate::domain::engine::DEFAULT_HISTORY_LIMIT;
use crate::domain::error::TraderError;
use crate::domain::metrics::{DEFAULT_PERIODS_PER_YEAR, ReturnBasis, StatsConfig};
use crate::domain::risk::RiskParams;
use crate::domain::strategy::band_scalping::BandScalpingParams;
use crate::domain::strategy::ma_rsi::MaRsiParams;
use crate::domain::strategy::mean_reversion::MeanReversionParams;
use crate::domain::strategy::multi_timeframe::MultiTimeframeParams;
use crate::domain::strategy::{StrategyConfig, StrategyKind};
use crate::ports::config_port::ConfigPort;

/// `[backtest]` values other than capital and statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub market: String,
    pub history_limit: usize,
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_market(config)?;
    validate_initial_capital(config)?;
    validate_periods_per_year(config)?;
    validate_risk_free_rate(config)?;
    validate_history_limit(config)?;
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    build_risk_params(config).map(|_| ())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    build_strategy_config(config).map(|_| ())
}

/// All three sections, in file order.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_backtest_config(config)?;
    validate_risk_config(config)?;
    validate_strategy_config(config)
}

fn validate_market(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_string("backtest", "market") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(TraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "market".to_string(),
        }),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double("backtest", "initial_capital", RiskParams::default().initial_capital)?;
    if !(value.is_finite() && value > 0.0) {
        return Err(TraderError::config_invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_periods_per_year(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double("backtest", "periods_per_year", DEFAULT_PERIODS_PER_YEAR)?;
    if !(value.is_finite() && value > 0.0) {
        return Err(TraderError::config_invalid(
            "backtest",
            "periods_per_year",
            "periods_per_year must be positive",
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.0)?;
    if !(0.0..1.0).contains(&value) {
        return Err(TraderError::config_invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_history_limit(config: &dyn ConfigPort) -> Result<(), TraderError> {
    read_period(config, "backtest", "history_limit", DEFAULT_HISTORY_LIMIT).map(|_| ())
}

fn read_period(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, TraderError> {
    let value = config.get_int(section, key, default as i64)?;
    if value <= 0 {
        return Err(TraderError::config_invalid(
            section,
            key,
            format!("{key} must be a positive integer"),
        ));
    }
    Ok(value as usize)
}

pub fn build_backtest_settings(config: &dyn ConfigPort) -> Result<BacktestSettings, TraderError> {
    validate_backtest_config(config)?;
    let market = config
        .get_string("backtest", "market")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let history_limit = read_period(config, "backtest", "history_limit", DEFAULT_HISTORY_LIMIT)?;
    Ok(BacktestSettings {
        market,
        history_limit,
    })
}

pub fn build_risk_params(config: &dyn ConfigPort) -> Result<RiskParams, TraderError> {
    let d = RiskParams::default();
    let params = RiskParams {
        initial_capital: config.get_double("backtest", "initial_capital", d.initial_capital)?,
        risk_per_trade: config.get_double("risk", "risk_per_trade", d.risk_per_trade)?,
        min_price_risk_floor: config.get_double("risk", "min_price_risk_floor", d.min_price_risk_floor)?,
        max_position_fraction: config.get_double(
            "risk",
            "max_position_fraction",
            d.max_position_fraction,
        )?,
        max_pnl_multiple: config.get_double("risk", "max_pnl_multiple", d.max_pnl_multiple)?,
        stop_loss_pct: config.get_double("risk", "stop_loss_pct", d.stop_loss_pct)?,
        take_profit_pct: config.get_double("risk", "take_profit_pct", d.take_profit_pct)?,
        leverage: config.get_double("risk", "leverage", d.leverage)?,
        max_drawdown_halt: config.get_double("risk", "max_drawdown_halt", d.max_drawdown_halt)?,
        allow_shorting: config.get_bool("risk", "allow_shorting", d.allow_shorting)?,
    };
    params.validate()?;
    Ok(params)
}

pub fn build_stats_config(config: &dyn ConfigPort) -> Result<StatsConfig, TraderError> {
    validate_periods_per_year(config)?;
    validate_risk_free_rate(config)?;
    let basis = match config.get_string("backtest", "return_basis").as_deref().map(str::trim) {
        None | Some("per_period") => ReturnBasis::PerPeriod,
        Some("per_trade") => ReturnBasis::PerTrade,
        Some(other) => {
            return Err(TraderError::config_invalid(
                "backtest",
                "return_basis",
                format!("unknown return_basis '{other}', expected per_period or per_trade"),
            ));
        }
    };
    Ok(StatsConfig {
        periods_per_year: config.get_double("backtest", "periods_per_year", DEFAULT_PERIODS_PER_YEAR)?,
        risk_free_rate: config.get_double("backtest", "risk_free_rate", 0.0)?,
        basis,
    })
}

/// Read `[strategy] kind` and the chosen variant's parameters. Missing
/// parameters take the variant's defaults.
pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, TraderError> {
    let kind: StrategyKind = config
        .get_string("strategy", "kind")
        .ok_or_else(|| TraderError::ConfigMissing {
            section: "strategy".to_string(),
            key: "kind".to_string(),
        })?
        .parse()?;

    let strategy = match kind {
        StrategyKind::MeanReversion => {
            let d = MeanReversionParams::default();
            StrategyConfig::MeanReversion(MeanReversionParams {
                rsi_period: read_period(config, "strategy", "rsi_period", d.rsi_period)?,
                oversold: config.get_double("strategy", "oversold", d.oversold)?,
                overbought: config.get_double("strategy", "overbought", d.overbought)?,
                exit_long_above: config.get_double("strategy", "exit_long_above", d.exit_long_above)?,
                exit_short_below: config.get_double("strategy", "exit_short_below", d.exit_short_below)?,
            })
        }
        StrategyKind::MaRsi => {
            let d = MaRsiParams::default();
            StrategyConfig::MaRsi(MaRsiParams {
                fast_period: read_period(config, "strategy", "fast_period", d.fast_period)?,
                slow_period: read_period(config, "strategy", "slow_period", d.slow_period)?,
                rsi_period: read_period(config, "strategy", "rsi_period", d.rsi_period)?,
                long_rsi_below: config.get_double("strategy", "long_rsi_below", d.long_rsi_below)?,
                short_rsi_above: config.get_double("strategy", "short_rsi_above", d.short_rsi_above)?,
            })
        }
        StrategyKind::BandScalping => {
            let d = BandScalpingParams::default();
            StrategyConfig::BandScalping(BandScalpingParams {
                bb_period: read_period(config, "strategy", "bb_period", d.bb_period)?,
                bb_stddev: config.get_double("strategy", "bb_stddev", d.bb_stddev)?,
                rsi_period: read_period(config, "strategy", "rsi_period", d.rsi_period)?,
                adx_period: read_period(config, "strategy", "adx_period", d.adx_period)?,
                adx_threshold: config.get_double("strategy", "adx_threshold", d.adx_threshold)?,
                min_adx: config.get_double("strategy", "min_adx", d.min_adx)?,
                squeeze_threshold: config.get_double("strategy", "squeeze_threshold", d.squeeze_threshold)?,
                min_score: config.get_int("strategy", "min_score", d.min_score as i64)? as i32,
                exit_band: config.get_double("strategy", "exit_band", d.exit_band)?,
                exit_rsi_long: config.get_double("strategy", "exit_rsi_long", d.exit_rsi_long)?,
                exit_rsi_short: config.get_double("strategy", "exit_rsi_short", d.exit_rsi_short)?,
            })
        }
        StrategyKind::MultiTimeframe => {
            let d = MultiTimeframeParams::default();
            StrategyConfig::MultiTimeframe(MultiTimeframeParams {
                timeframe_factor: read_period(config, "strategy", "timeframe_factor", d.timeframe_factor)?,
                trend_period: read_period(config, "strategy", "trend_period", d.trend_period)?,
                rsi_period: read_period(config, "strategy", "rsi_period", d.rsi_period)?,
                oversold: config.get_double("strategy", "oversold", d.oversold)?,
                overbought: config.get_double("strategy", "overbought", d.overbought)?,
                momentum_threshold: config.get_double(
                    "strategy",
                    "momentum_threshold",
                    d.momentum_threshold,
                )?,
            })
        }
    };
    strategy.validate()?;
    Ok(strategy)
}
