//! Trading strategies.
//!
//! A strategy owns its indicator state and turns each candle into a
//! [`Signal`]. The engine calls, once per candle and in order:
//!
//! 1. [`Strategy::compute_indicators`] with the trailing history;
//! 2. [`Strategy::generate_signal`] with the resulting snapshot and the
//!    current position, unless a stop or take-profit already fired.
//!
//! Adding a strategy means a new module, a [`StrategyKind`] variant, a
//! [`StrategyConfig`] variant and an arm in [`build_strategy`].

pub mod band_scalping;
pub mod ma_rsi;
pub mod mean_reversion;
pub mod multi_timeframe;

pub use band_scalping::{BandScalping, BandScalpingParams};
pub use ma_rsi::{MaRsiConfluence, MaRsiParams};
pub use mean_reversion::{MeanReversionParams, MeanReversionRsi};
pub use multi_timeframe::{MultiTimeframeParams, MultiTimeframeScalping};

use crate::domain::candle::Candle;
use crate::domain::error::TraderError;
use crate::domain::indicator::{IndicatorBank, IndicatorSnapshot};
use crate::domain::signal::{PositionSide, Signal};
use std::fmt;
use std::str::FromStr;

pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Trailing candles this strategy reads from `history`.
    fn lookback(&self) -> usize {
        1
    }

    /// Fold `history[index]` into the indicator state. Only `history[..=index]`
    /// may be read.
    fn compute_indicators(&mut self, history: &[Candle], index: usize) -> IndicatorSnapshot;

    fn generate_signal(&mut self, snapshot: &IndicatorSnapshot, position: PositionSide) -> Signal;
}

/// Shared `compute_indicators` body for bank-only strategies.
pub(crate) fn update_bank(
    bank: &mut IndicatorBank,
    history: &[Candle],
    index: usize,
) -> IndicatorSnapshot {
    match history.get(index) {
        Some(candle) => bank.update(candle),
        None => IndicatorSnapshot::default(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    MeanReversion,
    MaRsi,
    BandScalping,
    MultiTimeframe,
}

impl StrategyKind {
    pub fn all() -> [StrategyKind; 4] {
        [
            StrategyKind::MeanReversion,
            StrategyKind::MaRsi,
            StrategyKind::BandScalping,
            StrategyKind::MultiTimeframe,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::MaRsi => "ma_rsi",
            StrategyKind::BandScalping => "band_scalping",
            StrategyKind::MultiTimeframe => "multi_timeframe",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StrategyKind::MeanReversion => "RSI mean reversion: buy oversold, sell overbought",
            StrategyKind::MaRsi => "EMA/SMA crossover confirmed by RSI",
            StrategyKind::BandScalping => "Bollinger + RSI + ADX confluence scalper",
            StrategyKind::MultiTimeframe => "momentum scalper filtered by a higher-timeframe EMA",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        StrategyKind::all()
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| {
                TraderError::config_invalid(
                    "strategy",
                    "kind",
                    format!("unknown strategy '{}'", s.trim()),
                )
            })
    }
}

/// Strategy selection plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyConfig {
    MeanReversion(MeanReversionParams),
    MaRsi(MaRsiParams),
    BandScalping(BandScalpingParams),
    MultiTimeframe(MultiTimeframeParams),
}

impl StrategyConfig {
    pub fn default_for(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::MeanReversion => StrategyConfig::MeanReversion(Default::default()),
            StrategyKind::MaRsi => StrategyConfig::MaRsi(Default::default()),
            StrategyKind::BandScalping => StrategyConfig::BandScalping(Default::default()),
            StrategyKind::MultiTimeframe => StrategyConfig::MultiTimeframe(Default::default()),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyConfig::MeanReversion(_) => StrategyKind::MeanReversion,
            StrategyConfig::MaRsi(_) => StrategyKind::MaRsi,
            StrategyConfig::BandScalping(_) => StrategyKind::BandScalping,
            StrategyConfig::MultiTimeframe(_) => StrategyKind::MultiTimeframe,
        }
    }

    pub fn validate(&self) -> Result<(), TraderError> {
        match self {
            StrategyConfig::MeanReversion(p) => p.validate(),
            StrategyConfig::MaRsi(p) => p.validate(),
            StrategyConfig::BandScalping(p) => p.validate(),
            StrategyConfig::MultiTimeframe(p) => p.validate(),
        }
    }
}

/// Build a fresh strategy instance. Each call returns independent state.
pub fn build_strategy(config: &StrategyConfig) -> Box<dyn Strategy> {
    match config {
        StrategyConfig::MeanReversion(p) => Box::new(MeanReversionRsi::new(p.clone())),
        StrategyConfig::MaRsi(p) => Box::new(MaRsiConfluence::new(p.clone())),
        StrategyConfig::BandScalping(p) => Box::new(BandScalping::new(p.clone())),
        StrategyConfig::MultiTimeframe(p) => Box::new(MultiTimeframeScalping::new(p.clone())),
    }
}

pub(crate) fn require_period(key: &str, value: usize) -> Result<(), TraderError> {
    if value == 0 {
        return Err(TraderError::config_invalid(
            "strategy",
            key,
            format!("{key} must be at least 1"),
        ));
    }
    Ok(())
}

pub(crate) fn require_rsi_level(key: &str, value: f64) -> Result<(), TraderError> {
    if !(value > 0.0 && value < 100.0) {
        return Err(TraderError::config_invalid(
            "strategy",
            key,
            format!("{key} must be between 0 and 100"),
        ));
    }
    Ok(())
}
