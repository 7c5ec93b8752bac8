//! Multi-timeframe momentum scalper.
//!
//! Base candles feed a fast RSI and a weighted momentum score over several
//! lookbacks. Every `timeframe_factor` base candles are folded into one
//! higher-timeframe candle whose closes drive a trend EMA. Entries follow
//! momentum in the direction of the higher-timeframe trend; positions are
//! closed when the trend flips or RSI reaches the opposite extreme.

use super::{Strategy, require_period, require_rsi_level};
use crate::domain::candle::Candle;
use crate::domain::error::TraderError;
use crate::domain::indicator::ema::Ema;
use crate::domain::indicator::{IndicatorBank, IndicatorSnapshot, IndicatorType};
use crate::domain::signal::{PositionSide, Signal, SignalConditions};

const MOMENTUM: &str = "momentum";
const HTF_TREND: &str = "htf_trend";

/// (lookback in candles, weight)
const MOMENTUM_LOOKBACKS: [(usize, f64); 4] = [(1, 0.5), (3, 0.3), (5, 0.15), (10, 0.05)];

#[derive(Debug, Clone, PartialEq)]
pub struct MultiTimeframeParams {
    pub timeframe_factor: usize,
    pub trend_period: usize,
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub momentum_threshold: f64,
}

impl Default for MultiTimeframeParams {
    fn default() -> Self {
        Self {
            timeframe_factor: 5,
            trend_period: 9,
            rsi_period: 7,
            oversold: 30.0,
            overbought: 70.0,
            momentum_threshold: 0.0003,
        }
    }
}

impl MultiTimeframeParams {
    pub fn validate(&self) -> Result<(), TraderError> {
        require_period("rsi_period", self.rsi_period)?;
        require_period("trend_period", self.trend_period)?;
        require_rsi_level("oversold", self.oversold)?;
        require_rsi_level("overbought", self.overbought)?;
        if self.timeframe_factor < 2 {
            return Err(TraderError::config_invalid(
                "strategy",
                "timeframe_factor",
                "timeframe_factor must be at least 2",
            ));
        }
        if self.oversold >= self.overbought {
            return Err(TraderError::config_invalid(
                "strategy",
                "oversold",
                "oversold must be below overbought",
            ));
        }
        if !(self.momentum_threshold >= 0.0 && self.momentum_threshold.is_finite()) {
            return Err(TraderError::config_invalid(
                "strategy",
                "momentum_threshold",
                "momentum_threshold must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Aggregates consecutive base candles into one higher-timeframe candle.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    factor: usize,
    pending: Option<Candle>,
    count: usize,
}

impl CandleAggregator {
    pub fn new(factor: usize) -> Self {
        Self {
            factor: factor.max(1),
            pending: None,
            count: 0,
        }
    }

    /// Returns the completed higher-timeframe candle every `factor` inputs.
    pub fn push(&mut self, candle: &Candle) -> Option<Candle> {
        let merged = match self.pending.take() {
            None => *candle,
            Some(p) => Candle {
                timestamp: p.timestamp,
                open: p.open,
                high: p.high.max(candle.high),
                low: p.low.min(candle.low),
                close: candle.close,
                volume: p.volume + candle.volume,
            },
        };
        self.count += 1;
        if self.count == self.factor {
            self.count = 0;
            Some(merged)
        } else {
            self.pending = Some(merged);
            None
        }
    }
}

pub struct MultiTimeframeScalping {
    params: MultiTimeframeParams,
    rsi: IndicatorType,
    bank: IndicatorBank,
    aggregator: CandleAggregator,
    trend_ema: Ema,
    trend_value: Option<f64>,
}

impl MultiTimeframeScalping {
    pub fn new(params: MultiTimeframeParams) -> Self {
        let rsi = IndicatorType::Rsi(params.rsi_period);
        Self {
            bank: IndicatorBank::new(&[rsi]),
            aggregator: CandleAggregator::new(params.timeframe_factor),
            trend_ema: Ema::new(params.trend_period),
            trend_value: None,
            rsi,
            params,
        }
    }
}

fn max_lookback() -> usize {
    MOMENTUM_LOOKBACKS
        .iter()
        .map(|(n, _)| *n)
        .max()
        .unwrap_or(1)
}

/// Weighted relative change of the last close against several lookbacks.
pub fn weighted_momentum(closes: &[f64]) -> Option<f64> {
    let last = *closes.last()?;
    let mut score = 0.0;
    for (lookback, weight) in MOMENTUM_LOOKBACKS {
        let idx = closes.len().checked_sub(lookback + 1)?;
        let base = closes[idx];
        if base <= 0.0 {
            return None;
        }
        score += weight * (last - base) / base;
    }
    Some(score)
}

impl Strategy for MultiTimeframeScalping {
    fn name(&self) -> &str {
        "multi_timeframe"
    }

    fn lookback(&self) -> usize {
        max_lookback() + 1
    }

    fn compute_indicators(&mut self, history: &[Candle], index: usize) -> IndicatorSnapshot {
        let Some(candle) = history.get(index) else {
            return IndicatorSnapshot::default();
        };
        let mut snapshot = self.bank.update(candle);

        if let Some(htf) = self.aggregator.push(candle) {
            if let Some(ema) = self.trend_ema.next(htf.close) {
                self.trend_value = Some(ema);
            }
        }
        if let Some(ema) = self.trend_value {
            snapshot.derived.insert(HTF_TREND, ema);
        }

        let start = (index + 1).saturating_sub(self.lookback());
        let closes: Vec<f64> = history[start..=index].iter().map(|c| c.close).collect();
        if let Some(momentum) = weighted_momentum(&closes) {
            snapshot.derived.insert(MOMENTUM, momentum);
        }
        snapshot
    }

    fn generate_signal(&mut self, snapshot: &IndicatorSnapshot, position: PositionSide) -> Signal {
        let (Some(rsi), Some(trend), Some(momentum)) = (
            snapshot.simple(&self.rsi),
            snapshot.derived(HTF_TREND),
            snapshot.derived(MOMENTUM),
        ) else {
            return Signal::Hold;
        };
        let p = &self.params;
        let uptrend = snapshot.close > trend;
        let downtrend = snapshot.close < trend;
        let conditions = SignalConditions {
            enter_long: uptrend && momentum > p.momentum_threshold && rsi < p.overbought,
            enter_short: downtrend && momentum < -p.momentum_threshold && rsi > p.oversold,
            exit_long: downtrend || rsi >= p.overbought,
            exit_short: uptrend || rsi <= p.oversold,
        };
        let signal = conditions.resolve(position);
        if signal != Signal::Hold {
            tracing::debug!(rsi, trend, momentum, ?position, ?signal, "multi_timeframe signal");
        }
        signal
    }
}
