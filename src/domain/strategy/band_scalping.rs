//! Bollinger / RSI / ADX confluence scalper.
//!
//! Entries are scored rather than gated: RSI depth, position inside the
//! bands (%B), RSI momentum, volatility and directional strength each add
//! points to a long and a short score. A side is entered when its score
//! reaches `min_score`. Exits fire when price has travelled back through the
//! middle band with RSI confirming, at the configured band or at one of the
//! fixed profit tiers.

use super::{Strategy, require_period, require_rsi_level, update_bank};
use crate::domain::candle::Candle;
use crate::domain::error::TraderError;
use crate::domain::indicator::{IndicatorBank, IndicatorSnapshot, IndicatorType, IndicatorValue};
use crate::domain::signal::{PositionSide, Signal, SignalConditions};

const MIN_VOLATILITY: f64 = 0.001;
const MAX_VOLATILITY: f64 = 0.01;

/// Fixed (%B, RSI) exits checked after the configured one: a take-profit
/// tier and a quick-profit tier. Shorts use `1 - %B` and `100 - RSI`.
const PROFIT_EXITS: [(f64, f64); 2] = [(0.55, 60.0), (0.65, 50.0)];

#[derive(Debug, Clone, PartialEq)]
pub struct BandScalpingParams {
    pub bb_period: usize,
    pub bb_stddev: f64,
    pub rsi_period: usize,
    pub adx_period: usize,
    /// ADX above this with the matching DI dominant counts as a trend.
    pub adx_threshold: f64,
    /// ADX below this is treated as a ranging market and penalised.
    pub min_adx: f64,
    /// Band width / close; entries are blocked below a tenth of it.
    pub squeeze_threshold: f64,
    pub min_score: i32,
    pub exit_band: f64,
    pub exit_rsi_long: f64,
    pub exit_rsi_short: f64,
}

impl Default for BandScalpingParams {
    fn default() -> Self {
        Self {
            bb_period: 20,
            bb_stddev: 2.0,
            rsi_period: 14,
            adx_period: 14,
            adx_threshold: 20.0,
            min_adx: 15.0,
            squeeze_threshold: 0.008,
            min_score: 3,
            exit_band: 0.6,
            exit_rsi_long: 55.0,
            exit_rsi_short: 45.0,
        }
    }
}

impl BandScalpingParams {
    pub fn validate(&self) -> Result<(), TraderError> {
        require_period("bb_period", self.bb_period)?;
        require_period("rsi_period", self.rsi_period)?;
        require_period("adx_period", self.adx_period)?;
        require_rsi_level("exit_rsi_long", self.exit_rsi_long)?;
        require_rsi_level("exit_rsi_short", self.exit_rsi_short)?;
        if !(self.bb_stddev > 0.0 && self.bb_stddev.is_finite()) {
            return Err(TraderError::config_invalid(
                "strategy",
                "bb_stddev",
                "bb_stddev must be positive",
            ));
        }
        if !(self.exit_band > 0.5 && self.exit_band < 1.0) {
            return Err(TraderError::config_invalid(
                "strategy",
                "exit_band",
                "exit_band must be between 0.5 and 1",
            ));
        }
        if self.squeeze_threshold < 0.0 {
            return Err(TraderError::config_invalid(
                "strategy",
                "squeeze_threshold",
                "squeeze_threshold must be non-negative",
            ));
        }
        if self.min_score < 1 {
            return Err(TraderError::config_invalid(
                "strategy",
                "min_score",
                "min_score must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Indicator readings needed to score one candle.
#[derive(Debug, Clone, Copy)]
struct Reading {
    rsi: f64,
    rsi_momentum: f64,
    percent_b: f64,
    volatility: f64,
    adx: f64,
    plus_di: f64,
    minus_di: f64,
}

pub struct BandScalping {
    params: BandScalpingParams,
    bollinger: IndicatorType,
    rsi: IndicatorType,
    adx: IndicatorType,
    bank: IndicatorBank,
    prev_rsi: Option<f64>,
    rsi_momentum: f64,
}

impl BandScalping {
    pub fn new(params: BandScalpingParams) -> Self {
        let bollinger = IndicatorType::bollinger(params.bb_period, params.bb_stddev);
        let rsi = IndicatorType::Rsi(params.rsi_period);
        let adx = IndicatorType::Adx(params.adx_period);
        Self {
            bank: IndicatorBank::new(&[bollinger, rsi, adx]),
            bollinger,
            rsi,
            adx,
            params,
            prev_rsi: None,
            rsi_momentum: 0.0,
        }
    }

    fn reading(&self, snapshot: &IndicatorSnapshot) -> Option<Reading> {
        let bands = snapshot.bands(&self.bollinger)?;
        let rsi = snapshot.simple(&self.rsi)?;
        let IndicatorValue::Adx {
            adx,
            plus_di,
            minus_di,
        } = snapshot.get(&self.adx)?
        else {
            return None;
        };
        if snapshot.close <= 0.0 {
            return None;
        }
        Some(Reading {
            rsi,
            rsi_momentum: self.rsi_momentum,
            percent_b: bands.percent_b(snapshot.close),
            volatility: (bands.upper - bands.lower) / snapshot.close,
            adx,
            plus_di,
            minus_di,
        })
    }

    fn long_score(&self, r: &Reading) -> i32 {
        let mut score = 0;
        score += tier(r.rsi, &[(40.0, 3), (50.0, 2), (60.0, 1)]);
        score += tier(r.percent_b, &[(0.3, 3), (0.4, 2), (0.6, 1)]);
        score += if r.rsi_momentum > 2.0 {
            2
        } else if r.rsi_momentum > 0.0 {
            1
        } else {
            0
        };
        score += self.shared_score(r);
        if r.adx > self.params.adx_threshold && r.plus_di > r.minus_di {
            score += 2;
        } else if r.plus_di > r.minus_di {
            score += 1;
        }
        score
    }

    fn short_score(&self, r: &Reading) -> i32 {
        let mut score = 0;
        // RSI above 65/60/50 and %B above 0.8/0.7/0.5, measured from the top.
        score += tier(100.0 - r.rsi, &[(35.0, 3), (40.0, 2), (50.0, 1)]);
        score += tier(1.0 - r.percent_b, &[(0.2, 3), (0.3, 2), (0.5, 1)]);
        score += if r.rsi_momentum < -2.0 {
            2
        } else if r.rsi_momentum < 0.0 {
            1
        } else {
            0
        };
        score += self.shared_score(r);
        if r.adx > self.params.adx_threshold && r.minus_di > r.plus_di {
            score += 2;
        } else if r.minus_di > r.plus_di {
            score += 1;
        }
        score
    }

    /// Volatility and range penalties that apply to both sides.
    fn shared_score(&self, r: &Reading) -> i32 {
        let mut score = 0;
        if r.volatility > self.params.squeeze_threshold * 2.0 {
            score += 1;
        }
        if r.adx < self.params.min_adx {
            score -= 2;
        }
        if !(MIN_VOLATILITY..=MAX_VOLATILITY).contains(&r.volatility) {
            score -= 1;
        }
        score
    }

    fn conditions(&self, r: &Reading) -> SignalConditions {
        let p = &self.params;
        let squeezed = r.volatility < p.squeeze_threshold * 0.1;
        let long_score = self.long_score(r);
        let short_score = self.short_score(r);
        SignalConditions {
            enter_long: !squeezed && long_score >= p.min_score,
            enter_short: !squeezed && short_score >= p.min_score,
            exit_long: (r.percent_b > p.exit_band && r.rsi > p.exit_rsi_long)
                || PROFIT_EXITS
                    .iter()
                    .any(|&(band, rsi)| r.percent_b > band && r.rsi > rsi),
            exit_short: (r.percent_b < 1.0 - p.exit_band && r.rsi < p.exit_rsi_short)
                || PROFIT_EXITS
                    .iter()
                    .any(|&(band, rsi)| r.percent_b < 1.0 - band && r.rsi < 100.0 - rsi),
        }
    }
}

/// Points for the first threshold `value` falls strictly below.
fn tier(value: f64, tiers: &[(f64, i32)]) -> i32 {
    tiers
        .iter()
        .find(|(limit, _)| value < *limit)
        .map(|(_, points)| *points)
        .unwrap_or(0)
}

impl Strategy for BandScalping {
    fn name(&self) -> &str {
        "band_scalping"
    }

    fn compute_indicators(&mut self, history: &[Candle], index: usize) -> IndicatorSnapshot {
        let snapshot = update_bank(&mut self.bank, history, index);
        let rsi = snapshot.simple(&self.rsi);
        self.rsi_momentum = match (self.prev_rsi, rsi) {
            (Some(prev), Some(curr)) => curr - prev,
            _ => 0.0,
        };
        if rsi.is_some() {
            self.prev_rsi = rsi;
        }
        snapshot
    }

    fn generate_signal(&mut self, snapshot: &IndicatorSnapshot, position: PositionSide) -> Signal {
        let Some(reading) = self.reading(snapshot) else {
            return Signal::Hold;
        };
        let signal = self.conditions(&reading).resolve(position);
        if signal != Signal::Hold {
            tracing::debug!(
                rsi = reading.rsi,
                percent_b = reading.percent_b,
                adx = reading.adx,
                ?position,
                ?signal,
                "band_scalping signal"
            );
        }
        signal
    }
}
