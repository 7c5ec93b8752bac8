//! Moving-average crossover confirmed by RSI.
//!
//! Golden cross (fast EMA crosses above slow SMA) with RSI below
//! `long_rsi_below` enters long; death cross with RSI above
//! `short_rsi_above` enters short. The opposite cross closes the position.

use super::{Strategy, require_period, require_rsi_level, update_bank};
use crate::domain::candle::Candle;
use crate::domain::error::TraderError;
use crate::domain::indicator::{IndicatorBank, IndicatorSnapshot, IndicatorType};
use crate::domain::signal::{PositionSide, Signal, SignalConditions};

#[derive(Debug, Clone, PartialEq)]
pub struct MaRsiParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub rsi_period: usize,
    pub long_rsi_below: f64,
    pub short_rsi_above: f64,
}

impl Default for MaRsiParams {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 25,
            rsi_period: 14,
            long_rsi_below: 50.0,
            short_rsi_above: 50.0,
        }
    }
}

impl MaRsiParams {
    pub fn validate(&self) -> Result<(), TraderError> {
        require_period("fast_period", self.fast_period)?;
        require_period("slow_period", self.slow_period)?;
        require_period("rsi_period", self.rsi_period)?;
        require_rsi_level("long_rsi_below", self.long_rsi_below)?;
        require_rsi_level("short_rsi_above", self.short_rsi_above)?;
        if self.fast_period >= self.slow_period {
            return Err(TraderError::config_invalid(
                "strategy",
                "fast_period",
                "fast_period must be less than slow_period",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cross {
    Golden,
    Death,
    None,
}

pub struct MaRsiConfluence {
    params: MaRsiParams,
    fast: IndicatorType,
    slow: IndicatorType,
    rsi: IndicatorType,
    bank: IndicatorBank,
    prev_spread: Option<f64>,
    spread: Option<f64>,
}

impl MaRsiConfluence {
    pub fn new(params: MaRsiParams) -> Self {
        let fast = IndicatorType::Ema(params.fast_period);
        let slow = IndicatorType::Sma(params.slow_period);
        let rsi = IndicatorType::Rsi(params.rsi_period);
        Self {
            bank: IndicatorBank::new(&[fast, slow, rsi]),
            fast,
            slow,
            rsi,
            params,
            prev_spread: None,
            spread: None,
        }
    }

    fn cross(&self) -> Cross {
        match (self.prev_spread, self.spread) {
            (Some(prev), Some(curr)) if prev <= 0.0 && curr > 0.0 => Cross::Golden,
            (Some(prev), Some(curr)) if prev >= 0.0 && curr < 0.0 => Cross::Death,
            _ => Cross::None,
        }
    }
}

impl Strategy for MaRsiConfluence {
    fn name(&self) -> &str {
        "ma_rsi"
    }

    fn compute_indicators(&mut self, history: &[Candle], index: usize) -> IndicatorSnapshot {
        let snapshot = update_bank(&mut self.bank, history, index);
        // Spread is tracked here so crosses are seen even on candles where
        // the engine skips signal generation.
        self.prev_spread = self.spread;
        self.spread = match (snapshot.simple(&self.fast), snapshot.simple(&self.slow)) {
            (Some(fast), Some(slow)) => Some(fast - slow),
            _ => None,
        };
        snapshot
    }

    fn generate_signal(&mut self, snapshot: &IndicatorSnapshot, position: PositionSide) -> Signal {
        let Some(rsi) = snapshot.simple(&self.rsi) else {
            return Signal::Hold;
        };
        let cross = self.cross();
        let conditions = SignalConditions {
            enter_long: cross == Cross::Golden && rsi < self.params.long_rsi_below,
            enter_short: cross == Cross::Death && rsi > self.params.short_rsi_above,
            exit_long: cross == Cross::Death,
            exit_short: cross == Cross::Golden,
        };
        let signal = conditions.resolve(position);
        if cross != Cross::None {
            tracing::debug!(?cross, rsi, ?position, ?signal, "ma_rsi crossover");
        }
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorValue;
    use crate::domain::signal::Side;

    fn params() -> MaRsiParams {
        MaRsiParams {
            fast_period: 2,
            slow_period: 3,
            rsi_period: 2,
            ..Default::default()
        }
    }

    fn snapshot(rsi: f64) -> IndicatorSnapshot {
        let mut snap = IndicatorSnapshot::default();
        snap.values
            .insert(IndicatorType::Rsi(2), IndicatorValue::Simple(rsi));
        snap
    }

    fn with_spreads(prev: f64, curr: f64) -> MaRsiConfluence {
        let mut s = MaRsiConfluence::new(params());
        s.prev_spread = Some(prev);
        s.spread = Some(curr);
        s
    }

    #[test]
    fn golden_cross_with_low_rsi_enters_long() {
        let mut s = with_spreads(-0.5, 0.5);
        assert_eq!(
            s.generate_signal(&snapshot(40.0), PositionSide::Flat),
            Signal::Enter(Side::Long)
        );
    }

    #[test]
    fn golden_cross_with_high_rsi_holds() {
        let mut s = with_spreads(-0.5, 0.5);
        assert_eq!(
            s.generate_signal(&snapshot(60.0), PositionSide::Flat),
            Signal::Hold
        );
    }

    #[test]
    fn death_cross_with_high_rsi_enters_short() {
        let mut s = with_spreads(0.5, -0.5);
        assert_eq!(
            s.generate_signal(&snapshot(60.0), PositionSide::Flat),
            Signal::Enter(Side::Short)
        );
    }

    #[test]
    fn opposite_cross_exits() {
        let mut s = with_spreads(0.5, -0.5);
        assert_eq!(s.generate_signal(&snapshot(60.0), PositionSide::Long), Signal::Exit);
        let mut s = with_spreads(-0.5, 0.5);
        assert_eq!(s.generate_signal(&snapshot(40.0), PositionSide::Short), Signal::Exit);
    }

    #[test]
    fn no_cross_holds() {
        let mut s = with_spreads(0.5, 0.7);
        assert_eq!(s.generate_signal(&snapshot(10.0), PositionSide::Flat), Signal::Hold);
    }

    #[test]
    fn compute_indicators_tracks_spread() {
        use chrono::{Duration, NaiveDate};
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let history: Vec<Candle> = [10.0, 10.0, 10.0, 9.0, 12.0]
            .iter()
            .enumerate()
            .map(|(i, &p)| Candle {
                timestamp: start + Duration::minutes(i as i64),
                open: p,
                high: p,
                low: p,
                close: p,
                volume: 1.0,
            })
            .collect();
        let mut s = MaRsiConfluence::new(params());
        for i in 0..history.len() {
            s.compute_indicators(&history, i);
        }
        // fast EMA(2) reacts faster than SMA(3) to the jump to 12.
        assert!(s.prev_spread.unwrap() < 0.0);
        assert!(s.spread.unwrap() > 0.0);
        assert_eq!(s.cross(), Cross::Golden);
    }

    #[test]
    fn validate_rejects_fast_not_below_slow() {
        let p = MaRsiParams {
            fast_period: 30,
            slow_period: 20,
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }
}
