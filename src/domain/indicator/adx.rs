//! ADX (Average Directional Index) with +DI / -DI.
//!
//! Per candle (after the first):
//! - TR  = max(high - low, |high - prev_close|, |low - prev_close|)
//! - +DM = high - prev_high if that move is larger than prev_low - low and positive
//! - -DM = prev_low - low if that move is larger than high - prev_high and positive
//!
//! TR, +DM and -DM are Wilder-smoothed (seeded with the mean of the first n
//! values), giving +DI = 100 * sDM+ / sTR and -DI = 100 * sDM- / sTR.
//! DX = 100 * |+DI - -DI| / (+DI + -DI); ADX is the Wilder average of DX.
//!
//! A smoothed TR of zero reports "not ready" for that candle instead of dividing.
//! Warmup: 2n candles.

use crate::domain::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxOutput {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// Wilder running average seeded by the simple mean of the first `period` values.
#[derive(Debug, Clone)]
struct Wilder {
    period: usize,
    seen: usize,
    value: f64,
}

impl Wilder {
    fn new(period: usize) -> Self {
        Self {
            period,
            seen: 0,
            value: 0.0,
        }
    }

    fn next(&mut self, x: f64) -> Option<f64> {
        let n = self.period as f64;
        if self.seen < self.period {
            self.seen += 1;
            self.value += x;
            if self.seen < self.period {
                return None;
            }
            self.value /= n;
        } else {
            self.value = (self.value * (n - 1.0) + x) / n;
        }
        Some(self.value)
    }
}

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    prev: Option<(f64, f64, f64)>,
    tr: Wilder,
    plus_dm: Wilder,
    minus_dm: Wilder,
    dx: Wilder,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev: None,
            tr: Wilder::new(period),
            plus_dm: Wilder::new(period),
            minus_dm: Wilder::new(period),
            dx: Wilder::new(period),
        }
    }

    pub fn next(&mut self, candle: &Candle) -> Option<AdxOutput> {
        if self.period == 0
            || !(candle.high.is_finite() && candle.low.is_finite() && candle.close.is_finite())
        {
            return None;
        }
        let (prev_high, prev_low, prev_close) =
            self.prev.replace((candle.high, candle.low, candle.close))?;

        let tr = candle.true_range(prev_close);
        let up_move = candle.high - prev_high;
        let down_move = prev_low - candle.low;
        let plus_dm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let minus_dm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };

        let s_tr = self.tr.next(tr);
        let s_plus = self.plus_dm.next(plus_dm);
        let s_minus = self.minus_dm.next(minus_dm);
        let (Some(s_tr), Some(s_plus), Some(s_minus)) = (s_tr, s_plus, s_minus) else {
            return None;
        };
        if s_tr <= 0.0 {
            return None;
        }

        let plus_di = 100.0 * s_plus / s_tr;
        let minus_di = 100.0 * s_minus / s_tr;
        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            100.0 * (plus_di - minus_di).abs() / di_sum
        } else {
            0.0
        };

        self.dx.next(dx).map(|adx| AdxOutput {
            adx,
            plus_di,
            minus_di,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn make_candles(hlc: &[(f64, f64, f64)]) -> Vec<Candle> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        hlc.iter()
            .enumerate()
            .map(|(i, &(high, low, close))| Candle {
                timestamp: start + Duration::minutes(5 * i as i64),
                open: close,
                high,
                low,
                close,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn adx_warmup_is_two_periods() {
        let hlc: Vec<_> = (0..10)
            .map(|i| {
                let base = 100.0 + i as f64;
                (base + 1.0, base - 1.0, base)
            })
            .collect();
        let mut adx = Adx::new(3);
        let out: Vec<_> = make_candles(&hlc).iter().map(|c| adx.next(c)).collect();
        assert!(out[..5].iter().all(|o| o.is_none()));
        assert!(out[5].is_some());
    }

    #[test]
    fn adx_strong_uptrend_favours_plus_di() {
        let hlc: Vec<_> = (0..30)
            .map(|i| {
                let base = 100.0 + 2.0 * i as f64;
                (base + 1.0, base - 1.0, base)
            })
            .collect();
        let mut adx = Adx::new(5);
        let last = make_candles(&hlc)
            .iter()
            .filter_map(|c| adx.next(c))
            .last()
            .unwrap();
        assert!(last.plus_di > last.minus_di);
        assert!((last.minus_di - 0.0).abs() < f64::EPSILON);
        // Every DX is 100 in a one-way market.
        assert!((last.adx - 100.0).abs() < 1e-9);
    }

    #[test]
    fn adx_zero_true_range_is_not_ready() {
        let hlc = vec![(100.0, 100.0, 100.0); 20];
        let mut adx = Adx::new(3);
        for candle in make_candles(&hlc) {
            assert!(adx.next(&candle).is_none());
        }
    }

    #[test]
    fn adx_values_bounded() {
        let hlc: Vec<_> = (0..80)
            .map(|i| {
                let base = 100.0 + ((i * 13) % 17) as f64 - 8.0;
                (base + 1.5, base - 1.5, base + 0.5)
            })
            .collect();
        let mut adx = Adx::new(14);
        for out in make_candles(&hlc).iter().filter_map(|c| adx.next(c)) {
            assert!((0.0..=100.0).contains(&out.adx));
            assert!(out.plus_di >= 0.0 && out.minus_di >= 0.0);
        }
    }
}
