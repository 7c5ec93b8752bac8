//! Technical indicator implementations.
//!
//! Every indicator is an incremental state machine fed one candle at a time:
//! - `IndicatorType`: identity + parameters (serves as HashMap key)
//! - `IndicatorValue`: output shape for a single candle
//! - `IndicatorState`: the running state behind one `IndicatorType`
//!
//! `next` returns `None` while the indicator is warming up, and for any
//! candle whose inputs are not finite (the bad sample is not folded in).

pub mod adx;
pub mod bank;
pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod sma;

pub use bank::{IndicatorBank, IndicatorSnapshot};

use crate::domain::candle::Candle;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
    Adx {
        adx: f64,
        plus_di: f64,
        minus_di: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Adx(usize),
}

impl IndicatorType {
    pub fn bollinger(period: usize, stddev_mult: f64) -> Self {
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100: (stddev_mult * 100.0).round().max(0.0) as u32,
        }
    }

    /// Number of candles consumed before the first ready value.
    pub fn warmup(&self) -> usize {
        match self {
            IndicatorType::Sma(p) | IndicatorType::Ema(p) => *p,
            IndicatorType::Bollinger { period, .. } => *period,
            IndicatorType::Rsi(p) => p + 1,
            IndicatorType::Adx(p) => 2 * p,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
        }
    }
}

/// Running state for one indicator.
#[derive(Debug, Clone)]
pub enum IndicatorState {
    Sma(sma::Sma),
    Ema(ema::Ema),
    Rsi(rsi::Rsi),
    Bollinger(bollinger::Bollinger),
    Adx(adx::Adx),
}

impl IndicatorState {
    pub fn new(indicator_type: &IndicatorType) -> Self {
        match *indicator_type {
            IndicatorType::Sma(p) => IndicatorState::Sma(sma::Sma::new(p)),
            IndicatorType::Ema(p) => IndicatorState::Ema(ema::Ema::new(p)),
            IndicatorType::Rsi(p) => IndicatorState::Rsi(rsi::Rsi::new(p)),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => IndicatorState::Bollinger(bollinger::Bollinger::new(
                period,
                stddev_mult_x100 as f64 / 100.0,
            )),
            IndicatorType::Adx(p) => IndicatorState::Adx(adx::Adx::new(p)),
        }
    }

    pub fn next(&mut self, candle: &Candle) -> Option<IndicatorValue> {
        match self {
            IndicatorState::Sma(s) => s.next(candle.close).map(IndicatorValue::Simple),
            IndicatorState::Ema(s) => s.next(candle.close).map(IndicatorValue::Simple),
            IndicatorState::Rsi(s) => s.next(candle.close).map(IndicatorValue::Simple),
            IndicatorState::Bollinger(s) => {
                s.next(candle.close)
                    .map(|b| IndicatorValue::Bollinger {
                        upper: b.upper,
                        middle: b.middle,
                        lower: b.lower,
                    })
            }
            IndicatorState::Adx(s) => s.next(candle).map(|a| IndicatorValue::Adx {
                adx: a.adx,
                plus_di: a.plus_di,
                minus_di: a.minus_di,
            }),
        }
    }
}
