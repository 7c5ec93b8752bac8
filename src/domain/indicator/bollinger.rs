//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is population standard deviation (divides by N, not N-1), kept
//! incrementally from a running sum and sum of squares.
//!
//! Default parameters: period=20, multiplier=2.0

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Bands {
    /// %B: 0 at the lower band, 1 at the upper. Collapsed bands give 0.5.
    pub fn percent_b(&self, price: f64) -> f64 {
        let width = self.upper - self.lower;
        if width <= 0.0 {
            0.5
        } else {
            (price - self.lower) / width
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    mult: f64,
    window: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
}

impl Bollinger {
    pub fn new(period: usize, mult: f64) -> Self {
        Self {
            period,
            mult,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    pub fn next(&mut self, value: f64) -> Option<Bands> {
        if self.period == 0 || !value.is_finite() {
            return None;
        }
        self.window.push_back(value);
        self.sum += value;
        self.sum_sq += value * value;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
                self.sum_sq -= old * old;
            }
        }
        if self.window.len() < self.period {
            return None;
        }

        let n = self.period as f64;
        let middle = self.sum / n;
        // Rounding can push a flat window slightly negative.
        let variance = (self.sum_sq / n - middle * middle).max(0.0);
        let offset = self.mult * variance.sqrt();
        Some(Bands {
            upper: middle + offset,
            middle,
            lower: middle - offset,
        })
    }
}
