//! Simple Moving Average.
//!
//! Running sum over a ring buffer of the last `period` samples, O(1) per update.
//! Warmup: the first (period-1) samples are not ready.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
        }
    }

    pub fn next(&mut self, value: f64) -> Option<f64> {
        if self.period == 0 || !value.is_finite() {
            return None;
        }
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.period > 0 && self.window.len() == self.period {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_warmup() {
        let mut sma = Sma::new(3);
        assert_eq!(sma.next(1.0), None);
        assert_eq!(sma.next(2.0), None);
        let v = sma.next(3.0).unwrap();
        assert!((v - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_rolls_window() {
        let mut sma = Sma::new(3);
        for x in [1.0, 2.0, 3.0] {
            sma.next(x);
        }
        let v = sma.next(6.0).unwrap();
        // (2 + 3 + 6) / 3
        assert!((v - 11.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn sma_period_0_never_ready() {
        let mut sma = Sma::new(0);
        assert_eq!(sma.next(1.0), None);
        assert_eq!(sma.next(2.0), None);
    }

    #[test]
    fn sma_skips_nan() {
        let mut sma = Sma::new(2);
        sma.next(10.0);
        assert_eq!(sma.next(f64::NAN), None);
        let v = sma.next(20.0).unwrap();
        assert!((v - 15.0).abs() < f64::EPSILON);
    }
}
