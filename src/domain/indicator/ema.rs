//! Exponential Moving Average.
//!
//! k = 2 / (period + 1), seeded with the SMA of the first `period` samples.
//! Warmup: the first (period-1) samples are not ready.

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: f64,
    seed_sum: f64,
    seen: usize,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            seen: 0,
            value: None,
        }
    }

    pub fn next(&mut self, value: f64) -> Option<f64> {
        if self.period == 0 || !value.is_finite() {
            return None;
        }
        self.value = match self.value {
            Some(prev) => Some((value - prev) * self.k + prev),
            None => {
                self.seen += 1;
                self.seed_sum += value;
                (self.seen == self.period).then(|| self.seed_sum / self.period as f64)
            }
        };
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}
