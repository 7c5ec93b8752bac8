#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use scalptrader::domain::candle::Candle;
use scalptrader::domain::engine::SimulationContext;
use scalptrader::domain::indicator::IndicatorSnapshot;
use scalptrader::domain::risk::RiskParams;
use scalptrader::domain::signal::{PositionSide, Signal};
use scalptrader::domain::strategy::Strategy;
use std::io::Write;

pub fn ts(minute: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::minutes(minute)
}

/// Candle with a tight range around `close`.
pub fn make_candle(minute: i64, close: f64) -> Candle {
    Candle {
        timestamp: ts(minute),
        open: close,
        high: close + 0.05,
        low: close - 0.05,
        close,
        volume: 1_000.0,
    }
}

pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_candle(i as i64, c))
        .collect()
}

/// Deterministic oscillating series with drift changes, for long runs.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            100.0 + 3.0 * (x * 0.15).sin() + 1.5 * (x * 0.047).cos() + 0.4 * (x * 1.3).sin()
        })
        .collect()
}

pub fn ok_feed(candles: &[Candle]) -> impl Iterator<Item = Result<Candle, scalptrader::domain::error::TraderError>> + '_ {
    candles.iter().copied().map(Ok)
}

pub fn context(risk: RiskParams) -> SimulationContext {
    SimulationContext::new("TEST", risk)
}

/// Replays a fixed list of signals, one per call, then holds.
pub struct ScriptedStrategy {
    signals: Vec<Signal>,
    next: usize,
}

impl ScriptedStrategy {
    pub fn boxed(signals: Vec<Signal>) -> Box<dyn Strategy> {
        Box::new(Self { signals, next: 0 })
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn compute_indicators(&mut self, history: &[Candle], index: usize) -> IndicatorSnapshot {
        IndicatorSnapshot::empty(&history[index])
    }

    fn generate_signal(&mut self, _snapshot: &IndicatorSnapshot, _position: PositionSide) -> Signal {
        let signal = self.signals.get(self.next).copied().unwrap_or(Signal::Hold);
        self.next += 1;
        signal
    }
}

/// Enters the given side whenever flat.
pub struct AlwaysEnter(pub scalptrader::domain::signal::Side);

impl Strategy for AlwaysEnter {
    fn name(&self) -> &str {
        "always_enter"
    }

    fn compute_indicators(&mut self, history: &[Candle], index: usize) -> IndicatorSnapshot {
        IndicatorSnapshot::empty(&history[index])
    }

    fn generate_signal(&mut self, _snapshot: &IndicatorSnapshot, position: PositionSide) -> Signal {
        if position.is_flat() {
            Signal::Enter(self.0)
        } else {
            Signal::Hold
        }
    }
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// CSV text in the feed's format.
pub fn candles_to_csv(candles: &[Candle]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for c in candles {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.timestamp.format("%Y-%m-%d %H:%M:%S"),
            c.open,
            c.high,
            c.low,
            c.close,
            c.volume
        ));
    }
    out
}
