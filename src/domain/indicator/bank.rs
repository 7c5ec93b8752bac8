//! Indicator bank: the set of indicators one strategy instance needs.
//!
//! Each strategy owns its bank; nothing here is shared between engines.

use super::bollinger::Bands;
use super::{IndicatorState, IndicatorType, IndicatorValue};
use crate::domain::candle::Candle;
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Ready indicator values for a single candle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub values: HashMap<IndicatorType, IndicatorValue>,
    /// Strategy-specific values computed outside the bank.
    pub derived: HashMap<&'static str, f64>,
}

impl IndicatorSnapshot {
    pub fn empty(candle: &Candle) -> Self {
        Self {
            timestamp: candle.timestamp,
            close: candle.close,
            values: HashMap::new(),
            derived: HashMap::new(),
        }
    }

    pub fn get(&self, indicator: &IndicatorType) -> Option<IndicatorValue> {
        self.values.get(indicator).copied()
    }

    /// Scalar value of a ready indicator.
    pub fn simple(&self, indicator: &IndicatorType) -> Option<f64> {
        match self.values.get(indicator)? {
            IndicatorValue::Simple(v) => Some(*v),
            _ => None,
        }
    }

    pub fn bands(&self, indicator: &IndicatorType) -> Option<Bands> {
        match self.values.get(indicator)? {
            IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            } => Some(Bands {
                upper: *upper,
                middle: *middle,
                lower: *lower,
            }),
            _ => None,
        }
    }

    pub fn derived(&self, name: &str) -> Option<f64> {
        self.derived.get(name).copied()
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorBank {
    states: Vec<(IndicatorType, IndicatorState)>,
}

impl IndicatorBank {
    pub fn new(indicators: &[IndicatorType]) -> Self {
        let mut states: Vec<(IndicatorType, IndicatorState)> = Vec::new();
        for indicator in indicators {
            if !states.iter().any(|(t, _)| t == indicator) {
                states.push((*indicator, IndicatorState::new(indicator)));
            }
        }
        Self { states }
    }

    /// Longest warmup of any indicator in the bank.
    pub fn warmup(&self) -> usize {
        self.states
            .iter()
            .map(|(t, _)| t.warmup())
            .max()
            .unwrap_or(0)
    }

    /// Fold one candle into every indicator and collect the ready values.
    pub fn update(&mut self, candle: &Candle) -> IndicatorSnapshot {
        let mut snapshot = IndicatorSnapshot::empty(candle);
        for (indicator, state) in &mut self.states {
            if let Some(value) = state.next(candle) {
                snapshot.values.insert(*indicator, value);
            }
        }
        snapshot
    }
}
