//! RSI mean-reversion scalper.
//!
//! Enter long when RSI drops below `oversold`, short when it rises above
//! `overbought`. A long is closed once RSI has recovered to `exit_long_above`,
//! a short once it has fallen back to `exit_short_below`.

use super::{Strategy, require_period, require_rsi_level, update_bank};
use crate::domain::candle::Candle;
use crate::domain::error::TraderError;
use crate::domain::indicator::{IndicatorBank, IndicatorSnapshot, IndicatorType};
use crate::domain::signal::{PositionSide, Signal, SignalConditions};

#[derive(Debug, Clone, PartialEq)]
pub struct MeanReversionParams {
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub exit_long_above: f64,
    pub exit_short_below: f64,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            oversold: 35.0,
            overbought: 65.0,
            exit_long_above: 50.0,
            exit_short_below: 50.0,
        }
    }
}

impl MeanReversionParams {
    pub fn validate(&self) -> Result<(), TraderError> {
        require_period("rsi_period", self.rsi_period)?;
        require_rsi_level("oversold", self.oversold)?;
        require_rsi_level("overbought", self.overbought)?;
        require_rsi_level("exit_long_above", self.exit_long_above)?;
        require_rsi_level("exit_short_below", self.exit_short_below)?;
        if self.oversold >= self.overbought {
            return Err(TraderError::config_invalid(
                "strategy",
                "oversold",
                "oversold must be below overbought",
            ));
        }
        if self.exit_long_above <= self.oversold {
            return Err(TraderError::config_invalid(
                "strategy",
                "exit_long_above",
                "exit_long_above must be above oversold",
            ));
        }
        if self.exit_short_below >= self.overbought {
            return Err(TraderError::config_invalid(
                "strategy",
                "exit_short_below",
                "exit_short_below must be below overbought",
            ));
        }
        Ok(())
    }
}

pub struct MeanReversionRsi {
    params: MeanReversionParams,
    rsi: IndicatorType,
    bank: IndicatorBank,
}

impl MeanReversionRsi {
    pub fn new(params: MeanReversionParams) -> Self {
        let rsi = IndicatorType::Rsi(params.rsi_period);
        Self {
            bank: IndicatorBank::new(&[rsi]),
            rsi,
            params,
        }
    }

    fn conditions(&self, rsi: f64) -> SignalConditions {
        SignalConditions {
            enter_long: rsi < self.params.oversold,
            enter_short: rsi > self.params.overbought,
            exit_long: rsi >= self.params.exit_long_above,
            exit_short: rsi <= self.params.exit_short_below,
        }
    }
}

impl Strategy for MeanReversionRsi {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn compute_indicators(&mut self, history: &[Candle], index: usize) -> IndicatorSnapshot {
        update_bank(&mut self.bank, history, index)
    }

    fn generate_signal(&mut self, snapshot: &IndicatorSnapshot, position: PositionSide) -> Signal {
        let Some(rsi) = snapshot.simple(&self.rsi) else {
            return Signal::Hold;
        };
        let signal = self.conditions(rsi).resolve(position);
        if signal != Signal::Hold {
            tracing::debug!(rsi, ?position, ?signal, "mean_reversion signal");
        }
        signal
    }
}
