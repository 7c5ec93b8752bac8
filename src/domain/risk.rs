//! Risk parameters, position sizing and the numerical safety caps.
//!
//! Sizing is fixed-fractional on initial capital:
//!
//! ```text
//! risk_amount = initial_capital * risk_per_trade
//! size        = risk_amount / max(stop_distance, min_price_risk_floor * entry_price)
//! size        = min(size, initial_capital * max_position_fraction / entry_price)
//! ```
//!
//! The capped size is rounded down so that `size * entry_price` never
//! exceeds the cap.
//!
//! The floor keeps a near-zero stop distance from producing an unbounded
//! size, and the P&L cap bounds what a single trade can book. Every clamp
//! that changes a value is reported as a [`ClampKind`].

use crate::domain::error::TraderError;
use crate::domain::signal::Side;
use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskParams {
    pub initial_capital: f64,
    pub risk_per_trade: f64,
    /// Minimum stop distance, as a fraction of the entry price.
    pub min_price_risk_floor: f64,
    pub max_position_fraction: f64,
    pub max_pnl_multiple: f64,
    /// Stop distance as a fraction of entry; 0 places no stop order.
    pub stop_loss_pct: f64,
    /// Target distance as a fraction of entry; 0 places no target.
    pub take_profit_pct: f64,
    pub leverage: f64,
    /// Drawdown fraction at which new entries stop; 0 disables the halt.
    pub max_drawdown_halt: f64,
    pub allow_shorting: bool,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            risk_per_trade: 0.02,
            min_price_risk_floor: 0.005,
            max_position_fraction: 0.20,
            max_pnl_multiple: 10.0,
            stop_loss_pct: 0.01,
            take_profit_pct: 0.015,
            leverage: 1.0,
            max_drawdown_halt: 0.0,
            allow_shorting: true,
        }
    }
}

impl RiskParams {
    pub fn risk_amount(&self) -> f64 {
        self.initial_capital * self.risk_per_trade
    }

    pub fn max_notional(&self) -> f64 {
        self.initial_capital * self.max_position_fraction
    }

    pub fn validate(&self) -> Result<(), TraderError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(invalid("initial_capital", "initial_capital must be positive"));
        }
        fraction("risk_per_trade", self.risk_per_trade)?;
        fraction("min_price_risk_floor", self.min_price_risk_floor)?;
        fraction("max_position_fraction", self.max_position_fraction)?;
        if !(self.max_pnl_multiple.is_finite() && self.max_pnl_multiple > 0.0) {
            return Err(invalid("max_pnl_multiple", "max_pnl_multiple must be positive"));
        }
        if !(0.0..1.0).contains(&self.stop_loss_pct) {
            return Err(invalid("stop_loss_pct", "stop_loss_pct must be in [0, 1)"));
        }
        if !(self.take_profit_pct.is_finite() && self.take_profit_pct >= 0.0) {
            return Err(invalid("take_profit_pct", "take_profit_pct must be non-negative"));
        }
        if !(self.leverage.is_finite() && self.leverage >= 1.0) {
            return Err(invalid("leverage", "leverage must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.max_drawdown_halt) {
            return Err(invalid("max_drawdown_halt", "max_drawdown_halt must be in [0, 1)"));
        }
        Ok(())
    }

    /// Stop-loss and take-profit prices for a new position.
    pub fn exit_levels(&self, side: Side, entry_price: f64) -> (Option<f64>, Option<f64>) {
        let sign = side.sign();
        let stop = (self.stop_loss_pct > 0.0)
            .then(|| entry_price * (1.0 - sign * self.stop_loss_pct));
        let take = (self.take_profit_pct > 0.0)
            .then(|| entry_price * (1.0 + sign * self.take_profit_pct));
        (stop, take)
    }
}

fn invalid(key: &str, reason: &str) -> TraderError {
    TraderError::config_invalid("risk", key, reason)
}

fn fraction(key: &str, value: f64) -> Result<(), TraderError> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(invalid(key, &format!("{key} must be in (0, 1]")));
    }
    Ok(())
}

/// A safety clamp that altered a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClampKind {
    PriceRiskFloor { requested: f64, applied: f64 },
    PositionCap { requested_size: f64, capped_size: f64 },
    PnlCap { raw: f64, capped: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClampEvent {
    pub timestamp: NaiveDateTime,
    #[serde(flatten)]
    pub kind: ClampKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sizing {
    pub size: f64,
    pub risk_amount: f64,
    /// Stop distance actually used in the denominator.
    pub price_risk: f64,
    pub clamps: Vec<ClampKind>,
}

/// Size a position from the distance between entry and stop.
///
/// Non-finite or non-positive inputs size to zero rather than erroring.
pub fn size_position(params: &RiskParams, entry_price: f64, stop_distance: f64) -> Sizing {
    let risk_amount = params.risk_amount();
    let mut clamps = Vec::new();
    if !(entry_price.is_finite() && entry_price > 0.0) || !risk_amount.is_finite() {
        return Sizing {
            size: 0.0,
            risk_amount,
            price_risk: 0.0,
            clamps,
        };
    }

    let requested = if stop_distance.is_finite() {
        stop_distance.abs()
    } else {
        0.0
    };
    let floor = params.min_price_risk_floor * entry_price;
    let price_risk = if requested < floor {
        clamps.push(ClampKind::PriceRiskFloor {
            requested,
            applied: floor,
        });
        floor
    } else {
        requested
    };

    let mut size = risk_amount / price_risk;
    let max_notional = params.max_notional();
    if size * entry_price > max_notional {
        let requested_size = size;
        size = (max_notional / entry_price).min(size);
        // The quotient can round up; step down one ulp at a time until the
        // product fits.
        while size > 0.0 && size * entry_price > max_notional {
            size = f64::from_bits(size.to_bits() - 1);
        }
        clamps.push(ClampKind::PositionCap {
            requested_size,
            capped_size: size,
        });
    }

    Sizing {
        size,
        risk_amount,
        price_risk,
        clamps,
    }
}

/// Bound a realised P&L to `±max_pnl_multiple * risk_amount`.
pub fn clamp_pnl(params: &RiskParams, raw: f64, risk_amount: f64) -> (f64, Option<ClampKind>) {
    let limit = params.max_pnl_multiple * risk_amount.abs();
    if !raw.is_finite() {
        // A non-finite fill books nothing rather than poisoning capital.
        let capped = if raw == f64::INFINITY {
            limit
        } else if raw == f64::NEG_INFINITY {
            -limit
        } else {
            0.0
        };
        return (capped, Some(ClampKind::PnlCap { raw, capped }));
    }
    if raw.abs() > limit {
        let capped = limit.copysign(raw);
        (capped, Some(ClampKind::PnlCap { raw, capped }))
    } else {
        (raw, None)
    }
}
