//! Trade signals and the Flat/Long/Short position state machine.
//!
//! Transitions: Flat -> Long | Short on Enter, Long | Short -> Flat on Exit.
//! There is no direct Long <-> Short transition: reversing takes an Exit on
//! one candle and an Enter on a later one.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionSide {
    #[default]
    Flat,
    Long,
    Short,
}

impl PositionSide {
    pub fn is_flat(&self) -> bool {
        matches!(self, PositionSide::Flat)
    }
}

impl From<Side> for PositionSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => PositionSide::Long,
            Side::Short => PositionSide::Short,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Enter(Side),
    Exit,
    Hold,
}

/// Raw entry/exit conditions evaluated by a strategy for one candle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalConditions {
    pub enter_long: bool,
    pub enter_short: bool,
    pub exit_long: bool,
    pub exit_short: bool,
}

impl SignalConditions {
    /// Collapse the conditions into one legal signal for the current position.
    ///
    /// Exit wins over Enter, and when flat a long entry wins over a short one.
    /// Entry conditions are ignored while a position is open, so a reversal
    /// can never happen within one signal.
    pub fn resolve(&self, position: PositionSide) -> Signal {
        match position {
            PositionSide::Long if self.exit_long => Signal::Exit,
            PositionSide::Short if self.exit_short => Signal::Exit,
            PositionSide::Long | PositionSide::Short => Signal::Hold,
            PositionSide::Flat if self.enter_long => Signal::Enter(Side::Long),
            PositionSide::Flat if self.enter_short => Signal::Enter(Side::Short),
            PositionSide::Flat => Signal::Hold,
        }
    }
}
