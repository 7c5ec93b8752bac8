//! Observer port for engine events.

use crate::domain::capital::EquityPoint;
use crate::domain::position::Trade;
use crate::domain::risk::ClampEvent;

/// Receives trades, equity points and clamp events as the engine produces
/// them. Each engine owns its sink; implementations need no locking.
pub trait EventSink: Send {
    fn on_trade(&mut self, market: &str, trade: &Trade);
    fn on_equity(&mut self, market: &str, point: &EquityPoint);
    fn on_clamp(&mut self, market: &str, event: &ClampEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_trade(&mut self, _market: &str, _trade: &Trade) {}
    fn on_equity(&mut self, _market: &str, _point: &EquityPoint) {}
    fn on_clamp(&mut self, _market: &str, _event: &ClampEvent) {}
}
