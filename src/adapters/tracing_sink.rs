//! Event sinks: `tracing` output and channel forwarding.

use crate::domain::capital::EquityPoint;
use crate::domain::position::Trade;
use crate::domain::risk::ClampEvent;
use crate::ports::event_sink::EventSink;
use std::sync::mpsc::Sender;

/// Trades at `info`, clamps at `warn`, equity points at `trace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_trade(&mut self, market: &str, trade: &Trade) {
        tracing::info!(
            market,
            side = %trade.side,
            entry = trade.entry_price,
            exit = trade.exit_price,
            size = trade.size,
            pnl = trade.pnl,
            reason = %trade.exit_reason,
            "trade"
        );
    }

    fn on_equity(&mut self, market: &str, point: &EquityPoint) {
        tracing::trace!(market, timestamp = %point.timestamp, equity = point.equity, "equity");
    }

    fn on_clamp(&mut self, market: &str, event: &ClampEvent) {
        tracing::warn!(market, timestamp = %event.timestamp, kind = ?event.kind, "clamp");
    }
}

/// An engine event forwarded to another thread.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Trade { market: String, trade: Trade },
    Equity { market: String, point: EquityPoint },
    Clamp { market: String, event: ClampEvent },
}

/// Forwards events over a channel, e.g. to a live monitor. A disconnected
/// receiver drops events silently.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<EngineEvent>,
}

impl ChannelSink {
    pub fn new(sender: Sender<EngineEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn on_trade(&mut self, market: &str, trade: &Trade) {
        let _ = self.sender.send(EngineEvent::Trade {
            market: market.to_string(),
            trade: trade.clone(),
        });
    }

    fn on_equity(&mut self, market: &str, point: &EquityPoint) {
        let _ = self.sender.send(EngineEvent::Equity {
            market: market.to_string(),
            point: *point,
        });
    }

    fn on_clamp(&mut self, market: &str, event: &ClampEvent) {
        let _ = self.sender.send(EngineEvent::Clamp {
            market: market.to_string(),
            event: *event,
        });
    }
}
