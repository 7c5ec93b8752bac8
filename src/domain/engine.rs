//! Per-market simulation engine.
//!
//! One engine owns one strategy, one position manager and one event sink.
//! Each call to [`Engine::step`] processes exactly one candle:
//!
//! 1. drop malformed or out-of-order candles (counted, never fatal)
//! 2. append to the bounded history and update the strategy's indicators
//! 3. resolve an intrabar stop/take exit, which ends the candle's trading
//! 4. otherwise apply the strategy's signal through the position manager
//! 5. record a mark-to-market equity point
//!
//! Backtest and live drivers both go through `step`, so replaying a feed
//! live produces the same trades as a backtest over it.

use crate::domain::candle::Candle;
use crate::domain::capital::EquityPoint;
use crate::domain::error::TraderError;
use crate::domain::position::{ExitReason, Position, Trade};
use crate::domain::position_manager::PositionManager;
use crate::domain::risk::{ClampEvent, ClampKind, RiskParams};
use crate::domain::signal::{Side, Signal};
use crate::domain::strategy::Strategy;
use crate::ports::event_sink::{EventSink, NullSink};
use chrono::NaiveDateTime;

pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Everything an engine needs besides its strategy.
pub struct SimulationContext {
    pub market: String,
    pub risk: RiskParams,
    /// Candles kept for the strategy; raised to the strategy's lookback.
    pub history_limit: usize,
    pub sink: Box<dyn EventSink>,
}

impl SimulationContext {
    pub fn new(market: impl Into<String>, risk: RiskParams) -> Self {
        Self {
            market: market.into(),
            risk,
            history_limit: DEFAULT_HISTORY_LIMIT,
            sink: Box::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Completed,
}

/// What happened on one candle.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The candle was malformed or not newer than the previous one.
    Skipped,
    Processed {
        signal: Signal,
        opened: Option<Side>,
        closed: Option<Trade>,
        equity: f64,
    },
}

impl StepOutcome {
    pub fn closed_trade(&self) -> Option<&Trade> {
        match self {
            StepOutcome::Processed { closed, .. } => closed.as_ref(),
            StepOutcome::Skipped => None,
        }
    }
}

/// Final, immutable record of one engine's run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub strategy: String,
    pub market: String,
    pub initial_capital: f64,
    pub final_capital: f64,
    /// Worst realised drawdown tracked while trading.
    pub max_drawdown: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub clamp_events: Vec<ClampEvent>,
    pub rejected_intents: usize,
    pub skipped_candles: usize,
    pub candles_processed: usize,
}

pub struct Engine {
    strategy: Box<dyn Strategy>,
    market: String,
    manager: PositionManager,
    sink: Box<dyn EventSink>,
    history: Vec<Candle>,
    history_cap: usize,
    state: EngineState,
    last_candle: Option<Candle>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    clamp_events: Vec<ClampEvent>,
    rejected_intents: usize,
    skipped_candles: usize,
    candles_processed: usize,
}

impl Engine {
    pub fn new(strategy: Box<dyn Strategy>, context: SimulationContext) -> Result<Self, TraderError> {
        context.risk.validate()?;
        if context.history_limit == 0 {
            return Err(TraderError::config_invalid(
                "backtest",
                "history_limit",
                "history_limit must be positive",
            ));
        }
        let history_cap = context.history_limit.max(strategy.lookback());
        tracing::debug!(
            market = %context.market,
            strategy = strategy.name(),
            history_cap,
            "engine created"
        );
        Ok(Self {
            strategy,
            market: context.market,
            manager: PositionManager::new(context.risk),
            sink: context.sink,
            history: Vec::with_capacity(history_cap * 2),
            history_cap,
            state: EngineState::Idle,
            last_candle: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            clamp_events: Vec::new(),
            rejected_intents: 0,
            skipped_candles: 0,
            candles_processed: 0,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn position(&self) -> Option<&Position> {
        self.manager.position()
    }

    pub fn manager(&self) -> &PositionManager {
        &self.manager
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn rejected_intents(&self) -> usize {
        self.rejected_intents
    }

    pub fn skipped_candles(&self) -> usize {
        self.skipped_candles
    }

    pub fn candles_processed(&self) -> usize {
        self.candles_processed
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Count a record the source could not turn into a candle.
    pub fn skip_unreadable(&mut self, error: &TraderError) -> Result<(), TraderError> {
        self.ensure_active()?;
        self.state = EngineState::Running;
        self.skipped_candles += 1;
        tracing::warn!(market = %self.market, %error, "skipping unreadable candle");
        Ok(())
    }

    pub fn step(&mut self, candle: Candle) -> Result<StepOutcome, TraderError> {
        self.ensure_active()?;
        self.state = EngineState::Running;

        if !candle.is_well_formed() {
            self.skipped_candles += 1;
            tracing::warn!(market = %self.market, timestamp = %candle.timestamp, "skipping malformed candle");
            return Ok(StepOutcome::Skipped);
        }
        if let Some(last) = &self.last_candle {
            if candle.timestamp <= last.timestamp {
                self.skipped_candles += 1;
                tracing::warn!(
                    market = %self.market,
                    timestamp = %candle.timestamp,
                    previous = %last.timestamp,
                    "skipping out-of-order candle"
                );
                return Ok(StepOutcome::Skipped);
            }
        }

        self.push_history(candle);
        self.last_candle = Some(candle);
        self.candles_processed += 1;

        let index = self.history.len() - 1;
        let snapshot = self.strategy.compute_indicators(&self.history, index);

        let mut signal = Signal::Hold;
        let mut opened = None;
        let mut closed = None;
        if let Some((reason, fill)) = self.manager.check_stop_take(&candle) {
            closed = self.close_position(fill, candle.timestamp, reason);
        } else {
            signal = self
                .strategy
                .generate_signal(&snapshot, self.manager.position_side());
            match signal {
                Signal::Enter(side) => {
                    if self.open_position(side, candle.close, candle.timestamp) {
                        opened = Some(side);
                    }
                }
                Signal::Exit => {
                    closed = self.close_position(candle.close, candle.timestamp, ExitReason::Signal);
                }
                Signal::Hold => {}
            }
        }

        let point = EquityPoint {
            timestamp: candle.timestamp,
            equity: self.manager.mark_to_market(candle.close),
        };
        self.equity_curve.push(point);
        self.sink.on_equity(&self.market, &point);

        Ok(StepOutcome::Processed {
            signal,
            opened,
            closed,
            equity: point.equity,
        })
    }

    /// Close any open position at the last seen close. Live callers use this
    /// before shutting down; `finish` calls it implicitly.
    pub fn force_close(&mut self) -> Result<Option<Trade>, TraderError> {
        self.ensure_active()?;
        let Some(last) = self.last_candle else {
            return Ok(None);
        };
        if self.manager.position().is_none() {
            return Ok(None);
        }
        let trade = self.close_position(last.close, last.timestamp, ExitReason::ForcedClose);
        if let (Some(_), Some(point)) = (&trade, self.equity_curve.last_mut()) {
            point.equity = self.manager.capital().current_capital;
        }
        Ok(trade)
    }

    /// Force-close, complete the engine and hand back the run's record.
    /// Any later `step` fails with `EngineCompleted`.
    pub fn finish(&mut self) -> Result<RunResult, TraderError> {
        self.force_close()?;
        self.state = EngineState::Completed;
        let capital = self.manager.capital();
        let result = RunResult {
            strategy: self.strategy.name().to_string(),
            market: self.market.clone(),
            initial_capital: capital.initial_capital,
            final_capital: capital.current_capital,
            max_drawdown: capital.max_drawdown,
            trades: std::mem::take(&mut self.trades),
            equity_curve: std::mem::take(&mut self.equity_curve),
            clamp_events: std::mem::take(&mut self.clamp_events),
            rejected_intents: self.rejected_intents,
            skipped_candles: self.skipped_candles,
            candles_processed: self.candles_processed,
        };
        tracing::info!(
            market = %result.market,
            strategy = %result.strategy,
            trades = result.trades.len(),
            final_capital = result.final_capital,
            "run completed"
        );
        Ok(result)
    }

    fn ensure_active(&self) -> Result<(), TraderError> {
        if self.state == EngineState::Completed {
            return Err(TraderError::EngineCompleted {
                market: self.market.clone(),
            });
        }
        Ok(())
    }

    fn push_history(&mut self, candle: Candle) {
        self.history.push(candle);
        if self.history.len() >= self.history_cap * 2 {
            let excess = self.history.len() - self.history_cap;
            self.history.drain(..excess);
        }
    }

    fn open_position(&mut self, side: Side, price: f64, timestamp: NaiveDateTime) -> bool {
        match self.manager.open(side, price, timestamp) {
            Ok(outcome) => {
                for kind in outcome.clamps {
                    self.record_clamp(timestamp, kind);
                }
                true
            }
            Err(err) => {
                self.reject(&err);
                false
            }
        }
    }

    fn close_position(
        &mut self,
        price: f64,
        timestamp: NaiveDateTime,
        reason: ExitReason,
    ) -> Option<Trade> {
        match self.manager.close(price, timestamp, reason) {
            Ok(outcome) => {
                if let Some(kind) = outcome.clamp {
                    self.record_clamp(timestamp, kind);
                }
                let trade = outcome.trade;
                tracing::debug!(
                    market = %self.market,
                    side = %trade.side,
                    reason = %trade.exit_reason,
                    pnl = trade.pnl,
                    "trade closed"
                );
                self.sink.on_trade(&self.market, &trade);
                self.trades.push(trade.clone());
                Some(trade)
            }
            Err(err) => {
                self.reject(&err);
                None
            }
        }
    }

    fn reject(&mut self, err: &TraderError) {
        self.rejected_intents += 1;
        tracing::warn!(market = %self.market, error = %err, "intent rejected");
    }

    fn record_clamp(&mut self, timestamp: NaiveDateTime, kind: ClampKind) {
        let event = ClampEvent { timestamp, kind };
        tracing::warn!(market = %self.market, ?kind, "risk clamp applied");
        self.sink.on_clamp(&self.market, &event);
        self.clamp_events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorSnapshot;
    use crate::domain::signal::PositionSide;
    use chrono::{Duration, NaiveDate};

    /// Plays back a fixed list of signals, one per candle.
    struct Scripted {
        signals: Vec<Signal>,
        next: usize,
    }

    impl Scripted {
        fn boxed(signals: Vec<Signal>) -> Box<dyn Strategy> {
            Box::new(Self { signals, next: 0 })
        }
    }

    impl Strategy for Scripted {
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

    fn ts(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(i)
    }

    fn flat(i: i64, price: f64) -> Candle {
        Candle {
            timestamp: ts(i),
            open: price,
            high: price + 0.1,
            low: price - 0.1,
            close: price,
            volume: 1.0,
        }
    }

    fn engine(signals: Vec<Signal>) -> Engine {
        Engine::new(
            Scripted::boxed(signals),
            SimulationContext::new("TEST", RiskParams::default()),
        )
        .unwrap()
    }

    #[test]
    fn enter_then_exit_on_signal() {
        let mut e = engine(vec![Signal::Enter(Side::Long), Signal::Hold, Signal::Exit]);
        e.step(flat(0, 100.0)).unwrap();
        assert!(e.position().is_some());
        e.step(flat(1, 100.5)).unwrap();
        let out = e.step(flat(2, 101.0)).unwrap();
        let trade = out.closed_trade().unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert!((trade.pnl - 20.0).abs() < 1e-9);
        assert_eq!(e.equity_curve().len(), 3);
    }

    #[test]
    fn stop_exit_ends_the_candle() {
        // Entry at 100 puts the stop at 99; the next candle dips to 98.5.
        let mut e = engine(vec![Signal::Enter(Side::Long), Signal::Enter(Side::Long)]);
        e.step(flat(0, 100.0)).unwrap();
        let dip = Candle {
            low: 98.5,
            ..flat(1, 99.5)
        };
        let out = e.step(dip).unwrap();
        assert_eq!(out.closed_trade().unwrap().exit_reason, ExitReason::StopLoss);
        // no re-entry on the stop candle
        assert!(e.position().is_none());
        assert!(matches!(out, StepOutcome::Processed { opened: None, .. }));
    }

    #[test]
    fn malformed_and_stale_candles_are_skipped() {
        let mut e = engine(vec![]);
        e.step(flat(1, 100.0)).unwrap();
        let bad = Candle {
            close: f64::NAN,
            ..flat(2, 100.0)
        };
        assert_eq!(e.step(bad).unwrap(), StepOutcome::Skipped);
        assert_eq!(e.step(flat(1, 100.0)).unwrap(), StepOutcome::Skipped);
        assert_eq!(e.step(flat(0, 100.0)).unwrap(), StepOutcome::Skipped);
        assert_eq!(e.skipped_candles(), 3);
        assert_eq!(e.candles_processed(), 1);
    }

    #[test]
    fn invalid_intent_is_counted_not_fatal() {
        // Exit while flat is a lifecycle violation.
        let mut e = engine(vec![Signal::Exit, Signal::Enter(Side::Short)]);
        e.step(flat(0, 100.0)).unwrap();
        assert_eq!(e.rejected_intents(), 1);
        e.step(flat(1, 100.0)).unwrap();
        assert_eq!(e.manager().position_side(), PositionSide::Short);
    }

    #[test]
    fn finish_force_closes_and_completes() {
        let mut e = engine(vec![Signal::Enter(Side::Long)]);
        e.step(flat(0, 100.0)).unwrap();
        e.step(flat(1, 100.5)).unwrap();
        let result = e.finish().unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::ForcedClose);
        assert!((result.final_capital - 10_010.0).abs() < 1e-9);
        let last = result.equity_curve.last().unwrap();
        assert!((last.equity - result.final_capital).abs() < 1e-9);
        assert_eq!(e.state(), EngineState::Completed);
        assert!(matches!(
            e.step(flat(2, 100.0)),
            Err(TraderError::EngineCompleted { .. })
        ));
    }

    #[test]
    fn history_is_bounded() {
        let mut e = Engine::new(
            Scripted::boxed(vec![]),
            SimulationContext::new("TEST", RiskParams::default()).with_history_limit(10),
        )
        .unwrap();
        for i in 0..100 {
            e.step(flat(i, 100.0)).unwrap();
        }
        assert!(e.history_len() < 20);
        assert!(e.history_len() >= 10);
    }

    #[test]
    fn invalid_risk_fails_fast() {
        let ctx = SimulationContext::new(
            "TEST",
            RiskParams {
                risk_per_trade: 0.0,
                ..Default::default()
            },
        );
        assert!(matches!(
            Engine::new(Scripted::boxed(vec![]), ctx),
            Err(TraderError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn sizing_clamps_are_recorded() {
        let mut e = Engine::new(
            Scripted::boxed(vec![Signal::Enter(Side::Long)]),
            SimulationContext::new(
                "TEST",
                RiskParams {
                    stop_loss_pct: 0.0,
                    ..Default::default()
                },
            ),
        )
        .unwrap();
        e.step(flat(0, 100.0)).unwrap();
        let result = e.finish().unwrap();
        assert!(result
            .clamp_events
            .iter()
            .any(|c| matches!(c.kind, ClampKind::PriceRiskFloor { .. })));
    }
}
