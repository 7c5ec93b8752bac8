//! Drivers that feed candles into engines.

use crate::domain::candle::Candle;
use crate::domain::engine::{Engine, RunResult, SimulationContext};
use crate::domain::error::TraderError;
use crate::domain::strategy::Strategy;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Drain a finite candle source through a fresh engine.
///
/// Unreadable records are skipped; an I/O failure of the source aborts the
/// run. An empty source is `NoData`.
pub fn run_backtest<I>(
    strategy: Box<dyn Strategy>,
    context: SimulationContext,
    candles: I,
) -> Result<RunResult, TraderError>
where
    I: IntoIterator<Item = Result<Candle, TraderError>>,
{
    let mut engine = Engine::new(strategy, context)?;
    let mut seen = 0usize;
    for candle in candles {
        feed_one(&mut engine, candle)?;
        seen += 1;
    }
    if seen == 0 {
        return Err(TraderError::NoData {
            market: engine.market().to_string(),
        });
    }
    engine.finish()
}

fn feed_one(engine: &mut Engine, candle: Result<Candle, TraderError>) -> Result<(), TraderError> {
    match candle {
        Ok(candle) => engine.step(candle).map(|_| ()),
        Err(err) if err.is_bad_record() => engine.skip_unreadable(&err),
        Err(err) => Err(err),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStop {
    Cancelled,
    FeedExhausted,
    CandleLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSummary {
    pub candles: usize,
    pub stop: LiveStop,
}

/// Pull candles one at a time until the feed ends, `cancel` is raised or
/// `max_candles` have been pulled. The engine is left running: an open
/// position stays open until the caller force-closes or finishes it.
pub fn run_live<I>(
    engine: &mut Engine,
    feed: &mut I,
    cancel: &AtomicBool,
    max_candles: Option<usize>,
) -> Result<LiveSummary, TraderError>
where
    I: Iterator<Item = Result<Candle, TraderError>> + ?Sized,
{
    let mut candles = 0usize;
    let stop = loop {
        if cancel.load(Ordering::Relaxed) {
            break LiveStop::Cancelled;
        }
        if max_candles.is_some_and(|max| candles >= max) {
            break LiveStop::CandleLimit;
        }
        let Some(next) = feed.next() else {
            break LiveStop::FeedExhausted;
        };
        feed_one(engine, next)?;
        candles += 1;
    };
    tracing::info!(market = engine.market(), candles, ?stop, "live feed stopped");
    Ok(LiveSummary { candles, stop })
}

/// One independent (strategy, market) backtest.
pub struct BacktestJob {
    pub strategy: Box<dyn Strategy>,
    pub context: SimulationContext,
    /// Read-only candle data; several jobs may share one market's series.
    pub candles: Arc<[Candle]>,
}

/// Run jobs concurrently on the rayon pool. Results come back in job order;
/// one job failing does not affect the others.
pub fn run_parallel(jobs: Vec<BacktestJob>) -> Vec<Result<RunResult, TraderError>> {
    tracing::info!(jobs = jobs.len(), "running backtests in parallel");
    jobs.into_par_iter()
        .map(|job| {
            let candles = job.candles.iter().copied().map(Ok);
            run_backtest(job.strategy, job.context, candles)
        })
        .collect()
}
