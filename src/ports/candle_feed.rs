//! Candle source port.

use crate::domain::candle::Candle;
use crate::domain::error::TraderError;

/// A pull-based, ordered stream of candles for one market.
///
/// Backtests drain a finite feed; live runs pull one candle per tick until
/// cancelled or the feed is exhausted.
pub trait CandleFeed: Iterator<Item = Result<Candle, TraderError>> + Send {
    /// Market identifier the feed serves.
    fn market(&self) -> &str;
}
