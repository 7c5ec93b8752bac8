//! CSV and in-memory candle feeds.
//!
//! CSV files carry a header row `timestamp,open,high,low,close,volume`.
//! Timestamps may be epoch milliseconds or one of `%Y-%m-%d %H:%M:%S`,
//! `%Y-%m-%dT%H:%M:%S`, `%Y-%m-%d`. Rows are read lazily; value checks
//! (NaN, inverted ranges) are left to the engine.

use crate::domain::candle::Candle;
use crate::domain::error::TraderError;
use crate::ports::candle_feed::CandleFeed;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, TraderError> {
    let value = value.trim();
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = value.parse().map_err(|e| TraderError::Data {
            reason: format!("invalid epoch timestamp '{value}': {e}"),
        })?;
        return DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| TraderError::Data {
                reason: format!("epoch timestamp out of range: {value}"),
            });
    }
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| TraderError::Data {
            reason: format!("unrecognised timestamp '{value}'"),
        })
}

/// Lazily reads candles from CSV.
pub struct CsvCandleFeed<R: Read + Send = File> {
    market: String,
    rows: csv::DeserializeRecordsIntoIter<R, CandleRow>,
}

impl CsvCandleFeed<File> {
    pub fn open(path: impl AsRef<Path>, market: impl Into<String>) -> Result<Self, TraderError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TraderError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Ok(Self::from_reader(file, market))
    }

    /// Open `<dir>/<market>.csv`.
    pub fn from_dir(dir: impl AsRef<Path>, market: &str) -> Result<Self, TraderError> {
        Self::open(market_path(dir.as_ref(), market), market)
    }
}

impl<R: Read + Send> CsvCandleFeed<R> {
    pub fn from_reader(reader: R, market: impl Into<String>) -> Self {
        let rows = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader)
            .into_deserialize();
        Self {
            market: market.into(),
            rows,
        }
    }
}

impl<R: Read + Send> Iterator for CsvCandleFeed<R> {
    type Item = Result<Candle, TraderError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(row.map_err(TraderError::from).and_then(|row| {
            Ok(Candle {
                timestamp: parse_timestamp(&row.timestamp)?,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            })
        }))
    }
}

impl<R: Read + Send> CandleFeed for CsvCandleFeed<R> {
    fn market(&self) -> &str {
        &self.market
    }
}

fn market_path(dir: &Path, market: &str) -> PathBuf {
    dir.join(format!("{market}.csv"))
}

/// Markets with a `<market>.csv` file in `dir`, sorted.
pub fn list_markets(dir: impl AsRef<Path>) -> Result<Vec<String>, TraderError> {
    let dir = dir.as_ref();
    let mut markets = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "csv") {
            if let Some(stem) = path.file_stem() {
                markets.push(stem.to_string_lossy().into_owned());
            }
        }
    }
    markets.sort();
    Ok(markets)
}

/// Replayable in-memory feed.
#[derive(Debug, Clone)]
pub struct VecCandleFeed {
    market: String,
    candles: Arc<[Candle]>,
    position: usize,
}

impl VecCandleFeed {
    pub fn new(market: impl Into<String>, candles: impl Into<Arc<[Candle]>>) -> Self {
        Self {
            market: market.into(),
            candles: candles.into(),
            position: 0,
        }
    }

    /// Drain another feed into memory, dropping unreadable records.
    pub fn collect_from(feed: impl CandleFeed) -> Result<Self, TraderError> {
        let market = feed.market().to_string();
        let mut candles = Vec::new();
        for candle in feed {
            match candle {
                Ok(candle) => candles.push(candle),
                Err(err) if err.is_bad_record() => {
                    tracing::warn!(market = %market, error = %err, "dropping unreadable candle");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(Self::new(market, candles))
    }

    pub fn candles(&self) -> &Arc<[Candle]> {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }
}

impl Iterator for VecCandleFeed {
    type Item = Result<Candle, TraderError>;

    fn next(&mut self) -> Option<Self::Item> {
        let candle = *self.candles.get(self.position)?;
        self.position += 1;
        Some(Ok(candle))
    }
}

impl CandleFeed for VecCandleFeed {
    fn market(&self) -> &str {
        &self.market
    }
}
