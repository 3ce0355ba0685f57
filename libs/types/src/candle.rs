//! OHLC candle types and session selection
//!
//! A candle summarizes one trading session: open, high, low, close. The
//! feed delivers series ordered oldest → newest and carries no per-candle
//! timestamps, so position in the series is the only ordering.
//!
//! Uses `Decimal` for all price fields so derived pivot levels are
//! deterministic across platforms.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLC candle (one session in one timeframe).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Candle {
    pub fn new(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Self {
        Self {
            open,
            high,
            low,
            close,
        }
    }

    /// Validate candle integrity (high must not be below low).
    ///
    /// The store accepts invalid candles — derived output for them is
    /// unspecified — but flags them at the ingestion boundary.
    pub fn is_valid(&self) -> bool {
        self.high >= self.low
    }
}

/// The current session of a series: its most recent candle.
pub fn current_session(series: &[Candle]) -> Option<&Candle> {
    series.last()
}

/// The previous session of a series: the candle before the current one.
///
/// A series with fewer than 2 candles has no previous session.
pub fn previous_session(series: &[Candle]) -> Option<&Candle> {
    if series.len() < 2 {
        None
    } else {
        series.get(series.len() - 2)
    }
}
