//! Ticker: one tracked instrument and its candlestick history
//!
//! A ticker is identified by (symbol, market, exchange) and owns a mapping
//! from timeframe name (e.g. "daily", "weekly") to an ordered candle series.
//! The mapping is replaced wholesale on every feed update — never patched —
//! so any clone taken by a reader is internally consistent.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::candle::{current_session, previous_session, Candle};

/// Timeframe name → ordered candle series (oldest → newest).
pub type CandlesByTimeframe = BTreeMap<String, Vec<Candle>>;

/// A tracked instrument with its per-timeframe candle history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub market: String,
    pub exchange: String,
    pub candlesticks: CandlesByTimeframe,
}

impl Ticker {
    pub fn new(
        symbol: impl Into<String>,
        market: impl Into<String>,
        exchange: impl Into<String>,
        candlesticks: CandlesByTimeframe,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            market: market.into(),
            exchange: exchange.into(),
            candlesticks,
        }
    }

    /// Candle series for a timeframe.
    ///
    /// `None` selects the first available series, for consumers that only
    /// care about whichever timeframe is present.
    pub fn candles_for(&self, timeframe: Option<&str>) -> Option<&[Candle]> {
        match timeframe {
            Some(tf) => self.candlesticks.get(tf).map(Vec::as_slice),
            None => self.candlesticks.values().next().map(Vec::as_slice),
        }
    }

    /// Most recent session for a timeframe.
    pub fn current_session(&self, timeframe: Option<&str>) -> Option<&Candle> {
        self.candles_for(timeframe).and_then(current_session)
    }

    /// Session before the most recent one for a timeframe.
    pub fn previous_session(&self, timeframe: Option<&str>) -> Option<&Candle> {
        self.candles_for(timeframe).and_then(previous_session)
    }

    /// Latest traded price: close of the current session of the first
    /// available series. Zero when the ticker carries no data yet.
    pub fn price(&self) -> Decimal {
        self.current_session(None)
            .map(|c| c.close)
            .unwrap_or(Decimal::ZERO)
    }
}
