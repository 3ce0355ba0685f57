//! Ticker filter queries and the subscribe payload boundary
//!
//! One filter type serves both collaborators: the one-shot query path
//! (HTTP-style `symbols`/`markets`/`timeframes` parameters) and the
//! streaming subscribe path. Filters are comma-separated allow-lists;
//! matching is exact and case-sensitive against the full value. An absent
//! axis means no filtering on that axis.
//!
//! Subscribe payloads arrive as an opaque serialized document and are
//! schema-validated here before they can reach the subscription registry.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use types::ticker::Ticker;

/// Parse a comma-separated allow-list into a set.
///
/// Items are trimmed; empty items are dropped. A missing or effectively
/// empty list means "no filtering on this axis".
fn parse_list(raw: Option<&str>) -> Option<BTreeSet<String>> {
    let raw = raw?;
    let set: BTreeSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}

/// An immutable ticker filter: allow-lists per axis, each optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionQuery {
    pub symbols: Option<BTreeSet<String>>,
    pub markets: Option<BTreeSet<String>>,
    pub timeframes: Option<BTreeSet<String>>,
}

impl SubscriptionQuery {
    /// Parse the raw comma-separated parameters into a query.
    pub fn parse(
        symbols: Option<&str>,
        markets: Option<&str>,
        timeframes: Option<&str>,
    ) -> Self {
        Self {
            symbols: parse_list(symbols),
            markets: parse_list(markets),
            timeframes: parse_list(timeframes),
        }
    }

    /// Whether a ticker passes the symbol and market allow-lists.
    ///
    /// Timeframes do not exclude tickers; they only restrict which series
    /// the projected view carries.
    pub fn matches(&self, ticker: &Ticker) -> bool {
        self.symbols
            .as_ref()
            .map_or(true, |symbols| symbols.contains(&ticker.symbol))
            && self
                .markets
                .as_ref()
                .map_or(true, |markets| markets.contains(&ticker.market))
    }

    /// Project a ticker into this query's view.
    ///
    /// Series for timeframes outside the allow-list are dropped; a ticker
    /// whose series keys miss every requested timeframe is kept with an
    /// empty mapping ("empty but present").
    pub fn project(&self, ticker: &Ticker) -> Ticker {
        let candlesticks = match &self.timeframes {
            None => ticker.candlesticks.clone(),
            Some(timeframes) => ticker
                .candlesticks
                .iter()
                .filter(|(name, _)| timeframes.contains(*name))
                .map(|(name, series)| (name.clone(), series.clone()))
                .collect(),
        };
        Ticker::new(
            ticker.symbol.clone(),
            ticker.market.clone(),
            ticker.exchange.clone(),
            candlesticks,
        )
    }

    /// Apply the full filter to a snapshot.
    pub fn apply(&self, snapshot: &[Arc<Ticker>]) -> Vec<Ticker> {
        snapshot
            .iter()
            .filter(|ticker| self.matches(ticker))
            .map(|ticker| self.project(ticker))
            .collect()
    }
}

/// Wire form of a subscribe payload: raw comma-separated strings per axis.
///
/// Unknown fields are rejected so malformed payloads fail loudly at the
/// boundary instead of silently subscribing to everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscribeRequest {
    pub symbols: Option<String>,
    pub markets: Option<String>,
    pub timeframes: Option<String>,
}

impl SubscribeRequest {
    /// Parse a raw JSON subscribe payload.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Convert the raw strings into a parsed, immutable query.
    pub fn into_query(self) -> SubscriptionQuery {
        SubscriptionQuery::parse(
            self.symbols.as_deref(),
            self.markets.as_deref(),
            self.timeframes.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::candle::Candle;
    use types::ticker::CandlesByTimeframe;

    fn ticker(symbol: &str, market: &str, timeframes: &[&str]) -> Ticker {
        let mut candlesticks = CandlesByTimeframe::new();
        for tf in timeframes {
            let close = rust_decimal::Decimal::from(100);
            candlesticks.insert(
                tf.to_string(),
                vec![Candle::new(close, close, close, close)],
            );
        }
        Ticker::new(symbol, market, "binance", candlesticks)
    }

    #[test]
    fn test_parse_list_trims_and_drops_empties() {
        let set = parse_list(Some("daily, weekly ,,monthly")).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("daily"));
        assert!(set.contains("weekly"));
        assert!(set.contains("monthly"));

        assert!(parse_list(None).is_none());
        assert!(parse_list(Some("")).is_none());
        assert!(parse_list(Some(" , ")).is_none());
    }

    #[test]
    fn test_matching_is_exact_and_case_sensitive() {
        let query = SubscriptionQuery::parse(Some("BTCUSDT"), None, None);

        assert!(query.matches(&ticker("BTCUSDT", "cryptocurrency", &["daily"])));
        assert!(!query.matches(&ticker("btcusdt", "cryptocurrency", &["daily"])));
        assert!(!query.matches(&ticker("BTCUSDT2", "cryptocurrency", &["daily"])));
    }

    #[test]
    fn test_market_filter() {
        let query = SubscriptionQuery::parse(None, Some("forex, cryptocurrency"), None);

        assert!(query.matches(&ticker("BTCUSDT", "cryptocurrency", &["daily"])));
        assert!(query.matches(&ticker("EURUSD", "forex", &["daily"])));
        assert!(!query.matches(&ticker("AAPL", "stocks", &["daily"])));
    }

    #[test]
    fn test_projection_keeps_ticker_with_empty_mapping() {
        let query = SubscriptionQuery::parse(None, None, Some("monthly"));
        let t = ticker("BTCUSDT", "cryptocurrency", &["daily", "weekly"]);

        let projected = query.project(&t);
        assert_eq!(projected.symbol, "BTCUSDT");
        assert!(projected.candlesticks.is_empty());
    }

    #[test]
    fn test_projection_restricts_series() {
        let query = SubscriptionQuery::parse(None, None, Some("daily, monthly"));
        let t = ticker("BTCUSDT", "cryptocurrency", &["daily", "weekly", "monthly"]);

        let projected = query.project(&t);
        assert_eq!(projected.candlesticks.len(), 2);
        assert!(projected.candlesticks.contains_key("daily"));
        assert!(projected.candlesticks.contains_key("monthly"));
    }

    #[test]
    fn test_apply_filters_and_projects() {
        let snapshot = vec![
            Arc::new(ticker("BTCUSDT", "cryptocurrency", &["daily", "weekly"])),
            Arc::new(ticker("EURUSD", "forex", &["daily"])),
        ];
        let query = SubscriptionQuery::parse(None, Some("forex"), Some("weekly"));

        let filtered = query.apply(&snapshot);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].symbol, "EURUSD");
        assert!(filtered[0].candlesticks.is_empty());
    }

    #[test]
    fn test_subscribe_request_parsing() {
        let raw = r#"{"symbols":"BTCUSDT, ETHUSDT","timeframes":"daily"}"#;
        let request = SubscribeRequest::parse(raw).unwrap();
        let query = request.into_query();

        assert_eq!(query.symbols.as_ref().unwrap().len(), 2);
        assert!(query.markets.is_none());
        assert_eq!(query.timeframes.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_subscribe_request_null_axes_mean_no_filtering() {
        let raw = r#"{"symbols":null,"markets":null,"timeframes":null}"#;
        let query = SubscribeRequest::parse(raw).unwrap().into_query();
        assert_eq!(query, SubscriptionQuery::default());
    }

    #[test]
    fn test_subscribe_request_rejects_malformed_payloads() {
        assert!(SubscribeRequest::parse("not json").is_err());
        assert!(SubscribeRequest::parse(r#"{"symbols":42}"#).is_err());
        assert!(SubscribeRequest::parse(r#"{"channels":["book"]}"#).is_err());
    }
}
