//! Ticker store: authoritative candlestick state
//!
//! Single logical writer (the exchange feed) mutates the store through
//! `apply_update`; any number of concurrent readers work off immutable
//! snapshots. A ticker's candlestick mapping is always replaced wholesale —
//! the map holds `Arc<Ticker>` and swaps the whole entry — so a reader sees
//! either the old or the fully-new ticker, never a mix.
//!
//! Every applied update bumps a monotonic revision and emits a
//! `StoreUpdate` notification carrying the post-update snapshot; the
//! broadcaster registers for these exactly once at startup.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use types::ticker::{CandlesByTimeframe, Ticker};

use crate::events::{StoreSnapshot, StoreUpdate};
use crate::query::SubscriptionQuery;

/// Configuration for the ticker store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of the update notification channel. A slow consumer that
    /// falls further behind than this observes a lag error, not lost state:
    /// notifications carry full snapshots.
    pub update_channel_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            update_channel_capacity: 1024,
        }
    }
}

struct Inner {
    tickers: BTreeMap<String, Arc<Ticker>>,
    revision: u64,
}

/// Shared, continuously updated ticker collection.
pub struct TickerStore {
    inner: RwLock<Inner>,
    updates: broadcast::Sender<StoreUpdate>,
}

impl TickerStore {
    pub fn new(config: StoreConfig) -> Self {
        info!(
            update_channel_capacity = config.update_channel_capacity,
            "TickerStore initialized"
        );
        let (updates, _) = broadcast::channel(config.update_channel_capacity);
        Self {
            inner: RwLock::new(Inner {
                tickers: BTreeMap::new(),
                revision: 0,
            }),
            updates,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(StoreConfig::default())
    }

    /// Register for update notifications.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<StoreUpdate> {
        self.updates.subscribe()
    }

    /// Apply one feed update: replace the full candlestick mapping for a
    /// symbol, creating the ticker on first sighting. Returns the new
    /// store revision.
    ///
    /// Candles with high < low are accepted (derived output for them is
    /// unspecified) but flagged, since the feed is expected to validate.
    pub fn apply_update(
        &self,
        symbol: &str,
        market: &str,
        exchange: &str,
        candlesticks: CandlesByTimeframe,
    ) -> u64 {
        let invalid = candlesticks
            .values()
            .flatten()
            .filter(|candle| !candle.is_valid())
            .count();
        if invalid > 0 {
            warn!(
                symbol,
                invalid_candles = invalid,
                "Feed update contains candles with high < low"
            );
        }

        let update = {
            let mut inner = self
                .inner
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            inner.revision += 1;

            let ticker = Arc::new(Ticker::new(symbol, market, exchange, candlesticks));
            let created = inner.tickers.insert(symbol.to_string(), ticker).is_none();

            if created {
                info!(
                    symbol,
                    market,
                    exchange,
                    revision = inner.revision,
                    "Tracking new ticker"
                );
            } else {
                debug!(symbol, revision = inner.revision, "Ticker history replaced");
            }

            StoreUpdate {
                revision: inner.revision,
                symbol: symbol.to_string(),
                snapshot: Arc::new(inner.tickers.values().cloned().collect()),
            }
        };

        let revision = update.revision;
        // No registered consumer yet is fine; updates only matter once the
        // broadcaster runs.
        let _ = self.updates.send(update);
        revision
    }

    /// Atomic point-in-time view of every tracked ticker.
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::new(inner.tickers.values().cloned().collect())
    }

    /// Current store revision.
    pub fn revision(&self) -> u64 {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.revision
    }

    /// Whether at least one feed update has been applied. The transport
    /// collaborator uses this to reject queries before first data.
    pub fn is_ready(&self) -> bool {
        self.revision() > 0
    }

    /// Number of tracked tickers.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One-shot filtered query over the current snapshot.
    ///
    /// `symbols`/`markets` are comma-separated allow-lists (absent = all);
    /// `timeframes` restricts which series each returned ticker carries.
    /// Unknown values yield empty — not erroring — results.
    pub fn filtered_tickers(
        &self,
        symbols: Option<&str>,
        markets: Option<&str>,
        timeframes: Option<&str>,
    ) -> Vec<Ticker> {
        let query = SubscriptionQuery::parse(symbols, markets, timeframes);
        query.apply(&self.snapshot())
    }

    /// Distinct symbols, optionally restricted by a market allow-list.
    pub fn symbols_list(&self, markets: Option<&str>) -> Vec<String> {
        let query = SubscriptionQuery::parse(None, markets, None);
        let symbols: BTreeSet<String> = self
            .snapshot()
            .iter()
            .filter(|ticker| query.matches(ticker))
            .map(|ticker| ticker.symbol.clone())
            .collect();
        symbols.into_iter().collect()
    }
}

impl Default for TickerStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}
