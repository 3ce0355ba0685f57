//! Shared event and snapshot documents for the pivot feed
//!
//! `StoreUpdate` is the internal notification raised by the ticker store
//! after every applied feed update. It carries the post-update snapshot so
//! that every consumer of one notification observes exactly the same state,
//! no matter when it gets around to filtering.
//!
//! `TickerSnapshot` is the outbound push document: a filtered ticker set
//! tagged with the store revision it was derived from.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use types::ticker::Ticker;

/// Immutable point-in-time view of every tracked ticker.
///
/// Cheap to clone and to hand across tasks; individual tickers are shared,
/// never mutated in place.
pub type StoreSnapshot = Arc<Vec<Arc<Ticker>>>;

/// Notification raised by the store after one applied update.
#[derive(Debug, Clone)]
pub struct StoreUpdate {
    /// Monotonic store revision, bumped once per applied update.
    pub revision: u64,
    /// Symbol whose candlestick mapping was replaced.
    pub symbol: String,
    /// Full post-update snapshot.
    pub snapshot: StoreSnapshot,
}

/// Outbound push document: one filtered view of the ticker set.
///
/// The wire-level encoding of this document is the transport's concern;
/// the field set itself must round-trip losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    /// Store revision this snapshot was derived from.
    pub revision: u64,
    /// Tickers matching the subscriber's query, with non-matching
    /// timeframe series removed.
    pub tickers: Vec<Ticker>,
}
