//! Pivot Feed Service
//!
//! Holds continuously updated OHLC candlestick histories for many trading
//! instruments across several timeframes and produces:
//! - Pure CPR (Central Pivot Range) and Camarilla pivot analytics
//! - Filtered one-shot ticker queries and symbol listings
//! - Per-subscriber filtered snapshot pushes on every store update
//! - Aggregate CPR/Camarilla distribution statistics
//!
//! # Architecture
//!
//! ```text
//! Exchange feed (external)
//!        │ apply_update
//!    ┌───▼────────┐
//!    │ TickerStore│  ← atomic per-symbol replacement, emits StoreUpdate
//!    └───┬────────┘
//!        │ update notifications
//!   ┌────▼───────┐      ┌──────────────────────┐
//!   │ Broadcaster│──────│ SubscriptionRegistry │
//!   └────┬───────┘      └──────────────────────┘
//!        │ one filtered push per subscribed connection
//!        ▼
//!   per-connection outbound channels (transport-owned)
//! ```
//!
//! One-shot queries (the HTTP-style collaborator) read the store directly;
//! pivot results and aggregate statistics are computed on demand from
//! immutable snapshots and never cached.

pub mod broadcast;
pub mod events;
pub mod pivots;
pub mod query;
pub mod stats;
pub mod store;
pub mod subscriptions;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
