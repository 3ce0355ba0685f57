//! Domain types for the pivot feed service
//!
//! Shared type definitions used by the ticker store, the pivot engine, and
//! the broadcast layers.
//!
//! # Modules
//! - `candle`: OHLC candles and session selection
//! - `ticker`: tracked instruments and their candlestick histories

pub mod candle;
pub mod ticker;

// Library version constant
pub const LIB_VERSION: &str = "0.1.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::candle::*;
    pub use crate::ticker::*;
}
