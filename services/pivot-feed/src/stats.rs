//! Aggregate pivot statistics over a filtered ticker set
//!
//! Read-only distribution views computed on demand from whatever ticker
//! set the caller passes in — typically the result of a filtered query.
//! Nothing here is cached; every call walks the set afresh.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ticker::Ticker;

use crate::pivots::{ticker_camarilla, ticker_cpr, CamSituation, PricePosition};

/// Distribution of CPR positions across a ticker set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CprStats {
    pub above_count: usize,
    pub below_count: usize,
    pub neutral_count: usize,
    /// Tickers whose band was explicitly not tested. A ticker without
    /// enough history counts as tested and stays out of this bucket.
    pub untested_count: usize,
    pub wide_count: usize,
    pub tight_count: usize,
    pub bulls_percent: Decimal,
    pub bears_percent: Decimal,
}

/// Distribution of Camarilla situations across a ticker set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CamStats {
    pub above_h4: usize,
    pub below_l4: usize,
    pub above_h3: usize,
    pub below_l3: usize,
    pub between_l3_h3: usize,
    pub bulls_percent: Decimal,
    pub bears_percent: Decimal,
}

/// Share of `part` in `total` as a percentage; 0 when `total` is 0.
fn percent(part: usize, total: usize) -> Decimal {
    Decimal::from(part)
        .checked_div(Decimal::from(total))
        .map(|r| r * Decimal::from(100))
        .unwrap_or(Decimal::ZERO)
}

/// CPR distribution for one timeframe over a ticker set.
///
/// Neutral tickers are excluded from the bulls/bears denominator. Width
/// above 1% of the pivot counts as wide, otherwise tight; tickers without
/// a computable CPR join neither width bucket.
pub fn cpr_stats(tickers: &[Ticker], timeframe: Option<&str>, future: bool) -> CprStats {
    let mut stats = CprStats::default();

    for ticker in tickers {
        let Some(cpr) = ticker_cpr(ticker, timeframe, future) else {
            continue;
        };

        match cpr.price_position {
            PricePosition::Above => stats.above_count += 1,
            PricePosition::Below => stats.below_count += 1,
            PricePosition::Neutral => stats.neutral_count += 1,
        }

        if cpr.width > Decimal::ONE {
            stats.wide_count += 1;
        } else {
            stats.tight_count += 1;
        }

        if !cpr.is_tested {
            stats.untested_count += 1;
        }
    }

    let directional = stats.above_count + stats.below_count;
    stats.bulls_percent = percent(stats.above_count, directional);
    stats.bears_percent = percent(stats.below_count, directional);
    stats
}

/// Camarilla situation distribution for one timeframe over a ticker set.
///
/// A ticker without a computable result lands in the between-H3-L3 bucket.
/// Bulls/bears percentages run over the full ticker count.
pub fn cam_stats(tickers: &[Ticker], timeframe: Option<&str>, future: bool) -> CamStats {
    let mut stats = CamStats::default();

    for ticker in tickers {
        match ticker_camarilla(ticker, timeframe, future).map(|cam| cam.situation) {
            Some(CamSituation::AboveH4) => stats.above_h4 += 1,
            Some(CamSituation::AboveH3) => stats.above_h3 += 1,
            Some(CamSituation::BelowL3) => stats.below_l3 += 1,
            Some(CamSituation::BelowL4) => stats.below_l4 += 1,
            Some(CamSituation::BetweenH3L3) | None => stats.between_l3_h3 += 1,
        }
    }

    stats.bulls_percent = percent(stats.above_h4 + stats.above_h3, tickers.len());
    stats.bears_percent = percent(stats.below_l4 + stats.below_l3, tickers.len());
    stats
}
