//! Pivot engine: CPR and Camarilla level computation
//!
//! Pure, stateless functions deriving pivot analytics from a pair of OHLC
//! sessions. Results are computed on demand from immutable snapshots and
//! never stored, so there is no cache to invalidate.
//!
//! In future mode the current session itself is the reference session;
//! otherwise the previous session is. A ticker without the required history
//! simply has no result (`None`), which is not an error.
//!
//! All arithmetic uses `Decimal`. Divisions with a data-dependent divisor
//! use `checked_div` and degrade to zero on a degenerate session (zero
//! pivot, zero low) instead of panicking; derived output for such sessions
//! is unspecified but must never take the service down.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use types::candle::Candle;
use types::ticker::Ticker;

/// Position of the current close relative to the CPR band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricePosition {
    Above,
    Below,
    Neutral,
}

/// Position of the live price relative to a single Camarilla level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceStatus {
    Above,
    Below,
}

/// Signed percent distances from the current close to each CPR level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CprDistance {
    pub p: Decimal,
    pub bc: Decimal,
    pub tc: Decimal,
}

/// Central Pivot Range analytics for one session pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CprResult {
    /// Pivot: (H + L + C) / 3.
    pub p: Decimal,
    /// Bottom central level. Always <= `tc`.
    pub bc: Decimal,
    /// Top central level.
    pub tc: Decimal,
    /// Band width as a percentage of the pivot, rounded to 2 decimals.
    pub width: Decimal,
    /// Whether bc or tc fell inside the current session's range.
    /// Always false in future mode.
    pub is_tested: bool,
    pub price_position: PricePosition,
    pub distance: CprDistance,
    /// How close price came to the band without entering it: percent
    /// distance from the current low to tc when above, from the current
    /// high to bc otherwise. Zero in future mode.
    pub closest_approximation: Decimal,
}

/// The eight Camarilla levels, in their canonical order.
///
/// The declaration order doubles as the tie-break order for the nearest
/// level selection, so it must stay h3..h6, l3..l6.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CamLevel {
    H3,
    H4,
    H5,
    H6,
    L3,
    L4,
    L5,
    L6,
}

impl CamLevel {
    /// All levels in canonical order.
    pub fn all() -> &'static [CamLevel] {
        &[
            CamLevel::H3,
            CamLevel::H4,
            CamLevel::H5,
            CamLevel::H6,
            CamLevel::L3,
            CamLevel::L4,
            CamLevel::L5,
            CamLevel::L6,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CamLevel::H3 => "h3",
            CamLevel::H4 => "h4",
            CamLevel::H5 => "h5",
            CamLevel::H6 => "h6",
            CamLevel::L3 => "l3",
            CamLevel::L4 => "l4",
            CamLevel::L5 => "l5",
            CamLevel::L6 => "l6",
        }
    }
}

impl fmt::Display for CamLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading situation derived from the Camarilla level statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CamSituation {
    #[serde(rename = "Above H4")]
    AboveH4,
    #[serde(rename = "Above H3")]
    AboveH3,
    #[serde(rename = "Below L3")]
    BelowL3,
    #[serde(rename = "Below L4")]
    BelowL4,
    #[serde(rename = "Between H3-L3")]
    BetweenH3L3,
}

impl fmt::Display for CamSituation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CamSituation::AboveH4 => "Above H4",
            CamSituation::AboveH3 => "Above H3",
            CamSituation::BelowL3 => "Below L3",
            CamSituation::BelowL4 => "Below L4",
            CamSituation::BetweenH3L3 => "Between H3-L3",
        };
        f.write_str(s)
    }
}

/// Camarilla analytics for one session pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CamarillaResult {
    pub h3: Decimal,
    pub h4: Decimal,
    pub h5: Decimal,
    pub h6: Decimal,
    pub l3: Decimal,
    pub l4: Decimal,
    pub l5: Decimal,
    pub l6: Decimal,
    /// Live-price position per level.
    pub price_status: BTreeMap<CamLevel, PriceStatus>,
    pub situation: CamSituation,
    /// Signed percent distance from the current close to each level.
    pub distance: BTreeMap<CamLevel, Decimal>,
    /// Level with the minimum signed distance (first wins on ties).
    pub nearest: CamLevel,
}

impl CamarillaResult {
    /// Value of a single level.
    pub fn level(&self, level: CamLevel) -> Decimal {
        match level {
            CamLevel::H3 => self.h3,
            CamLevel::H4 => self.h4,
            CamLevel::H5 => self.h5,
            CamLevel::H6 => self.h6,
            CamLevel::L3 => self.l3,
            CamLevel::L4 => self.l4,
            CamLevel::L5 => self.l5,
            CamLevel::L6 => self.l6,
        }
    }
}

/// Signed percent difference of `a` relative to `b`: (a - b) / b * 100.
///
/// Zero `b` degrades to zero instead of panicking.
pub fn percent_difference(a: Decimal, b: Decimal) -> Decimal {
    (a - b)
        .checked_div(b)
        .map(|r| r * Decimal::from(100))
        .unwrap_or(Decimal::ZERO)
}

/// Inclusive range check.
fn in_range(value: Decimal, low: Decimal, high: Decimal) -> bool {
    value >= low && value <= high
}

/// Compute the Central Pivot Range for one session pair.
///
/// `reference` is the session the levels are derived from; `current` is the
/// session the position/distance/tested checks run against. In future mode
/// the caller passes the current session as the reference.
pub fn compute_cpr(reference: &Candle, current: &Candle, future: bool) -> CprResult {
    let two = Decimal::from(2);
    let hundred = Decimal::from(100);

    let p = (reference.high + reference.low + reference.close) / Decimal::from(3);
    let mut bc = (reference.high + reference.low) / two;
    let mut tc = p * two - bc;

    // bc <= tc must hold post-computation
    if bc > tc {
        std::mem::swap(&mut bc, &mut tc);
    }

    let width = (tc - bc)
        .abs()
        .checked_div(p)
        .map(|r| (r * hundred).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .unwrap_or(Decimal::ZERO);

    let is_tested = !future
        && (in_range(bc, current.low, current.high) || in_range(tc, current.low, current.high));

    let price_position = if current.close >= tc {
        PricePosition::Above
    } else if current.close <= bc {
        PricePosition::Below
    } else {
        PricePosition::Neutral
    };

    let distance = CprDistance {
        p: percent_difference(current.close, p),
        bc: percent_difference(current.close, bc),
        tc: percent_difference(current.close, tc),
    };

    let closest_approximation = if future {
        Decimal::ZERO
    } else if price_position == PricePosition::Above {
        percent_difference(current.low, tc)
    } else {
        percent_difference(current.high, bc)
    };

    CprResult {
        p,
        bc,
        tc,
        width,
        is_tested,
        price_position,
        distance,
        closest_approximation,
    }
}

/// Compute the Camarilla levels for one session pair.
///
/// `live_price` is the latest traded price and drives the per-level status
/// and the situation, independently of which reference session is in use.
pub fn compute_camarilla(
    reference: &Candle,
    current: &Candle,
    live_price: Decimal,
) -> CamarillaResult {
    let two = Decimal::from(2);
    let four = Decimal::from(4);
    // Classic Camarilla factors
    let range_factor = Decimal::new(11, 1); // 1.1
    let extension_factor = Decimal::new(1168, 3); // 1.168

    let range = reference.high - reference.low;
    let close = reference.close;

    let h4 = close + range_factor * range / two;
    let h3 = close + range_factor * range / four;
    let l3 = close - range_factor * range / four;
    let l4 = close - range_factor * range / two;
    let h6 = reference
        .high
        .checked_div(reference.low)
        .map(|r| r * close)
        .unwrap_or(Decimal::ZERO);
    let l6 = two * close - h6;
    let h5 = h4 + extension_factor * (h4 - h3);
    let l5 = l4 - extension_factor * (l3 - l4);

    let mut result = CamarillaResult {
        h3,
        h4,
        h5,
        h6,
        l3,
        l4,
        l5,
        l6,
        price_status: BTreeMap::new(),
        situation: CamSituation::BetweenH3L3,
        distance: BTreeMap::new(),
        nearest: CamLevel::H3,
    };

    for &level in CamLevel::all() {
        let status = if live_price > result.level(level) {
            PriceStatus::Above
        } else {
            PriceStatus::Below
        };
        result.price_status.insert(level, status);
    }

    let above = |level: CamLevel| result.price_status[&level] == PriceStatus::Above;
    let situation = if above(CamLevel::H4) {
        CamSituation::AboveH4
    } else if above(CamLevel::H3) {
        CamSituation::AboveH3
    } else if !above(CamLevel::L3) && above(CamLevel::L4) {
        CamSituation::BelowL3
    } else if !above(CamLevel::L4) {
        CamSituation::BelowL4
    } else {
        CamSituation::BetweenH3L3
    };
    result.situation = situation;

    for &level in CamLevel::all() {
        result
            .distance
            .insert(level, percent_difference(current.close, result.level(level)));
    }

    // Nearest level by minimum *signed* distance, first wins on ties.
    // Deliberately not the minimum absolute distance.
    let mut nearest = CamLevel::H3;
    let mut nearest_distance = result.distance[&CamLevel::H3];
    for &level in CamLevel::all() {
        let d = result.distance[&level];
        if d < nearest_distance {
            nearest = level;
            nearest_distance = d;
        }
    }
    result.nearest = nearest;

    result
}

/// CPR for a ticker's timeframe, or `None` without enough history.
pub fn ticker_cpr(ticker: &Ticker, timeframe: Option<&str>, future: bool) -> Option<CprResult> {
    let current = ticker.current_session(timeframe)?;
    let reference = if future {
        current
    } else {
        ticker.previous_session(timeframe)?
    };
    Some(compute_cpr(reference, current, future))
}

/// Camarilla for a ticker's timeframe, or `None` without enough history.
///
/// The ticker's live price feeds the level statuses; future mode only
/// changes which session the levels are derived from.
pub fn ticker_camarilla(
    ticker: &Ticker,
    timeframe: Option<&str>,
    future: bool,
) -> Option<CamarillaResult> {
    let current = ticker.current_session(timeframe)?;
    let reference = if future {
        current
    } else {
        ticker.previous_session(timeframe)?
    };
    Some(compute_camarilla(reference, current, ticker.price()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use types::ticker::CandlesByTimeframe;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn candle(high: &str, low: &str, close: &str) -> Candle {
        Candle::new(d(low), d(high), d(low), d(close))
    }

    #[test]
    fn test_cpr_reference_values() {
        // H=110, L=90, C=105 → p=101.666…, bc=100, tc=103.333…, width≈3.28
        let reference = candle("110", "90", "105");
        let current = candle("112", "102", "108");

        let cpr = compute_cpr(&reference, &current, false);

        assert_eq!(cpr.p.round_dp(4), d("101.6667"));
        assert_eq!(cpr.bc, d("100"));
        assert_eq!(cpr.tc.round_dp(4), d("103.3333"));
        assert_eq!(cpr.width, d("3.28"));
    }

    #[test]
    fn test_cpr_swaps_bc_tc_when_close_is_weak() {
        // Close below the session midpoint puts the raw tc under bc
        let reference = candle("110", "90", "95");
        let current = candle("100", "90", "96");

        let cpr = compute_cpr(&reference, &current, false);

        assert!(cpr.bc <= cpr.tc);
        assert_eq!(cpr.bc.round_dp(3), d("96.667"));
        assert_eq!(cpr.tc, d("100"));
    }

    #[test]
    fn test_cpr_is_tested_bounds_are_inclusive() {
        let reference = candle("110", "90", "105"); // bc=100, tc=103.33…
        // Current low exactly on bc
        let touching = candle("101", "100", "100.5");
        assert!(compute_cpr(&reference, &touching, false).is_tested);

        // Range entirely above both levels
        let clear = candle("110", "105", "108");
        assert!(!compute_cpr(&reference, &clear, false).is_tested);
    }

    #[test]
    fn test_cpr_price_position_thresholds() {
        // Symmetric session: p = bc = tc = 100
        let reference = candle("110", "90", "100");

        let on_band = candle("105", "95", "100");
        assert_eq!(
            compute_cpr(&reference, &on_band, false).price_position,
            PricePosition::Above // close >= tc checked first
        );

        let below = candle("99", "90", "95");
        assert_eq!(
            compute_cpr(&reference, &below, false).price_position,
            PricePosition::Below
        );

        // Asymmetric session gives a real band for the neutral case
        let wide = candle("110", "90", "105"); // bc=100, tc=103.33…
        let inside = candle("104", "100", "102");
        assert_eq!(
            compute_cpr(&wide, &inside, false).price_position,
            PricePosition::Neutral
        );
    }

    #[test]
    fn test_cpr_future_mode() {
        let current = candle("110", "90", "105");
        let cpr = compute_cpr(&current, &current, true);

        assert!(!cpr.is_tested);
        assert_eq!(cpr.closest_approximation, Decimal::ZERO);
    }

    #[test]
    fn test_cpr_closest_approximation_sides() {
        let reference = candle("110", "90", "105"); // bc=100, tc=103.33…

        // Above: measured from the current low to tc
        let above = candle("112", "104", "110");
        let cpr = compute_cpr(&reference, &above, false);
        assert_eq!(cpr.price_position, PricePosition::Above);
        assert_eq!(cpr.closest_approximation, percent_difference(d("104"), cpr.tc));

        // Not above: measured from the current high to bc
        let below = candle("98", "92", "95");
        let cpr = compute_cpr(&reference, &below, false);
        assert_eq!(cpr.closest_approximation, percent_difference(d("98"), cpr.bc));
    }

    #[test]
    fn test_percent_difference_zero_base() {
        assert_eq!(percent_difference(d("5"), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percent_difference(d("110"), d("100")), d("10"));
        assert_eq!(percent_difference(d("90"), d("100")), d("-10"));
    }

    #[test]
    fn test_camarilla_reference_values() {
        // close=100, H=110, L=90
        let reference = candle("110", "90", "100");
        let current = candle("108", "98", "100");

        let cam = compute_camarilla(&reference, &current, d("100"));

        assert_eq!(cam.h4, d("111"));
        assert_eq!(cam.h3, d("105.5"));
        assert_eq!(cam.l3, d("94.5"));
        assert_eq!(cam.l4, d("89"));
        assert_eq!(cam.h6.round_dp(3), d("122.222"));
        assert_eq!(cam.h5.round_dp(3), d("117.424"));
        assert_eq!(cam.l5.round_dp(3), d("82.576"));
        assert_eq!(cam.l6.round_dp(3), d("77.778"));
    }

    #[test]
    fn test_camarilla_situation_rule_order() {
        let reference = candle("110", "90", "100");
        let current = candle("108", "98", "100");
        let situation =
            |live: &str| compute_camarilla(&reference, &current, d(live)).situation;

        assert_eq!(situation("120"), CamSituation::AboveH4);
        assert_eq!(situation("107"), CamSituation::AboveH3);
        assert_eq!(situation("100"), CamSituation::BetweenH3L3);
        assert_eq!(situation("92"), CamSituation::BelowL3);
        assert_eq!(situation("85"), CamSituation::BelowL4);
    }

    #[test]
    fn test_camarilla_price_status_per_level() {
        let reference = candle("110", "90", "100");
        let current = candle("108", "98", "100");

        let cam = compute_camarilla(&reference, &current, d("107"));
        assert_eq!(cam.price_status[&CamLevel::H3], PriceStatus::Above);
        assert_eq!(cam.price_status[&CamLevel::H4], PriceStatus::Below);
        // Exactly on a level counts as below (strict greater-than)
        let cam = compute_camarilla(&reference, &current, d("105.5"));
        assert_eq!(cam.price_status[&CamLevel::H3], PriceStatus::Below);
    }

    #[test]
    fn test_camarilla_nearest_uses_signed_distance() {
        // With close=100 every level above price has a negative distance,
        // so the minimum signed distance lands on the highest level (h6),
        // not on the closest one in absolute terms (h3).
        let reference = candle("110", "90", "100");
        let current = candle("108", "98", "100");

        let cam = compute_camarilla(&reference, &current, d("100"));
        assert_eq!(cam.nearest, CamLevel::H6);
    }

    #[test]
    fn test_camarilla_degenerate_low_does_not_panic() {
        let reference = candle("10", "0", "5");
        let current = candle("10", "0", "5");

        let cam = compute_camarilla(&reference, &current, d("5"));
        // h6 is undefined for a zero low; it degrades to zero
        assert_eq!(cam.h6, Decimal::ZERO);
    }

    fn single_tf_ticker(candles: Vec<Candle>) -> Ticker {
        let mut candlesticks = CandlesByTimeframe::new();
        candlesticks.insert("daily".to_string(), candles);
        Ticker::new("BTCUSDT", "cryptocurrency", "binance", candlesticks)
    }

    #[test]
    fn test_ticker_cpr_requires_previous_session() {
        let ticker = single_tf_ticker(vec![candle("110", "90", "105")]);

        assert!(ticker_cpr(&ticker, Some("daily"), false).is_none());
        // Future mode references the current session, so one candle suffices
        assert!(ticker_cpr(&ticker, Some("daily"), true).is_some());
        // Unknown timeframe has no sessions at all
        assert!(ticker_cpr(&ticker, Some("monthly"), true).is_none());
    }

    #[test]
    fn test_ticker_camarilla_uses_live_price() {
        let ticker = single_tf_ticker(vec![
            candle("110", "90", "100"),
            candle("125", "115", "120"), // current close drives price()
        ]);

        let cam = ticker_camarilla(&ticker, Some("daily"), false).unwrap();
        // live price 120 is above h4=111
        assert_eq!(cam.situation, CamSituation::AboveH4);
    }

    proptest! {
        #[test]
        fn prop_cpr_band_is_ordered_and_width_nonnegative(
            low in 0u64..100_000,
            high_delta in 0u64..100_000,
            close_frac in 0u64..=1_000,
            cur_low in 0u64..100_000,
            cur_high_delta in 0u64..100_000,
            cur_close_frac in 0u64..=1_000,
        ) {
            let make = |low: u64, delta: u64, frac: u64| {
                let high = low + delta;
                // close somewhere inside [low, high]
                let close = low + delta * frac / 1_000;
                Candle::new(
                    Decimal::from(low),
                    Decimal::from(high),
                    Decimal::from(low),
                    Decimal::from(close),
                )
            };

            let reference = make(low, high_delta, close_frac);
            let current = make(cur_low, cur_high_delta, cur_close_frac);

            let cpr = compute_cpr(&reference, &current, false);
            prop_assert!(cpr.bc <= cpr.tc);
            prop_assert!(cpr.width >= Decimal::ZERO);
        }
    }
}
