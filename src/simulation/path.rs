//! Intra-candle price path synthesis.
//!
//! A path pins four anchors (open at the first slot, close at the last, high
//! and low at two distinct random interior slots) and fills the gaps between
//! consecutive anchors with a jittered linear walk. The anchors are exact;
//! everything else is noise around the straight line between them.

use rand::Rng;

use crate::error::AppError;
use crate::model::candle::{format_timestamp_ms, Candle};
use crate::model::price_point::PricePoint;

pub const DEFAULT_POINTS_PER_CANDLE: usize = 60;
/// Two boundary anchors plus two distinct interior extremes.
pub const MIN_POINTS_PER_CANDLE: usize = 4;
/// Jitter half-width as a fraction of the segment's price distance.
const JITTER_FRACTION: f64 = 0.1;

/// Generate `num_points` sub-prices for `candle`.
///
/// The first point is the open, the last the close, and exactly one interior
/// point each carries the high and the low. Randomness comes only from `rng`,
/// so a seeded generator reproduces the same path.
///
/// Unlike a plain `a + p*(b-a) + jitter` walk, interpolated prices are clamped
/// to `[low, high]` afterwards, so no sub-price leaves the candle's range.
pub fn generate_price_path<R: Rng + ?Sized>(
    candle: &Candle,
    num_points: usize,
    rng: &mut R,
) -> Result<Vec<PricePoint>, AppError> {
    if num_points < MIN_POINTS_PER_CANDLE {
        return Err(AppError::InvalidArgument(format!(
            "num_points must be >= {}, got {}",
            MIN_POINTS_PER_CANDLE, num_points
        )));
    }
    if ![candle.open, candle.high, candle.low, candle.close]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(AppError::InvalidArgument(format!(
            "candle at {} has non-finite prices",
            candle.open_time
        )));
    }

    let last = num_points - 1;
    let (high_idx, low_idx) = pick_extreme_slots(num_points, rng);

    let mut prices = vec![0.0; num_points];
    let mut anchored = vec![false; num_points];
    for (idx, price) in [
        (0, candle.open),
        (last, candle.close),
        (high_idx, candle.high),
        (low_idx, candle.low),
    ] {
        prices[idx] = price;
        anchored[idx] = true;
    }

    let first_extreme = high_idx.min(low_idx);
    let second_extreme = high_idx.max(low_idx);
    for (start, end) in [
        (0, first_extreme),
        (first_extreme, second_extreme),
        (second_extreme, last),
    ] {
        fill_segment(&mut prices, &anchored, start, end, rng);
    }

    for (price, is_anchor) in prices.iter_mut().zip(&anchored) {
        if !is_anchor {
            *price = price.clamp(candle.low.min(candle.high), candle.high.max(candle.low));
        }
        *price = round_price(*price);
    }

    let points = prices
        .into_iter()
        .enumerate()
        .map(|(i, price)| PricePoint {
            timestamp: format_timestamp_ms(slot_timestamp_ms(candle, i, num_points)),
            price,
            is_open: i == 0,
            is_high: i == high_idx,
            is_low: i == low_idx,
            is_close: i == last,
            point_index: i,
            total_points: num_points,
        })
        .collect();
    Ok(points)
}

/// Draw two distinct slots from `[1, num_points - 2]`; the first is the high.
fn pick_extreme_slots<R: Rng + ?Sized>(num_points: usize, rng: &mut R) -> (usize, usize) {
    let interior = 1..num_points - 1;
    let high_idx = rng.gen_range(interior.clone());
    let mut low_idx = rng.gen_range(interior.clone());
    while low_idx == high_idx {
        low_idx = rng.gen_range(interior.clone());
    }
    (high_idx, low_idx)
}

fn fill_segment<R: Rng + ?Sized>(
    prices: &mut [f64],
    anchored: &[bool],
    start: usize,
    end: usize,
    rng: &mut R,
) {
    if end <= start + 1 {
        return;
    }
    let from = prices[start];
    let to = prices[end];
    let distance = to - from;
    let span = (end - start) as f64;
    for i in start + 1..end {
        if anchored[i] {
            continue;
        }
        let progress = (i - start) as f64 / span;
        let jitter = rng.gen_range(-JITTER_FRACTION..=JITTER_FRACTION) * distance.abs();
        prices[i] = from + progress * distance + jitter;
    }
}

/// Evenly spaced over `[open_time, close_time]`, both ends inclusive.
fn slot_timestamp_ms(candle: &Candle, slot: usize, num_points: usize) -> u64 {
    let span = candle.close_time.saturating_sub(candle.open_time) as u128;
    let offset = span * slot as u128 / (num_points - 1) as u128;
    candle.open_time + offset as u64
}

pub fn round_price(price: f64) -> f64 {
    (price * 1000.0).round() / 1000.0
}
