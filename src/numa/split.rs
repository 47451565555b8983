//! Proportional resource splitting.
//!
//! Every integer share handed out by the allocator goes through here, so this
//! is the only place rounding drift can enter a plan. Values are rounded
//! half-up to one decimal digit and then truncated to their integer part:
//! `66.66 -> 66.7 -> 66`, `2.96 -> 3.0 -> 3`. The arithmetic is exact
//! (integer only), so `x.x5` boundaries always round up.

/// Rounds `numerator / denominator` half-up to one decimal digit and returns
/// the result in tenths. A zero denominator yields zero.
pub fn round_half_up_tenths(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    let numerator = u128::from(numerator);
    let denominator = u128::from(denominator);
    let tenths = (numerator * 20 + denominator) / (denominator * 2);
    u64::try_from(tenths).unwrap_or(u64::MAX)
}

/// Integer percentage that `count` represents of `total`.
pub fn percentage(count: u64, total: u64) -> u64 {
    whole(count.saturating_mul(100), total)
}

/// Integer share of `total` corresponding to `percentage`.
pub fn share(percentage: u64, total: u64) -> u64 {
    whole(percentage.saturating_mul(total), 100)
}

fn whole(numerator: u64, denominator: u64) -> u64 {
    round_half_up_tenths(numerator, denominator) / 10
}
