//! Weight of a matched item from its appearance history
//!
//! `weight = rank_score * 0.6 + frequency_score * 0.3 + hotness_score * 0.1`
//!
//! - rank score: mean over appearances of `11 - min(rank, 10)`
//! - frequency score: `min(match_count, 10) * 10`
//! - hotness score: share of appearances ranked at or above the threshold, times 100
//!
//! The result is rounded to two decimals.

use crate::models::NewsMatchData;

pub const RANK_WEIGHT: f64 = 0.6;
pub const FREQUENCY_WEIGHT: f64 = 0.3;
pub const HOTNESS_WEIGHT: f64 = 0.1;

/// Default rank at or above which an appearance counts as hot
pub const DEFAULT_RANK_THRESHOLD: u32 = 5;

/// Compute the weight of one matched item
pub fn calculate_weight(data: &NewsMatchData, rank_threshold: u32) -> f64 {
    let weight = rank_score(&data.ranks) * RANK_WEIGHT
        + frequency_score(data.match_count) * FREQUENCY_WEIGHT
        + hotness_score(&data.ranks, rank_threshold) * HOTNESS_WEIGHT;
    round2(weight)
}

fn rank_score(ranks: &[u32]) -> f64 {
    if ranks.is_empty() {
        return 0.0;
    }
    let total: u32 = ranks.iter().map(|r| 11 - (*r).clamp(1, 10)).sum();
    f64::from(total) / ranks.len() as f64
}

fn frequency_score(match_count: u32) -> f64 {
    f64::from(match_count.min(10)) * 10.0
}

fn hotness_score(ranks: &[u32], threshold: u32) -> f64 {
    if ranks.is_empty() {
        return 0.0;
    }
    let hot = ranks.iter().filter(|r| **r <= threshold).count();
    hot as f64 / ranks.len() as f64 * 100.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
