//! Top-N selection of unconsumed items from a full catalog score vector.
//!
//! Only the `n_rec + |consumed|` best items are isolated with a
//! partition step; the full catalog is never sorted.
use std::cmp::Ordering;

use crate::data::ConsumedSet;
use crate::ItemId;

/// Ranked `(item_id, score)` pairs, best first.
pub type RankedList = Vec<(ItemId, f32)>;

/// Descending score, then ascending item id. Scores are finite, and
/// `0.0` and `-0.0` compare equal.
fn rank_order(a: &(ItemId, f32), b: &(ItemId, f32)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(&b.0))
}

/// Return up to `n_rec` items not present in `consumed`, ranked by
/// descending score. Ties are broken by ascending item id.
pub fn select(scores: &[f32], consumed: &ConsumedSet, n_rec: usize) -> RankedList {
    if n_rec == 0 || scores.is_empty() {
        return Vec::new();
    }

    let count = (n_rec + consumed.len()).min(scores.len());

    let mut candidates: Vec<(ItemId, f32)> = scores.iter().cloned().enumerate().collect();

    if count < candidates.len() {
        candidates.select_nth_unstable_by(count - 1, rank_order);
        candidates.truncate(count);
    }

    candidates.sort_by(rank_order);

    candidates
        .into_iter()
        .filter(|&(item_id, _)| !consumed.contains(item_id))
        .take(n_rec)
        .collect()
}
