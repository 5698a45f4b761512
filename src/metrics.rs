//! Ranking and pointwise quality metrics.
//!
//! Ranking metrics take ground-truth and recommended items keyed by
//! user, average per-user values over `users` and use binary relevance.
//! Recommendation lists are expected to be unique and are truncated to
//! `k`. A user without ground truth, or without recommendations,
//! contributes `0` but still counts towards the mean.
use std::collections::HashMap;
use std::hash::BuildHasher;

use crate::{ItemId, UserId};

/// Ground-truth or recommended items keyed by user.
pub type UserItems<S> = HashMap<UserId, Vec<ItemId>, S>;

fn relevance(y_true: &[ItemId], y_reco: &[ItemId], k: usize) -> Vec<f32> {
    let mut rank_list = vec![0.0; k];

    for (position, item_id) in y_reco.iter().take(k).enumerate() {
        if y_true.contains(item_id) {
            rank_list[position] = 1.0;
        }
    }

    rank_list
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

fn macro_average<S, F>(
    y_true_list: &UserItems<S>,
    y_reco_list: &UserItems<S>,
    users: &[UserId],
    metric: F,
) -> f32
where
    S: BuildHasher,
    F: Fn(&[ItemId], &[ItemId]) -> f32,
{
    let per_user: Vec<f32> = users
        .iter()
        .map(|user| {
            let y_true = y_true_list.get(user).map(|x| x.as_slice()).unwrap_or(&[]);
            let y_reco = y_reco_list.get(user).map(|x| x.as_slice()).unwrap_or(&[]);
            metric(y_true, y_reco)
        })
        .collect();

    mean(&per_user)
}

/// Fraction of the `k` recommendation slots holding a relevant item.
pub fn precision(y_true: &[ItemId], y_reco: &[ItemId], k: usize) -> f32 {
    if k == 0 {
        return 0.0;
    }

    mean(&relevance(y_true, y_reco, k))
}

/// Fraction of the ground truth found in the top `k` recommendations.
pub fn recall(y_true: &[ItemId], y_reco: &[ItemId], k: usize) -> f32 {
    if y_true.is_empty() {
        return 0.0;
    }

    let hits = relevance(y_true, y_reco, k).iter().sum::<f32>();

    hits / y_true.len() as f32
}

/// Mean of prefix precisions taken at each hit position.
pub fn average_precision(y_true: &[ItemId], y_reco: &[ItemId], k: usize) -> f32 {
    let rank_list = relevance(y_true, y_reco, k);

    let mut hits = 0.0;
    let precisions: Vec<f32> = rank_list
        .iter()
        .enumerate()
        .filter(|&(_, &rel)| rel > 0.0)
        .map(|(position, _)| {
            hits += 1.0;
            hits / (position + 1) as f32
        })
        .collect();

    mean(&precisions)
}

fn dcg(rank_list: &[f32]) -> f32 {
    rank_list
        .iter()
        .enumerate()
        .map(|(position, &rel)| {
            if position == 0 {
                rel
            } else {
                rel / ((position + 2) as f32).log2()
            }
        })
        .sum()
}

/// Normalised discounted cumulative gain with an undiscounted first rank.
pub fn ndcg(y_true: &[ItemId], y_reco: &[ItemId], k: usize) -> f32 {
    let rank_list = relevance(y_true, y_reco, k);

    let mut ideal_list = rank_list.clone();
    ideal_list.sort_by(|a, b| b.total_cmp(a));

    let idcg = dcg(&ideal_list);

    if idcg > 0.0 {
        dcg(&rank_list) / idcg
    } else {
        0.0
    }
}

/// Macro-averaged precision@k.
pub fn precision_at_k<S: BuildHasher>(
    y_true_list: &UserItems<S>,
    y_reco_list: &UserItems<S>,
    users: &[UserId],
    k: usize,
) -> f32 {
    macro_average(y_true_list, y_reco_list, users, |t, r| precision(t, r, k))
}

/// Macro-averaged recall@k.
pub fn recall_at_k<S: BuildHasher>(
    y_true_list: &UserItems<S>,
    y_reco_list: &UserItems<S>,
    users: &[UserId],
    k: usize,
) -> f32 {
    macro_average(y_true_list, y_reco_list, users, |t, r| recall(t, r, k))
}

/// Mean average precision@k.
pub fn map_at_k<S: BuildHasher>(
    y_true_list: &UserItems<S>,
    y_reco_list: &UserItems<S>,
    users: &[UserId],
    k: usize,
) -> f32 {
    macro_average(y_true_list, y_reco_list, users, |t, r| {
        average_precision(t, r, k)
    })
}

/// Macro-averaged NDCG@k.
pub fn ndcg_at_k<S: BuildHasher>(
    y_true_list: &UserItems<S>,
    y_reco_list: &UserItems<S>,
    users: &[UserId],
    k: usize,
) -> f32 {
    macro_average(y_true_list, y_reco_list, users, |t, r| ndcg(t, r, k))
}

/// Root mean squared error.
pub fn rmse(y_true: &[f32], y_pred: &[f32]) -> f32 {
    let squared: Vec<f32> = izip!(y_true, y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .collect();

    mean(&squared).sqrt()
}

/// Mean absolute error.
pub fn mae(y_true: &[f32], y_pred: &[f32]) -> f32 {
    let absolute: Vec<f32> = izip!(y_true, y_pred).map(|(t, p)| (t - p).abs()).collect();

    mean(&absolute)
}

/// Coefficient of determination. `0` when the targets are constant.
pub fn r2(y_true: &[f32], y_pred: &[f32]) -> f32 {
    let target_mean = mean(y_true);

    let residual: f32 = izip!(y_true, y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let total: f32 = y_true.iter().map(|t| (t - target_mean).powi(2)).sum();

    if total > 0.0 {
        1.0 - residual / total
    } else {
        0.0
    }
}

/// Binary cross-entropy of probabilities `y_prob` against 0/1 labels.
pub fn log_loss(y_true: &[f32], y_prob: &[f32]) -> f32 {
    let eps = 1e-7;

    let losses: Vec<f32> = izip!(y_true, y_prob)
        .map(|(&t, &p)| {
            let p = p.max(eps).min(1.0 - eps);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .collect();

    mean(&losses)
}

/// Area under the ROC curve, with tied scores sharing their average rank.
///
/// Returns `0.5` when only one class is present.
pub fn roc_auc(y_true: &[f32], y_score: &[f32]) -> f32 {
    let mut pairs: Vec<(f32, bool)> = izip!(y_score, y_true)
        .map(|(&score, &label)| (score, label > 0.0))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let num_positive = pairs.iter().filter(|x| x.1).count();
    let num_negative = pairs.len() - num_positive;

    if num_positive == 0 || num_negative == 0 {
        return 0.5;
    }

    let mut positive_rank_sum = 0.0_f64;
    let mut start = 0;

    while start < pairs.len() {
        let mut stop = start;
        while stop < pairs.len() && pairs[stop].0 == pairs[start].0 {
            stop += 1;
        }

        // Ranks are 1-based; ties receive the mean of their span.
        let average_rank = (start + 1 + stop) as f64 / 2.0;
        let positives = pairs[start..stop].iter().filter(|x| x.1).count();
        positive_rank_sum += average_rank * positives as f64;

        start = stop;
    }

    let num_positive = num_positive as f64;
    let auc = (positive_rank_sum - num_positive * (num_positive + 1.0) / 2.0)
        / (num_positive * num_negative as f64);

    auc as f32
}
