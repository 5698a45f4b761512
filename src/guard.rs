//! Detection of users and items outside the fitted vocabulary.
use crate::{ItemId, UserId};

/// Vocabulary bounds of a fitted model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownGuard {
    num_users: usize,
    num_items: usize,
}

/// Result of checking a batch of `(user, item)` pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckedPairs {
    /// Positions where the user, the item, or both were unknown.
    pub unknown_indices: Vec<usize>,
    /// User ids with unknown positions replaced by `0`.
    pub user_ids: Vec<UserId>,
    /// Item ids with unknown positions replaced by `0`.
    pub item_ids: Vec<ItemId>,
}

impl CheckedPairs {
    /// Number of flagged positions.
    pub fn unknown_count(&self) -> usize {
        self.unknown_indices.len()
    }

    /// Overwrite the scores of flagged positions with `default`.
    pub fn fill_default(&self, predictions: &mut [f32], default: f32) {
        if self.unknown_indices.is_empty() {
            return;
        }

        warn!(
            "Replacing {} prediction(s) with default value {}",
            self.unknown_count(),
            default
        );

        for &idx in &self.unknown_indices {
            predictions[idx] = default;
        }
    }
}

impl UnknownGuard {
    /// Guard for ids in `[0, num_users)` and `[0, num_items)`.
    pub fn new(num_users: usize, num_items: usize) -> Self {
        UnknownGuard {
            num_users,
            num_items,
        }
    }

    /// Whether `user_id` belongs to the vocabulary.
    pub fn is_known_user(&self, user_id: UserId) -> bool {
        user_id < self.num_users
    }

    /// Whether `item_id` belongs to the vocabulary.
    pub fn is_known_item(&self, item_id: ItemId) -> bool {
        item_id < self.num_items
    }

    /// Flag and sanitize pairs containing unknown ids.
    ///
    /// Both ids of a flagged pair are replaced with `0` so that scoring
    /// never indexes out of bounds. Callers overwrite the corresponding
    /// scores afterwards with `CheckedPairs::fill_default`.
    pub fn check_pairs(&self, user_ids: &[UserId], item_ids: &[ItemId]) -> CheckedPairs {
        let mut unknown_users = Vec::new();
        let mut unknown_items = Vec::new();
        let mut unknown_indices = Vec::new();

        for (idx, (&user_id, &item_id)) in user_ids.iter().zip(item_ids).enumerate() {
            let known_user = self.is_known_user(user_id);
            let known_item = self.is_known_item(item_id);

            if !known_user {
                unknown_users.push(user_id);
            }
            if !known_item {
                unknown_items.push(item_id);
            }
            if !(known_user && known_item) {
                unknown_indices.push(idx);
            }
        }

        let mut user_ids = user_ids.to_owned();
        let mut item_ids = item_ids.to_owned();

        if !unknown_indices.is_empty() {
            warn!(
                "Detected {} unknown interaction(s), including user: {:?}, item: {:?}, \
                 will be handled as default prediction",
                unknown_indices.len(),
                unknown_users,
                unknown_items
            );

            for &idx in &unknown_indices {
                user_ids[idx] = 0;
                item_ids[idx] = 0;
            }
        }

        CheckedPairs {
            unknown_indices,
            user_ids,
            item_ids,
        }
    }

    /// Return the user if known, `None` otherwise.
    pub fn check_user(&self, user_id: UserId) -> Option<UserId> {
        if self.is_known_user(user_id) {
            Some(user_id)
        } else {
            warn!(
                "Detected unknown user {}, returning default recommendation",
                user_id
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_pairs_pass_through() {
        let guard = UnknownGuard::new(3, 4);
        let checked = guard.check_pairs(&[0, 1, 2], &[3, 2, 1]);

        assert_eq!(checked.unknown_count(), 0);
        assert_eq!(checked.user_ids, vec![0, 1, 2]);
        assert_eq!(checked.item_ids, vec![3, 2, 1]);
    }

    #[test]
    fn unknown_pairs_are_zeroed() {
        let guard = UnknownGuard::new(3, 4);
        let checked = guard.check_pairs(&[0, 7, 2, 1], &[3, 2, 9, 1]);

        assert_eq!(checked.unknown_indices, vec![1, 2]);
        assert_eq!(checked.user_ids, vec![0, 0, 0, 1]);
        assert_eq!(checked.item_ids, vec![3, 0, 0, 1]);
    }

    #[test]
    fn unknown_user_and_item_in_same_pair_counted_once() {
        let guard = UnknownGuard::new(1, 1);
        let checked = guard.check_pairs(&[5], &[5]);

        assert_eq!(checked.unknown_count(), 1);
    }

    #[test]
    fn fill_default_only_touches_flagged() {
        let guard = UnknownGuard::new(2, 2);
        let checked = guard.check_pairs(&[0, 2, 1], &[0, 1, 1]);
        let mut predictions = vec![0.3, 0.4, 0.5];

        checked.fill_default(&mut predictions, 3.5);

        assert_eq!(predictions, vec![0.3, 3.5, 0.5]);
    }

    #[test]
    fn single_user() {
        let guard = UnknownGuard::new(2, 2);

        assert_eq!(guard.check_user(0), Some(0));
        assert_eq!(guard.check_user(1), Some(1));
        assert_eq!(guard.check_user(2), None);
    }
}
