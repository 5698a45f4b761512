//! Interaction containers, train/test splits and per-user consumption.
use std::cmp::Ordering;
use std::hash::Hasher;

use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use siphasher::sip::SipHasher;

use crate::{ItemId, Timestamp, UserId};

fn default_label() -> f32 {
    1.0
}

/// A single user-item interaction.
///
/// For the rating task `label` holds the rating; for the ranking task
/// it is `1.0` for observed interactions and `0.0` for sampled negatives.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Interaction {
    user_id: UserId,
    item_id: ItemId,
    timestamp: Timestamp,
    #[serde(default = "default_label")]
    label: f32,
}

impl Interaction {
    /// Build an implicit (label `1.0`) interaction.
    pub fn new(user_id: UserId, item_id: ItemId, timestamp: Timestamp) -> Self {
        Interaction {
            user_id,
            item_id,
            timestamp,
            label: 1.0,
        }
    }

    /// Build an interaction with an explicit label.
    pub fn with_label(user_id: UserId, item_id: ItemId, timestamp: Timestamp, label: f32) -> Self {
        Interaction {
            user_id,
            item_id,
            timestamp,
            label,
        }
    }

    /// User id.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
    /// Item id.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }
    /// Timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
    /// Rating or binary label.
    pub fn label(&self) -> f32 {
        self.label
    }
    /// Whether this is an observed (non-negative-sampled) interaction.
    pub fn is_positive(&self) -> bool {
        self.label > 0.0
    }
}

/// Randomly split interactions into `(train, test)`.
pub fn train_test_split<R: Rng>(
    interactions: &mut Interactions,
    rng: &mut R,
    test_fraction: f32,
) -> (Interactions, Interactions) {
    interactions.shuffle(rng);

    let (test, train) = interactions.split_at((test_fraction * interactions.len() as f32) as usize);

    (train, test)
}

/// Split interactions into `(train, test)` so that every user ends up
/// entirely in one of the two sets.
pub fn user_based_split<R: Rng>(
    interactions: &mut Interactions,
    rng: &mut R,
    test_fraction: f32,
) -> (Interactions, Interactions) {
    let denominator = 100_000;
    let train_cutoff = (test_fraction * denominator as f32) as u64;

    let (key_0, key_1) = (rng.gen::<u64>(), rng.gen::<u64>());

    let is_train = |x: &Interaction| {
        let mut hasher = SipHasher::new_with_keys(key_0, key_1);
        hasher.write_usize(x.user_id());
        hasher.finish() % denominator > train_cutoff
    };

    interactions.split_by(is_train)
}

/// Vocabulary and label statistics of a dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataInfo {
    /// Size of the user vocabulary.
    pub num_users: usize,
    /// Size of the item vocabulary.
    pub num_items: usize,
    /// Smallest and largest label among observed interactions.
    pub min_max_rating: (f32, f32),
    /// Mean label of observed interactions.
    pub global_mean: f32,
}

/// A collection of interactions over a fixed user and item vocabulary.
#[derive(Clone, Debug)]
pub struct Interactions {
    num_users: usize,
    num_items: usize,
    interactions: Vec<Interaction>,
    has_sampled: bool,
}

impl Interactions {
    /// Empty interactions over the given vocabulary.
    pub fn new(num_users: usize, num_items: usize) -> Self {
        Interactions {
            num_users,
            num_items,
            interactions: Vec::new(),
            has_sampled: false,
        }
    }

    /// Add an interaction.
    pub fn push(&mut self, interaction: Interaction) {
        self.interactions.push(interaction);
    }

    /// Underlying interactions.
    pub fn data(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Number of interactions.
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether there are no interactions.
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Shuffle in place.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        rng.shuffle(&mut self.interactions);
    }

    /// Split at `idx` into head and tail.
    pub fn split_at(&self, idx: usize) -> (Self, Self) {
        let head = Interactions {
            interactions: self.interactions[..idx].to_owned(),
            ..self.empty_like()
        };
        let tail = Interactions {
            interactions: self.interactions[idx..].to_owned(),
            ..self.empty_like()
        };

        (head, tail)
    }

    /// Split into interactions satisfying `func` and the rest.
    pub fn split_by<F: Fn(&Interaction) -> bool>(&self, func: F) -> (Self, Self) {
        let (head, tail): (Vec<_>, Vec<_>) = self.interactions.iter().cloned().partition(|x| func(x));

        (
            Interactions {
                interactions: head,
                ..self.empty_like()
            },
            Interactions {
                interactions: tail,
                ..self.empty_like()
            },
        )
    }

    fn empty_like(&self) -> Self {
        Interactions {
            num_users: self.num_users,
            num_items: self.num_items,
            interactions: Vec::new(),
            has_sampled: self.has_sampled,
        }
    }

    /// Whether negative sampling has been performed on this set.
    pub fn has_sampled(&self) -> bool {
        self.has_sampled
    }

    /// Append `num_neg` label-`0` interactions per observed interaction.
    ///
    /// Negatives are drawn uniformly from items the user has not
    /// interacted with in this set. After a small number of rejected
    /// draws a consumed item is accepted, so users who have consumed
    /// most of the catalog do not stall sampling.
    pub fn sample_negatives<R: Rng>(&mut self, num_neg: usize, rng: &mut R) {
        if self.num_items == 0 {
            self.has_sampled = true;
            return;
        }

        let consumed = self.consumed();
        let item_range = Uniform::new(0, self.num_items);

        let negatives: Vec<Interaction> = self
            .interactions
            .iter()
            .filter(|x| x.is_positive())
            .flat_map(|x| {
                let user_consumed = consumed.consumed(x.user_id());
                (0..num_neg)
                    .map(|_| {
                        let item_id = sample_unconsumed(user_consumed, &item_range, rng);
                        Interaction::with_label(x.user_id(), item_id, x.timestamp(), 0.0)
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        debug!(
            "Sampled {} negatives for {} interactions",
            negatives.len(),
            self.len()
        );

        self.interactions.extend(negatives);
        self.has_sampled = true;
    }

    /// Compressed per-user view, ordered by timestamp.
    pub fn to_compressed(&self) -> CompressedInteractions {
        CompressedInteractions::from(self)
    }

    /// Per-user consumption built from observed interactions.
    pub fn consumed(&self) -> UserConsumed {
        UserConsumed::from(self)
    }

    /// Vocabulary and label statistics.
    pub fn data_info(&self) -> DataInfo {
        let mut min = std::f32::INFINITY;
        let mut max = std::f32::NEG_INFINITY;
        let mut sum = 0.0;
        let mut count = 0;

        for interaction in self.interactions.iter().filter(|x| x.is_positive()) {
            min = min.min(interaction.label());
            max = max.max(interaction.label());
            sum += interaction.label();
            count += 1;
        }

        if count == 0 {
            min = 0.0;
            max = 0.0;
        }

        DataInfo {
            num_users: self.num_users,
            num_items: self.num_items,
            min_max_rating: (min, max),
            global_mean: if count == 0 { 0.0 } else { sum / count as f32 },
        }
    }

    /// Size of the user vocabulary.
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// Size of the item vocabulary.
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// `(num_users, num_items)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_users, self.num_items)
    }
}

/// Draw an item from `item_range`, retrying a few times to avoid
/// items in `consumed`.
pub fn sample_unconsumed<R: Rng>(
    consumed: &ConsumedSet,
    item_range: &Uniform<usize>,
    rng: &mut R,
) -> ItemId {
    let mut item_id = item_range.sample(rng);

    for _ in 0..10 {
        if !consumed.contains(item_id) {
            break;
        }
        item_id = item_range.sample(rng);
    }

    item_id
}

impl From<Vec<Interaction>> for Interactions {
    fn from(data: Vec<Interaction>) -> Interactions {
        let num_users = data.iter().map(|x| x.user_id() + 1).max().unwrap_or(0);
        let num_items = data.iter().map(|x| x.item_id() + 1).max().unwrap_or(0);

        Interactions {
            num_users,
            num_items,
            interactions: data,
            has_sampled: false,
        }
    }
}

fn cmp_timestamp(x: &Interaction, y: &Interaction) -> Ordering {
    x.user_id()
        .cmp(&y.user_id())
        .then_with(|| x.timestamp().cmp(&y.timestamp()))
}

/// Interactions grouped by user, each group ordered by timestamp.
#[derive(Clone, Debug)]
pub struct CompressedInteractions {
    num_users: usize,
    num_items: usize,
    user_pointers: Vec<usize>,
    item_ids: Vec<ItemId>,
    labels: Vec<f32>,
    timestamps: Vec<Timestamp>,
}

impl<'a> From<&'a Interactions> for CompressedInteractions {
    fn from(interactions: &Interactions) -> CompressedInteractions {
        let mut data = interactions.data().to_owned();

        data.sort_by(cmp_timestamp);

        let mut user_pointers = vec![0; interactions.num_users + 1];
        let mut item_ids = Vec::with_capacity(data.len());
        let mut labels = Vec::with_capacity(data.len());
        let mut timestamps = Vec::with_capacity(data.len());

        for datum in data.iter().filter(|x| x.user_id() < interactions.num_users) {
            item_ids.push(datum.item_id());
            labels.push(datum.label());
            timestamps.push(datum.timestamp());

            user_pointers[datum.user_id() + 1] += 1;
        }

        for idx in 1..user_pointers.len() {
            user_pointers[idx] += user_pointers[idx - 1];
        }

        CompressedInteractions {
            num_users: interactions.num_users,
            num_items: interactions.num_items,
            user_pointers,
            item_ids,
            labels,
            timestamps,
        }
    }
}

impl CompressedInteractions {
    /// Iterate over all users, including users without interactions.
    pub fn iter_users(&self) -> CompressedInteractionsUserIterator {
        CompressedInteractionsUserIterator {
            interactions: self,
            idx: 0,
        }
    }

    /// Interactions of a single user.
    pub fn get_user(&self, user_id: UserId) -> Option<CompressedInteractionsUser> {
        if user_id >= self.num_users {
            return None;
        }

        Some(self.user_unchecked(user_id))
    }

    fn user_unchecked(&self, user_id: UserId) -> CompressedInteractionsUser {
        let start = self.user_pointers[user_id];
        let stop = self.user_pointers[user_id + 1];

        CompressedInteractionsUser {
            user_id,
            item_ids: &self.item_ids[start..stop],
            labels: &self.labels[start..stop],
            timestamps: &self.timestamps[start..stop],
        }
    }

    /// Size of the user vocabulary.
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// Size of the item vocabulary.
    pub fn num_items(&self) -> usize {
        self.num_items
    }
}

/// Iterator over the users of `CompressedInteractions`.
pub struct CompressedInteractionsUserIterator<'a> {
    interactions: &'a CompressedInteractions,
    idx: usize,
}

/// A single user's interactions.
#[derive(Debug)]
pub struct CompressedInteractionsUser<'a> {
    /// User id.
    pub user_id: UserId,
    /// Items, oldest first.
    pub item_ids: &'a [ItemId],
    /// Labels aligned with `item_ids`.
    pub labels: &'a [f32],
    /// Timestamps aligned with `item_ids`.
    pub timestamps: &'a [Timestamp],
}

impl<'a> CompressedInteractionsUser<'a> {
    /// Whether the user has no interactions.
    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    /// Items with a positive label, oldest first.
    pub fn positive_items(&self) -> Vec<ItemId> {
        self.item_ids
            .iter()
            .zip(self.labels)
            .filter(|&(_, &label)| label > 0.0)
            .map(|(&item_id, _)| item_id)
            .collect()
    }
}

impl<'a> Iterator for CompressedInteractionsUserIterator<'a> {
    type Item = CompressedInteractionsUser<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        let value = if self.idx >= self.interactions.num_users {
            None
        } else {
            Some(self.interactions.user_unchecked(self.idx))
        };

        self.idx += 1;

        value
    }
}

/// Sorted, deduplicated set of items a user has consumed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsumedSet {
    item_ids: Vec<ItemId>,
}

impl ConsumedSet {
    /// Whether `item_id` was consumed.
    pub fn contains(&self, item_id: ItemId) -> bool {
        self.item_ids.binary_search(&item_id).is_ok()
    }

    /// Number of distinct consumed items.
    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    /// Whether nothing was consumed.
    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    /// Consumed items in ascending id order.
    pub fn as_slice(&self) -> &[ItemId] {
        &self.item_ids
    }
}

impl From<Vec<ItemId>> for ConsumedSet {
    fn from(mut item_ids: Vec<ItemId>) -> Self {
        item_ids.sort_unstable();
        item_ids.dedup();

        ConsumedSet { item_ids }
    }
}

/// Per-user consumption history of a training set.
///
/// Built once from training data and immutable afterwards.
#[derive(Clone, Debug, Default)]
pub struct UserConsumed {
    histories: Vec<Vec<ItemId>>,
    sets: Vec<ConsumedSet>,
}

impl UserConsumed {
    /// Number of users covered.
    pub fn num_users(&self) -> usize {
        self.sets.len()
    }

    /// Observed items of `user_id` ordered by timestamp, oldest first.
    /// Empty for users outside the vocabulary.
    pub fn history(&self, user_id: UserId) -> &[ItemId] {
        self.histories
            .get(user_id)
            .map(|x| x.as_slice())
            .unwrap_or(&[])
    }

    /// Up to `num` most recent items of `user_id`, oldest first.
    pub fn recent(&self, user_id: UserId, num: usize) -> &[ItemId] {
        let history = self.history(user_id);
        &history[history.len().saturating_sub(num)..]
    }

    /// Set of consumed items of `user_id`.
    pub fn consumed(&self, user_id: UserId) -> &ConsumedSet {
        static EMPTY: ConsumedSet = ConsumedSet {
            item_ids: Vec::new(),
        };

        self.sets.get(user_id).unwrap_or(&EMPTY)
    }
}

impl<'a> From<&'a Interactions> for UserConsumed {
    fn from(interactions: &'a Interactions) -> Self {
        let compressed = interactions.to_compressed();

        let histories: Vec<Vec<ItemId>> = compressed
            .iter_users()
            .map(|user| user.positive_items())
            .collect();
        let sets = histories
            .iter()
            .map(|history| ConsumedSet::from(history.clone()))
            .collect();

        UserConsumed { histories, sets }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, XorShiftRng};

    use super::*;

    fn toy() -> Interactions {
        Interactions::from(vec![
            Interaction::new(0, 3, 2),
            Interaction::new(0, 1, 1),
            Interaction::new(0, 3, 5),
            Interaction::new(1, 0, 0),
            Interaction::with_label(2, 4, 0, 4.0),
        ])
    }

    #[test]
    fn vocabulary_from_max_ids() {
        let data = toy();

        assert_eq!(data.shape(), (3, 5));
        assert_eq!(Interactions::from(Vec::new()).shape(), (0, 0));
    }

    #[test]
    fn consumed_history_ordered_and_set_deduplicated() {
        let consumed = toy().consumed();

        assert_eq!(consumed.history(0), &[1, 3, 3]);
        assert_eq!(consumed.recent(0, 2), &[3, 3]);
        assert_eq!(consumed.consumed(0).as_slice(), &[1, 3]);
        assert!(consumed.consumed(1).contains(0));
        assert!(consumed.consumed(17).is_empty());
        assert!(consumed.history(17).is_empty());
    }

    #[test]
    fn data_info_statistics() {
        let info = toy().data_info();

        assert_eq!(info.min_max_rating, (1.0, 4.0));
        assert!((info.global_mean - 1.6).abs() < 1e-6);
    }

    #[test]
    fn negative_sampling_marks_set() {
        let mut data = toy();
        let mut rng = XorShiftRng::from_seed([7; 16]);

        assert!(!data.has_sampled());

        data.sample_negatives(2, &mut rng);

        assert!(data.has_sampled());
        assert_eq!(data.len(), 15);
        assert_eq!(data.data().iter().filter(|x| !x.is_positive()).count(), 10);
        assert_eq!(data.consumed().consumed(0).as_slice(), &[1, 3]);
    }

    #[test]
    fn user_based_split_keeps_users_together() {
        let mut data = Interactions::from(
            (0..100)
                .flat_map(|user| (0..5).map(move |item| Interaction::new(user, item, item)))
                .collect::<Vec<_>>(),
        );
        let mut rng = XorShiftRng::from_seed([42; 16]);

        let (train, test) = user_based_split(&mut data, &mut rng, 0.3);

        assert_eq!(train.len() + test.len(), 500);
        for interaction in test.data() {
            assert!(train.data().iter().all(|x| x.user_id() != interaction.user_id()));
        }
    }
}
