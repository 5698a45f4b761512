use ndarray::Axis;

use wyrm::Arr;

use crate::{ItemId, UserId};

/// Snapshot of whole-catalog user and item vectors.
///
/// A snapshot is computed once per epoch and never mutated; a refresh
/// replaces it with a new one stamped with the newer epoch.
#[derive(Clone, Debug)]
pub struct LatentVectors {
    epoch: usize,
    user_vectors: Arr,
    item_vectors: Arr,
}

impl LatentVectors {
    pub(crate) fn new(epoch: usize, user_vectors: Arr, item_vectors: Arr) -> Self {
        debug_assert_eq!(user_vectors.cols(), item_vectors.cols());

        LatentVectors {
            epoch,
            user_vectors,
            item_vectors,
        }
    }

    /// Epoch after which the snapshot was taken.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// `num_users x dim` user vectors.
    pub fn user_vectors(&self) -> &Arr {
        &self.user_vectors
    }

    /// `num_items x dim` item vectors.
    pub fn item_vectors(&self) -> &Arr {
        &self.item_vectors
    }

    /// Dot products of one user against every item.
    pub fn dot_all(&self, user_id: UserId) -> Vec<f32> {
        let user_vector = self.user_vectors.subview(Axis(0), user_id);

        self.item_vectors.dot(&user_vector).iter().cloned().collect()
    }

    /// Dot products of `(user, item)` pairs.
    pub fn dot_pairs(&self, user_ids: &[UserId], item_ids: &[ItemId]) -> Vec<f32> {
        izip!(user_ids, item_ids)
            .map(|(&user_id, &item_id)| {
                self.user_vectors
                    .subview(Axis(0), user_id)
                    .dot(&self.item_vectors.subview(Axis(0), item_id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_products() {
        let users = Arr::from_shape_vec((2, 2), vec![1.0, 0.0, 0.5, 2.0]).unwrap();
        let items = Arr::from_shape_vec((3, 2), vec![1.0, 1.0, 0.0, 1.0, 2.0, 0.0]).unwrap();
        let latent = LatentVectors::new(3, users, items);

        assert_eq!(latent.epoch(), 3);
        assert_eq!(latent.dot_all(1), vec![2.5, 2.0, 1.0]);
        assert_eq!(latent.dot_pairs(&[0, 1], &[2, 1]), vec![2.0, 2.0]);
    }
}
