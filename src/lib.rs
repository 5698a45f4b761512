#![deny(missing_docs)]
//! # recokit
//!
//! `recokit` implements neural recommender models (Wide&Deep and the
//! YouTube two-tower candidate generator) together with the machinery
//! needed to serve and evaluate them: guarding against unknown users
//! and items, selecting the top-N unconsumed items from a full catalog
//! score vector, and computing rank-sensitive quality metrics.
//!
//! ## Example
//! ```rust,no_run
//! # extern crate recokit;
//! # extern crate rand;
//! # use rand::SeedableRng;
//! use recokit::evaluation::Metric;
//! use recokit::models::youtube_match::Hyperparameters;
//! use recokit::ScoringModel;
//!
//! let mut data = recokit::datasets::load_csv("data.csv").unwrap();
//! let mut rng = rand::XorShiftRng::from_seed([42; 16]);
//!
//! let (train, mut test) = recokit::data::user_based_split(&mut data, &mut rng, 0.2);
//! test.sample_negatives(1, &mut rng);
//!
//! let mut model = Hyperparameters::new(data.num_users(), data.num_items())
//!     .embedding_dim(32)
//!     .num_epochs(10)
//!     .rng(rng)
//!     .build()
//!     .unwrap();
//!
//! let reports = model
//!     .fit_with_eval(&train, &test, 10, &[Metric::Precision, Metric::Ndcg])
//!     .unwrap();
//! println!("{:?}", reports.last());
//! println!("{:?}", model.recommend_user(0, 10).unwrap());
//! ```
#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate itertools;

#[cfg(feature = "csv")]
extern crate csv;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
extern crate ndarray;
extern crate rand;
extern crate rayon;
extern crate serde;
extern crate siphasher;

extern crate wyrm;

pub mod data;
#[cfg(feature = "csv")]
pub mod datasets;
pub mod evaluation;
pub mod guard;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod topn;

use crate::data::ConsumedSet;
use crate::guard::UnknownGuard;
use crate::models::Task;
use crate::topn::RankedList;

/// Alias for user indices.
pub type UserId = usize;
/// Alias for item indices.
pub type ItemId = usize;
/// Alias for timestamps.
pub type Timestamp = usize;

/// Prediction error types.
#[derive(Debug, Fail, Clone, PartialEq)]
pub enum PredictionError {
    /// The model has not been fitted yet.
    #[fail(display = "Model must be fitted first.")]
    NotFitted,
    /// Failed prediction due to numerical issues.
    #[fail(display = "Invalid prediction value: non-finite or not a number.")]
    InvalidPredictionValue,
    /// User and item batches of different lengths.
    #[fail(display = "Got {} users but {} items.", users, items)]
    LengthMismatch {
        /// Number of user ids.
        users: usize,
        /// Number of item ids.
        items: usize,
    },
}

/// Errors raised while building models or evaluation requests.
#[derive(Debug, Fail, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Task name other than `rating` or `ranking`.
    #[fail(display = "Task must either be rating or ranking, got {:?}.", _0)]
    InvalidTask(String),
    /// Unrecognised loss name.
    #[fail(display = "Unknown loss type {:?}.", _0)]
    InvalidLoss(String),
    /// Lower bound above upper bound, or non-finite bounds.
    #[fail(display = "Invalid rating bounds: lower {}, upper {}.", lower, upper)]
    InvalidBounds {
        /// Lower bound.
        lower: f32,
        /// Upper bound.
        upper: f32,
    },
    /// Unrecognised metric name.
    #[fail(display = "Unknown metric {:?}.", _0)]
    UnknownMetric(String),
    /// Metric that cannot be computed for the given task.
    #[fail(display = "Metric {} is not available for the {} task.", metric, task)]
    UnsupportedMetric {
        /// Metric name.
        metric: String,
        /// Task of the model.
        task: Task,
    },
    /// The model does not support the requested task.
    #[fail(display = "{} only supports the {} task.", model, task)]
    TaskNotSupported {
        /// Model name.
        model: &'static str,
        /// The only supported task.
        task: Task,
    },
    /// Structural hyperparameter problems, such as an empty dense stack.
    #[fail(display = "Invalid hyperparameter: {}.", _0)]
    InvalidHyperparameter(&'static str),
}

/// Fitting error types.
#[derive(Debug, Fail)]
pub enum FittingError {
    /// No interactions were given.
    #[fail(display = "No interactions were supplied.")]
    NoInteractions,
    /// Ranking data was neither pre-sampled nor fitted with batch sampling.
    #[fail(
        display = "Ranking data must be negative-sampled first, or fitted with batch sampling."
    )]
    NotSampled,
    /// Per-epoch evaluation failed.
    #[fail(display = "Evaluation failed: {}", _0)]
    Evaluation(#[cause] evaluation::EvaluationError),
}

impl From<evaluation::EvaluationError> for FittingError {
    fn from(error: evaluation::EvaluationError) -> Self {
        FittingError::Evaluation(error)
    }
}

/// Capability shared by every model variant: turning user and item ids
/// into scores.
///
/// Implementors provide the raw scoring primitives over *known* ids; the
/// provided `predict` and `recommend_user` methods add unknown-id handling,
/// default predictions and top-N selection on top of them.
pub trait ScoringModel {
    /// The task the model was configured for.
    fn task(&self) -> Task;

    /// `(num_users, num_items)` of the fitted model.
    fn shape(&self) -> Result<(usize, usize), PredictionError>;

    /// Value returned for pairs involving unknown users or items.
    fn default_prediction(&self) -> f32;

    /// Score `(user, item)` pairs. All ids are guaranteed to be in range.
    fn score_pairs(
        &self,
        user_ids: &[UserId],
        item_ids: &[ItemId],
    ) -> Result<Vec<f32>, PredictionError>;

    /// Raw ranking scores of every item in the catalog for a known user.
    ///
    /// Recommendations are ranked on these values; `output_score` maps
    /// the selected ones onto the scale of `score_pairs`.
    fn score_all_items(&self, user_id: UserId) -> Result<Vec<f32>, PredictionError>;

    /// Map a raw `score_all_items` value onto the prediction scale. Must be
    /// non-decreasing.
    fn output_score(&self, score: f32) -> f32 {
        score
    }

    /// Items the user interacted with during training.
    fn consumed(&self, user_id: UserId) -> Result<&ConsumedSet, PredictionError>;

    /// Predict scores for a batch of pairs.
    ///
    /// Pairs containing unknown ids are scored as `default_prediction`
    /// instead of failing the whole batch.
    fn predict(&self, user_ids: &[UserId], item_ids: &[ItemId]) -> Result<Vec<f32>, PredictionError> {
        if user_ids.len() != item_ids.len() {
            return Err(PredictionError::LengthMismatch {
                users: user_ids.len(),
                items: item_ids.len(),
            });
        }

        let (num_users, num_items) = self.shape()?;
        let checked = UnknownGuard::new(num_users, num_items).check_pairs(user_ids, item_ids);

        let mut predictions = self.score_pairs(&checked.user_ids, &checked.item_ids)?;

        if predictions.len() != user_ids.len() {
            return Err(PredictionError::LengthMismatch {
                users: user_ids.len(),
                items: predictions.len(),
            });
        }

        if predictions.iter().any(|x| !x.is_finite()) {
            return Err(PredictionError::InvalidPredictionValue);
        }

        checked.fill_default(&mut predictions, self.default_prediction());

        Ok(predictions)
    }

    /// Recommend `n_rec` unconsumed items for `user_id`.
    ///
    /// Returns `Ok(None)` for unknown users; the caller decides on a
    /// fallback such as a popularity list.
    fn recommend_user(
        &self,
        user_id: UserId,
        n_rec: usize,
    ) -> Result<Option<RankedList>, PredictionError> {
        let (num_users, num_items) = self.shape()?;
        let user_id = match UnknownGuard::new(num_users, num_items).check_user(user_id) {
            Some(user_id) => user_id,
            None => return Ok(None),
        };

        let scores = self.score_all_items(user_id)?;

        if scores.iter().any(|x| !x.is_finite()) {
            return Err(PredictionError::InvalidPredictionValue);
        }

        let ranked = topn::select(&scores, self.consumed(user_id)?, n_rec)
            .into_iter()
            .map(|(item_id, score)| (item_id, self.output_score(score)))
            .collect();

        Ok(Some(ranked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scores `user + item`, but drops the last score of every batch.
    struct Truncating {
        consumed: ConsumedSet,
    }

    impl ScoringModel for Truncating {
        fn task(&self) -> Task {
            Task::Ranking
        }

        fn shape(&self) -> Result<(usize, usize), PredictionError> {
            Ok((2, 4))
        }

        fn default_prediction(&self) -> f32 {
            -1.0
        }

        fn score_pairs(
            &self,
            user_ids: &[UserId],
            item_ids: &[ItemId],
        ) -> Result<Vec<f32>, PredictionError> {
            let mut scores: Vec<f32> = izip!(user_ids, item_ids)
                .map(|(&user_id, &item_id)| (user_id + item_id) as f32)
                .collect();
            scores.pop();

            Ok(scores)
        }

        fn score_all_items(&self, _: UserId) -> Result<Vec<f32>, PredictionError> {
            Ok(vec![30.0, 40.0, 20.0, 10.0])
        }

        fn output_score(&self, score: f32) -> f32 {
            score.min(25.0)
        }

        fn consumed(&self, _: UserId) -> Result<&ConsumedSet, PredictionError> {
            Ok(&self.consumed)
        }
    }

    #[test]
    fn short_score_batch_is_an_error() {
        let model = Truncating {
            consumed: ConsumedSet::default(),
        };

        assert_eq!(
            model.predict(&[0, 1, 5], &[1, 2, 0]),
            Err(PredictionError::LengthMismatch { users: 3, items: 2 })
        );
    }

    #[test]
    fn recommendations_ranked_on_raw_scores() {
        let model = Truncating {
            consumed: ConsumedSet::from(vec![3]),
        };

        // Items 0 and 1 share an output score but keep their raw order.
        assert_eq!(
            model.recommend_user(1, 3).unwrap(),
            Some(vec![(1, 25.0), (0, 25.0), (2, 20.0)])
        );
        assert_eq!(model.recommend_user(2, 3).unwrap(), None);
    }
}
