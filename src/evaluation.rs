//! Model evaluation against held-out interactions.
//!
//! Pointwise metrics score every held-out `(user, item)` pair through
//! [`ScoringModel::predict`](../trait.ScoringModel.html#method.predict);
//! listwise metrics ask the model for the top-`k` unconsumed items of
//! every evaluated user and compare them with the user's positive
//! held-out items.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use rayon::prelude::*;

use crate::data::Interactions;
use crate::metrics::{self, UserItems};
use crate::models::Task;
use crate::{ConfigurationError, ItemId, PredictionError, ScoringModel, UserId};

/// Evaluation metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Root mean squared error.
    Rmse,
    /// Mean absolute error.
    Mae,
    /// Coefficient of determination.
    R2,
    /// Binary cross-entropy of interaction probabilities.
    LogLoss,
    /// Area under the ROC curve.
    RocAuc,
    /// Precision at `k`.
    Precision,
    /// Recall at `k`.
    Recall,
    /// Mean average precision at `k`.
    Map,
    /// Normalised discounted cumulative gain at `k`.
    Ndcg,
}

impl Metric {
    /// The metric's canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
            Metric::R2 => "r2",
            Metric::LogLoss => "log_loss",
            Metric::RocAuc => "roc_auc",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::Map => "map",
            Metric::Ndcg => "ndcg",
        }
    }

    /// Whether the metric is computed over top-`k` recommendation lists.
    pub fn is_listwise(self) -> bool {
        match self {
            Metric::Precision | Metric::Recall | Metric::Map | Metric::Ndcg => true,
            _ => false,
        }
    }

    /// Whether the metric can be computed for models of the given task.
    pub fn supports(self, task: Task) -> bool {
        match self {
            Metric::Rmse | Metric::Mae | Metric::R2 => task == Task::Rating,
            _ => task == Task::Ranking,
        }
    }

    /// Metrics reported when none are requested.
    pub fn defaults(task: Task) -> Vec<Metric> {
        match task {
            Task::Rating => vec![Metric::Rmse, Metric::Mae],
            Task::Ranking => vec![
                Metric::LogLoss,
                Metric::RocAuc,
                Metric::Precision,
                Metric::Recall,
                Metric::Map,
                Metric::Ndcg,
            ],
        }
    }
}

impl FromStr for Metric {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "rmse" => Metric::Rmse,
            "mae" => Metric::Mae,
            "r2" => Metric::R2,
            "log_loss" => Metric::LogLoss,
            "roc_auc" => Metric::RocAuc,
            "precision" => Metric::Precision,
            "recall" => Metric::Recall,
            "map" => Metric::Map,
            "ndcg" => Metric::Ndcg,
            other => return Err(ConfigurationError::UnknownMetric(other.to_owned())),
        })
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Metric values of one evaluation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    /// Length of the recommendation lists used by listwise metrics.
    pub k: usize,
    /// Value of every requested metric.
    pub values: BTreeMap<Metric, f32>,
}

impl MetricReport {
    /// Value of `metric`, if it was requested.
    pub fn get(&self, metric: Metric) -> Option<f32> {
        self.values.get(&metric).cloned()
    }
}

impl fmt::Display for MetricReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let formatted = self
            .values
            .iter()
            .map(|(metric, value)| {
                if metric.is_listwise() {
                    format!("{}@{}: {:.4}", metric, self.k, value)
                } else {
                    format!("{}: {:.4}", metric, value)
                }
            })
            .join(", ");

        write!(f, "{}", formatted)
    }
}

/// Evaluation error types.
#[derive(Debug, Fail, Clone, PartialEq)]
pub enum EvaluationError {
    /// Ranking evaluation data has not been negative-sampled.
    #[fail(display = "Evaluation data must be negative-sampled before ranking evaluation.")]
    NotPrepared,
    /// Invalid metric request.
    #[fail(display = "{}", _0)]
    Configuration(#[cause] ConfigurationError),
    /// The model failed to produce scores.
    #[fail(display = "{}", _0)]
    Prediction(#[cause] PredictionError),
}

impl From<ConfigurationError> for EvaluationError {
    fn from(error: ConfigurationError) -> Self {
        EvaluationError::Configuration(error)
    }
}

impl From<PredictionError> for EvaluationError {
    fn from(error: PredictionError) -> Self {
        EvaluationError::Prediction(error)
    }
}

/// Validate an evaluation request without scoring anything.
pub fn check_request(
    task: Task,
    eval: &Interactions,
    metrics: &[Metric],
) -> Result<(), EvaluationError> {
    if let Some(&metric) = metrics.iter().find(|metric| !metric.supports(task)) {
        return Err(ConfigurationError::UnsupportedMetric {
            metric: metric.name().to_owned(),
            task,
        }
        .into());
    }

    if task == Task::Ranking && !eval.has_sampled() {
        return Err(EvaluationError::NotPrepared);
    }

    Ok(())
}

/// Evaluate `model` on the held-out interactions in `eval`.
///
/// Every user present in `eval` counts towards listwise metrics, including
/// users without positive items (who score zero) and users unknown to the
/// model (who get no recommendations).
pub fn evaluate<M: ScoringModel + Sync>(
    model: &M,
    eval: &Interactions,
    k: usize,
    metrics: &[Metric],
) -> Result<MetricReport, EvaluationError> {
    let task = model.task();
    check_request(task, eval, metrics)?;

    let mut values = BTreeMap::new();

    if metrics.iter().any(|metric| !metric.is_listwise()) {
        for (metric, value) in pointwise(model, eval, metrics)? {
            values.insert(metric, value);
        }
    }

    if metrics.iter().any(|metric| metric.is_listwise()) {
        for (metric, value) in listwise(model, eval, k, metrics)? {
            values.insert(metric, value);
        }
    }

    Ok(MetricReport { k, values })
}

fn pointwise<M: ScoringModel>(
    model: &M,
    eval: &Interactions,
    metrics: &[Metric],
) -> Result<Vec<(Metric, f32)>, EvaluationError> {
    let user_ids: Vec<UserId> = eval.data().iter().map(|x| x.user_id()).collect();
    let item_ids: Vec<ItemId> = eval.data().iter().map(|x| x.item_id()).collect();
    let labels: Vec<f32> = eval
        .data()
        .iter()
        .map(|x| match model.task() {
            Task::Rating => x.label(),
            Task::Ranking => {
                if x.is_positive() {
                    1.0
                } else {
                    0.0
                }
            }
        })
        .collect();

    let predictions = model.predict(&user_ids, &item_ids)?;

    Ok(metrics
        .iter()
        .filter_map(|&metric| {
            let value = match metric {
                Metric::Rmse => metrics::rmse(&labels, &predictions),
                Metric::Mae => metrics::mae(&labels, &predictions),
                Metric::R2 => metrics::r2(&labels, &predictions),
                Metric::LogLoss => metrics::log_loss(&labels, &predictions),
                Metric::RocAuc => metrics::roc_auc(&labels, &predictions),
                _ => return None,
            };

            Some((metric, value))
        })
        .collect())
}

fn listwise<M: ScoringModel + Sync>(
    model: &M,
    eval: &Interactions,
    k: usize,
    metrics: &[Metric],
) -> Result<Vec<(Metric, f32)>, EvaluationError> {
    let mut users: Vec<UserId> = eval.data().iter().map(|x| x.user_id()).collect();
    users.sort();
    users.dedup();

    let mut y_true: UserItems<_> = HashMap::new();
    for interaction in eval.data().iter().filter(|x| x.is_positive()) {
        y_true
            .entry(interaction.user_id())
            .or_insert_with(Vec::new)
            .push(interaction.item_id());
    }
    for items in y_true.values_mut() {
        items.sort();
        items.dedup();
    }

    let recommendations = users
        .par_iter()
        .map(|&user_id| {
            model.recommend_user(user_id, k).map(|recommended| {
                let item_ids: Vec<ItemId> = recommended
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(item_id, _)| item_id)
                    .collect();

                (user_id, item_ids)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let y_reco: UserItems<_> = recommendations.into_iter().collect();

    debug!("Computed top-{} lists for {} users", k, users.len());

    Ok(metrics
        .iter()
        .filter_map(|&metric| {
            let value = match metric {
                Metric::Precision => metrics::precision_at_k(&y_true, &y_reco, &users, k),
                Metric::Recall => metrics::recall_at_k(&y_true, &y_reco, &users, k),
                Metric::Map => metrics::map_at_k(&y_true, &y_reco, &users, k),
                Metric::Ndcg => metrics::ndcg_at_k(&y_true, &y_reco, &users, k),
                _ => return None,
            };

            Some((metric, value))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{SeedableRng, XorShiftRng};

    use crate::data::{ConsumedSet, Interaction};

    /// Scores every item from a fixed table.
    struct FixedModel {
        task: Task,
        scores: Vec<Vec<f32>>,
        consumed: Vec<ConsumedSet>,
    }

    impl ScoringModel for FixedModel {
        fn task(&self) -> Task {
            self.task
        }

        fn shape(&self) -> Result<(usize, usize), PredictionError> {
            Ok((self.scores.len(), self.scores[0].len()))
        }

        fn default_prediction(&self) -> f32 {
            0.0
        }

        fn score_pairs(
            &self,
            user_ids: &[UserId],
            item_ids: &[ItemId],
        ) -> Result<Vec<f32>, PredictionError> {
            Ok(user_ids
                .iter()
                .zip(item_ids)
                .map(|(&user_id, &item_id)| self.scores[user_id][item_id])
                .collect())
        }

        fn score_all_items(&self, user_id: UserId) -> Result<Vec<f32>, PredictionError> {
            Ok(self.scores[user_id].clone())
        }

        fn consumed(&self, user_id: UserId) -> Result<&ConsumedSet, PredictionError> {
            Ok(&self.consumed[user_id])
        }
    }

    fn ranking_model() -> FixedModel {
        FixedModel {
            task: Task::Ranking,
            scores: vec![vec![0.9, 0.1, 0.8, 0.2], vec![0.5, 0.6, 0.7, 0.1]],
            consumed: vec![ConsumedSet::from(vec![0]), ConsumedSet::default()],
        }
    }

    fn ranking_eval(num_users: usize) -> Interactions {
        let mut eval = Interactions::new(num_users, 4);
        eval.push(Interaction::new(0, 2, 0));
        eval.push(Interaction::new(1, 1, 0));
        eval.push(Interaction::new(1, 3, 1));

        eval.sample_negatives(1, &mut XorShiftRng::from_seed([5; 16]));
        eval
    }

    #[test]
    fn metric_names() {
        for metric in Metric::defaults(Task::Ranking)
            .into_iter()
            .chain(Metric::defaults(Task::Rating))
        {
            assert_eq!(metric.name().parse::<Metric>(), Ok(metric));
        }

        assert_eq!(
            "mrr".parse::<Metric>(),
            Err(ConfigurationError::UnknownMetric("mrr".to_owned()))
        );
    }

    #[test]
    fn listwise_metrics() {
        let model = ranking_model();
        let eval = ranking_eval(2);

        let report = evaluate(
            &model,
            &eval,
            2,
            &[Metric::Precision, Metric::Recall, Metric::Ndcg],
        )
        .unwrap();

        assert!((report.get(Metric::Precision).unwrap() - 0.5).abs() < 1e-6);
        assert!((report.get(Metric::Recall).unwrap() - 0.75).abs() < 1e-6);

        let expected_ndcg = (1.0 + 1.0 / 3.0_f32.log2()) / 2.0;
        assert!((report.get(Metric::Ndcg).unwrap() - expected_ndcg).abs() < 1e-5);
        assert_eq!(report.get(Metric::Map), None);
    }

    #[test]
    fn unknown_users_score_zero() {
        let model = ranking_model();
        let mut eval = ranking_eval(6);
        eval.push(Interaction::new(5, 1, 3));

        let report = evaluate(&model, &eval, 2, &[Metric::Precision, Metric::RocAuc]).unwrap();

        assert!((report.get(Metric::Precision).unwrap() - 1.0 / 3.0).abs() < 1e-6);

        let auc = report.get(Metric::RocAuc).unwrap();
        assert!(auc >= 0.0 && auc <= 1.0);
    }

    #[test]
    fn ranking_requires_sampled_eval() {
        let model = ranking_model();
        let eval = Interactions::from(vec![Interaction::new(0, 2, 0)]);

        assert_eq!(
            evaluate(&model, &eval, 2, &[Metric::Ndcg]),
            Err(EvaluationError::NotPrepared)
        );
    }

    #[test]
    fn unsupported_metric() {
        let model = ranking_model();
        let eval = ranking_eval(2);

        assert_eq!(
            evaluate(&model, &eval, 2, &[Metric::Rmse]),
            Err(EvaluationError::Configuration(
                ConfigurationError::UnsupportedMetric {
                    metric: "rmse".to_owned(),
                    task: Task::Ranking,
                }
            ))
        );
    }

    #[test]
    fn rating_metrics() {
        let model = FixedModel {
            task: Task::Rating,
            scores: vec![vec![3.0, 4.0], vec![2.0, 5.0]],
            consumed: vec![ConsumedSet::default(), ConsumedSet::default()],
        };
        let eval = Interactions::from(vec![
            Interaction::with_label(0, 0, 0, 4.0),
            Interaction::with_label(1, 1, 0, 5.0),
        ]);

        let report = evaluate(&model, &eval, 10, &[Metric::Rmse, Metric::Mae]).unwrap();

        assert!((report.get(Metric::Mae).unwrap() - 0.5).abs() < 1e-6);
        assert!((report.get(Metric::Rmse).unwrap() - 0.5_f32.sqrt()).abs() < 1e-6);
        assert_eq!(format!("{}", report), "rmse: 0.7071, mae: 0.5000");
    }
}
