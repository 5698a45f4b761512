//! Two-tower candidate generation model after Covington et al.,
//! "Deep Neural Networks for YouTube Recommendations".
//!
//! The user tower pools the embeddings of some of the user's consumed
//! items (sum scaled by `1 / sqrt(n)`), either the most recent ones or a
//! random sample, and passes them through a dense stack;
//! the output of the last layer is the user vector. The item tower is a
//! plain weight matrix. A user-item score is
//! ```text
//! sigmoid(user_vector . item_weight)
//! ```
//! Whole-catalog user and item vectors are recomputed after every epoch
//! and cached as a `LatentVectors` snapshot used for prediction and
//! recommendation.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use ndarray::{Array1, Axis};
use rand;
use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng, XorShiftRng};
use rayon;
use rayon::prelude::*;

use wyrm;
use wyrm::optim::Optimizer as Optim;
use wyrm::{Arr, BoxedNode, DataInput, Variable};

use super::latent::LatentVectors;
use super::training::{run_epoch, PartitionLoss};
use super::{
    check_hidden_units, dense_init, embedding_init, relu, sigmoid, InteractionMode, Loss,
    Optimizer, Task,
};
use crate::data::{sample_unconsumed, ConsumedSet, Interactions, UserConsumed};
use crate::evaluation::{self, Metric, MetricReport};
use crate::{ConfigurationError, FittingError, ItemId, PredictionError, ScoringModel, UserId};

/// Hyperparameters describing the YouTube match model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hyperparameters {
    num_users: usize,
    num_items: usize,
    task: Task,
    embedding_dim: usize,
    hidden_units: Vec<usize>,
    learning_rate: f32,
    l2_penalty: f32,
    num_neg: usize,
    interaction_mode: InteractionMode,
    loss: Loss,
    optimizer: Optimizer,
    rng: XorShiftRng,
    num_threads: usize,
    num_epochs: usize,
}

impl Hyperparameters {
    /// Build new hyperparameters for a vocabulary of the given size.
    pub fn new(num_users: usize, num_items: usize) -> Self {
        Hyperparameters {
            num_users,
            num_items,
            task: Task::Ranking,
            embedding_dim: 16,
            hidden_units: vec![128, 64, 32],
            learning_rate: 0.01,
            l2_penalty: 0.0,
            num_neg: 1,
            interaction_mode: InteractionMode::Recent(10),
            loss: Loss::BPR,
            optimizer: Optimizer::Adam,
            rng: XorShiftRng::from_seed(rand::thread_rng().gen()),
            num_threads: rayon::current_num_threads(),
            num_epochs: 20,
        }
    }

    /// Set the task. Only `Task::Ranking` builds successfully.
    pub fn task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }

    /// Set the item embedding dimensionality.
    pub fn embedding_dim(mut self, embedding_dim: usize) -> Self {
        self.embedding_dim = embedding_dim;
        self
    }

    /// Set the sizes of the user tower layers. The last size is the
    /// dimensionality of user and item vectors.
    pub fn hidden_units(mut self, hidden_units: Vec<usize>) -> Self {
        self.hidden_units = hidden_units;
        self
    }

    /// Set the learning rate.
    pub fn learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the L2 penalty.
    pub fn l2_penalty(mut self, l2_penalty: f32) -> Self {
        self.l2_penalty = l2_penalty;
        self
    }

    /// Set the number of negatives sampled per positive.
    pub fn num_neg(mut self, num_neg: usize) -> Self {
        self.num_neg = num_neg;
        self
    }

    /// Set which consumed items make up the user representation.
    pub fn interaction_mode(mut self, interaction_mode: InteractionMode) -> Self {
        self.interaction_mode = interaction_mode;
        self
    }

    /// Set the loss function.
    pub fn loss(mut self, loss: Loss) -> Self {
        self.loss = loss;
        self
    }

    /// Set the optimizer type.
    pub fn optimizer(mut self, optimizer: Optimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Set the number of epochs to run per each `fit` call.
    pub fn num_epochs(mut self, num_epochs: usize) -> Self {
        self.num_epochs = num_epochs;
        self
    }

    /// Set number of threads to be used.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Set the random number generator.
    pub fn rng(mut self, rng: XorShiftRng) -> Self {
        self.rng = rng;
        self
    }

    /// Set the random number generator from seed.
    pub fn from_seed(mut self, seed: [u8; 16]) -> Self {
        self.rng = XorShiftRng::from_seed(seed);
        self
    }

    /// Set hyperparameters randomly: useful for hyperparameter search.
    pub fn random<R: Rng>(num_users: usize, num_items: usize, rng: &mut R) -> Self {
        let depth = Uniform::new(1, 4).sample(rng);
        let width = 2_usize.pow(Uniform::new(4, 8).sample(rng));

        Hyperparameters {
            num_users,
            num_items,
            task: Task::Ranking,
            embedding_dim: 2_usize.pow(Uniform::new(3, 7).sample(rng)),
            hidden_units: (0..depth).map(|layer| (width >> layer).max(8)).collect(),
            learning_rate: (10.0_f32).powf(Uniform::new(-3.0, -1.0).sample(rng)),
            l2_penalty: (10.0_f32).powf(Uniform::new(-7.0, -3.0).sample(rng)),
            num_neg: Uniform::new(1, 6).sample(rng),
            interaction_mode: {
                let num = Uniform::new(2, 30).sample(rng);
                if Uniform::new(0.0, 1.0).sample(rng) < 0.5 {
                    InteractionMode::Recent(num)
                } else {
                    InteractionMode::Random(num)
                }
            },
            loss: if Uniform::new(0.0, 1.0).sample(rng) < 0.5 {
                Loss::BPR
            } else {
                Loss::Hinge
            },
            optimizer: if Uniform::new(0.0, 1.0).sample(rng) < 0.5 {
                Optimizer::Adam
            } else {
                Optimizer::Adagrad
            },
            rng: XorShiftRng::from_seed(rand::thread_rng().gen()),
            num_threads: rayon::current_num_threads(),
            num_epochs: 2_usize.pow(Uniform::new(2, 6).sample(rng)),
        }
    }

    fn build_params(&mut self) -> Parameters {
        let item_embeddings = Arc::new(wyrm::HogwildParameter::new(embedding_init(
            self.num_items,
            self.embedding_dim,
            &mut self.rng,
        )));

        let mut input_dim = self.embedding_dim;
        let mut layers = Vec::with_capacity(self.hidden_units.len());
        for &units in &self.hidden_units {
            layers.push(Arc::new(wyrm::HogwildParameter::new(dense_init(
                input_dim,
                units,
                &mut self.rng,
            ))));
            input_dim = units;
        }

        let item_weights = Arc::new(wyrm::HogwildParameter::new(embedding_init(
            self.num_items,
            input_dim,
            &mut self.rng,
        )));

        Parameters {
            item_embeddings,
            layers,
            item_weights,
        }
    }

    /// Build the YouTube match model.
    pub fn build(mut self) -> Result<YouTubeMatchModel, ConfigurationError> {
        if self.task != Task::Ranking {
            return Err(ConfigurationError::TaskNotSupported {
                model: "YouTubeMatch",
                task: self.task,
            });
        }
        check_hidden_units(&self.hidden_units)?;
        if self.embedding_dim == 0 || self.interaction_mode.num() == 0 {
            return Err(ConfigurationError::InvalidHyperparameter(
                "embedding_dim and the interaction count must be positive",
            ));
        }

        let params = self.build_params();

        Ok(YouTubeMatchModel {
            hyper: self,
            params,
            user_consumed: None,
            latent: None,
            epochs_trained: 0,
        })
    }
}

#[derive(Debug)]
struct Parameters {
    item_embeddings: Arc<wyrm::HogwildParameter>,
    layers: Vec<Arc<wyrm::HogwildParameter>>,
    item_weights: Arc<wyrm::HogwildParameter>,
}

impl Clone for Parameters {
    fn clone(&self) -> Self {
        Parameters {
            item_embeddings: Arc::new(self.item_embeddings.as_ref().clone()),
            layers: self
                .layers
                .iter()
                .map(|layer| Arc::new(layer.as_ref().clone()))
                .collect(),
            item_weights: Arc::new(self.item_weights.as_ref().clone()),
        }
    }
}

struct Graph {
    history: Variable<wyrm::IndexInputNode>,
    positive: Variable<wyrm::IndexInputNode>,
    negative: Variable<wyrm::IndexInputNode>,
    loss: Variable<BoxedNode>,
}

impl Parameters {
    fn build_graph(&self, history_len: usize, loss: Loss) -> Graph {
        let item_embeddings = wyrm::ParameterNode::shared(self.item_embeddings.clone());
        let item_weights = wyrm::ParameterNode::shared(self.item_weights.clone());

        let history = wyrm::IndexInputNode::new(&vec![0; history_len]);
        let positive = wyrm::IndexInputNode::new(&[0]);
        let negative = wyrm::IndexInputNode::new(&[0]);

        // A 1 x n row of 1/sqrt(n) turns the lookup into sqrtn pooling.
        let pooling = wyrm::InputNode::new(Arr::from_elem(
            (1, history_len),
            1.0 / (history_len as f32).sqrt(),
        ));

        let mut hidden = pooling.dot(&item_embeddings.index(&history)).boxed();
        let last_layer = self.layers.len() - 1;

        for (idx, layer) in self.layers.iter().enumerate() {
            let output = hidden.dot(&wyrm::ParameterNode::shared(layer.clone()));
            hidden = if idx == last_layer {
                output.boxed()
            } else {
                output.relu().boxed()
            };
        }

        let positive_prediction = hidden.vector_dot(&item_weights.index(&positive));
        let negative_prediction = hidden.vector_dot(&item_weights.index(&negative));

        let loss = match loss {
            Loss::BPR => (negative_prediction - positive_prediction).sigmoid().boxed(),
            Loss::Hinge => (1.0 + negative_prediction - positive_prediction)
                .relu()
                .boxed(),
        };

        Graph {
            history,
            positive,
            negative,
            loss,
        }
    }

    fn user_vector(&self, history: &[ItemId]) -> Array1<f32> {
        let embeddings = self.item_embeddings.value();
        let history: Vec<ItemId> = history
            .iter()
            .cloned()
            .filter(|&item_id| item_id < embeddings.rows())
            .collect();

        if history.is_empty() {
            return Array1::zeros(self.item_weights.value().cols());
        }

        let mut hidden = Array1::<f32>::zeros(embeddings.cols());

        for &item_id in &history {
            hidden += &embeddings.subview(Axis(0), item_id);
        }
        hidden *= 1.0 / (history.len() as f32).sqrt();

        let last_layer = self.layers.len() - 1;
        for (idx, layer) in self.layers.iter().enumerate() {
            let weights = layer.value();
            hidden = hidden.dot(&*weights);

            if idx != last_layer {
                hidden.mapv_inplace(relu);
            }
        }

        hidden
    }

    fn latent_vectors(
        &self,
        consumed: &UserConsumed,
        num_users: usize,
        mode: InteractionMode,
        rng: &mut XorShiftRng,
        epoch: usize,
    ) -> LatentVectors {
        // Per-user seeds keep random-mode refreshes independent of scheduling.
        let seeds: Vec<[u8; 16]> = (0..num_users).map(|_| rng.gen()).collect();

        let user_rows: Vec<Array1<f32>> = seeds
            .into_par_iter()
            .enumerate()
            .map(|(user_id, seed)| {
                let mut user_rng = XorShiftRng::from_seed(seed);
                self.user_vector(&mode.select(consumed.history(user_id), &mut user_rng))
            })
            .collect();

        let item_vectors = self.item_weights.value().to_owned();
        let mut user_vectors = Arr::zeros((num_users, item_vectors.cols()));

        for (user_id, row) in user_rows.iter().enumerate() {
            user_vectors.subview_mut(Axis(0), user_id).assign(row);
        }

        LatentVectors::new(epoch, user_vectors, item_vectors)
    }
}

/// Every position with at least one preceding item is a target, predicted
/// from items before it chosen by `mode`.
fn training_examples(
    consumed: &UserConsumed,
    num_users: usize,
    num_items: usize,
    mode: InteractionMode,
) -> Vec<(UserId, usize)> {
    let mut examples = Vec::new();

    for user_id in 0..num_users.min(consumed.num_users()) {
        let history = consumed.history(user_id);

        for position in 1..history.len() {
            let candidates = match mode {
                InteractionMode::Recent(num) => &history[position.saturating_sub(num)..position],
                InteractionMode::Random(_) => &history[..position],
            };

            if history[position] < num_items && candidates.iter().all(|&x| x < num_items) {
                examples.push((user_id, position));
            }
        }
    }

    examples
}

/// Two-tower candidate generation model.
#[derive(Debug, Clone)]
pub struct YouTubeMatchModel {
    hyper: Hyperparameters,
    params: Parameters,
    user_consumed: Option<Arc<UserConsumed>>,
    latent: Option<Arc<LatentVectors>>,
    epochs_trained: usize,
}

impl YouTubeMatchModel {
    /// Fit the model, returning the mean training loss of the last epoch.
    pub fn fit(&mut self, interactions: &Interactions) -> Result<f32, FittingError> {
        self.fit_epochs(interactions, |_, _| Ok(()))
    }

    /// Fit the model, evaluating on `eval` after every epoch.
    ///
    /// The evaluation request is validated before training starts.
    pub fn fit_with_eval(
        &mut self,
        interactions: &Interactions,
        eval: &Interactions,
        k: usize,
        metrics: &[Metric],
    ) -> Result<Vec<MetricReport>, FittingError> {
        evaluation::check_request(Task::Ranking, eval, metrics)?;

        let mut reports = Vec::with_capacity(self.hyper.num_epochs);

        self.fit_epochs(interactions, |model, epoch| {
            let report = evaluation::evaluate(model, eval, k, metrics)?;
            info!("Epoch {} evaluation: {}", epoch, report);
            reports.push(report);
            Ok(())
        })?;

        Ok(reports)
    }

    /// The current latent vector snapshot, if the model has been fitted.
    pub fn latent_vectors(&self) -> Option<Arc<LatentVectors>> {
        self.latent.clone()
    }

    fn fit_epochs<F>(
        &mut self,
        interactions: &Interactions,
        mut on_epoch: F,
    ) -> Result<f32, FittingError>
    where
        F: FnMut(&Self, usize) -> Result<(), FittingError>,
    {
        let num_users = self.hyper.num_users;
        let num_items = self.hyper.num_items;
        let mode = self.hyper.interaction_mode;
        let num_neg = self.hyper.num_neg;
        let loss_type = self.hyper.loss;

        let consumed = Arc::new(interactions.consumed());

        let mut examples = training_examples(&consumed, num_users, num_items, mode);

        if examples.is_empty() || num_items == 0 {
            return Err(FittingError::NoInteractions);
        }

        self.user_consumed = Some(consumed.clone());

        let optimizer = self
            .hyper
            .optimizer
            .build(self.hyper.learning_rate, self.hyper.l2_penalty);
        let negative_item_range = Uniform::new(0, num_items);
        let mut rng = XorShiftRng::from_seed(self.hyper.rng.gen());
        let mut latent_rng = XorShiftRng::from_seed(self.hyper.rng.gen());
        let mut epoch_loss = 0.0;

        for _ in 0..self.hyper.num_epochs {
            let start = Instant::now();

            epoch_loss = {
                let params = &self.params;
                let consumed = &consumed;
                let optimizer = &optimizer;
                let negative_item_range = &negative_item_range;

                run_epoch(&mut examples, self.hyper.num_threads, &mut rng, |partition, thread_rng| {
                    let mut graphs: HashMap<usize, Graph> = HashMap::new();
                    let mut partition_loss = PartitionLoss::default();

                    for &(user_id, position) in partition {
                        let history = consumed.history(user_id);
                        let context = mode.select(&history[..position], thread_rng);
                        let user_consumed: &ConsumedSet = consumed.consumed(user_id);

                        let graph = graphs
                            .entry(context.len())
                            .or_insert_with(|| params.build_graph(context.len(), loss_type));

                        graph.history.set_value(context.as_slice());
                        graph.positive.set_value(history[position]);

                        for _ in 0..num_neg {
                            graph.negative.set_value(sample_unconsumed(
                                user_consumed,
                                negative_item_range,
                                thread_rng,
                            ));

                            graph.loss.forward();
                            graph.loss.backward(1.0);

                            partition_loss.loss += graph.loss.value().scalar_sum();
                            partition_loss.examples += 1;

                            optimizer.step(graph.loss.parameters());
                        }
                    }

                    partition_loss
                })
            };

            self.epochs_trained += 1;
            let latent = self.params.latent_vectors(
                &consumed,
                num_users,
                mode,
                &mut latent_rng,
                self.epochs_trained,
            );
            self.latent = Some(Arc::new(latent));

            info!(
                "Epoch {} finished in {:?}, train loss: {:.4}",
                self.epochs_trained,
                start.elapsed(),
                epoch_loss
            );

            on_epoch(&*self, self.epochs_trained)?;
        }

        Ok(epoch_loss)
    }

    fn snapshot(&self) -> Result<&LatentVectors, PredictionError> {
        self.latent
            .as_ref()
            .map(|latent| latent.as_ref())
            .ok_or(PredictionError::NotFitted)
    }
}

impl ScoringModel for YouTubeMatchModel {
    fn task(&self) -> Task {
        Task::Ranking
    }

    fn shape(&self) -> Result<(usize, usize), PredictionError> {
        self.snapshot()?;
        Ok((self.hyper.num_users, self.hyper.num_items))
    }

    fn default_prediction(&self) -> f32 {
        0.0
    }

    fn score_pairs(
        &self,
        user_ids: &[UserId],
        item_ids: &[ItemId],
    ) -> Result<Vec<f32>, PredictionError> {
        Ok(self
            .snapshot()?
            .dot_pairs(user_ids, item_ids)
            .into_iter()
            .map(sigmoid)
            .collect())
    }

    fn score_all_items(&self, user_id: UserId) -> Result<Vec<f32>, PredictionError> {
        Ok(self.snapshot()?.dot_all(user_id))
    }

    fn output_score(&self, score: f32) -> f32 {
        sigmoid(score)
    }

    fn consumed(&self, user_id: UserId) -> Result<&ConsumedSet, PredictionError> {
        self.user_consumed
            .as_ref()
            .map(|consumed| consumed.consumed(user_id))
            .ok_or(PredictionError::NotFitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Interaction;
    use crate::ConfigurationError;

    fn toy_data() -> Interactions {
        // Users 0..20 walk through items in two disjoint cycles.
        let interactions = (0..20)
            .flat_map(|user_id| {
                let offset = if user_id % 2 == 0 { 0 } else { 10 };
                (0..8).map(move |step| {
                    Interaction::new(user_id, offset + (user_id + step) % 10, step)
                })
            })
            .collect::<Vec<_>>();

        Interactions::from(interactions)
    }

    fn hyperparameters(data: &Interactions) -> Hyperparameters {
        Hyperparameters::new(data.num_users(), data.num_items())
            .embedding_dim(8)
            .hidden_units(vec![16, 8])
            .optimizer(Optimizer::Adagrad)
            .learning_rate(0.02)
            .l2_penalty(1e-4)
            .num_epochs(3)
            .num_threads(2)
            .from_seed([42; 16])
    }

    fn model(data: &Interactions) -> YouTubeMatchModel {
        hyperparameters(data).build().unwrap()
    }

    #[test]
    fn rating_task_rejected() {
        let error = Hyperparameters::new(2, 2).task(Task::Rating).build().unwrap_err();

        assert_eq!(
            error,
            ConfigurationError::TaskNotSupported {
                model: "YouTubeMatch",
                task: Task::Rating,
            }
        );
    }

    #[test]
    fn empty_tower_rejected() {
        assert!(Hyperparameters::new(2, 2).hidden_units(Vec::new()).build().is_err());
    }

    #[test]
    fn unfitted_model_refuses_to_predict() {
        let data = toy_data();
        let model = model(&data);

        assert_eq!(model.predict(&[0], &[0]), Err(PredictionError::NotFitted));
        assert_eq!(model.recommend_user(0, 3), Err(PredictionError::NotFitted));
    }

    #[test]
    fn no_interactions() {
        let data = Interactions::new(3, 3);
        let mut model = Hyperparameters::new(3, 3).build().unwrap();

        match model.fit(&data) {
            Err(FittingError::NoInteractions) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn latent_cache_refreshed_every_epoch() {
        let data = toy_data();
        let mut model = model(&data);

        let loss = model.fit(&data).unwrap();
        assert!(loss > 0.0 && loss < 1.0);

        let first = model.latent_vectors().unwrap();
        assert_eq!(first.epoch(), 3);
        assert_eq!(first.user_vectors().rows(), data.num_users());
        assert_eq!(first.item_vectors().rows(), data.num_items());

        model.fit(&data).unwrap();

        let second = model.latent_vectors().unwrap();
        assert_eq!(second.epoch(), 6);
        // Readers holding the old snapshot are unaffected by the refresh.
        assert_eq!(first.epoch(), 3);
    }

    #[test]
    fn predict_and_recommend() {
        let data = toy_data();
        let mut model = model(&data);
        model.fit(&data).unwrap();

        let predictions = model.predict(&[0, 1, 25], &[3, 4, 0]).unwrap();
        assert_eq!(predictions.len(), 3);
        assert!(predictions[..2].iter().all(|&x| x > 0.0 && x < 1.0));
        assert_eq!(predictions[2], model.default_prediction());

        let recommendations = model.recommend_user(0, 5).unwrap().unwrap();
        let consumed = model.consumed(0).unwrap();

        assert!(recommendations.len() <= 5);
        assert!(recommendations
            .iter()
            .all(|&(item_id, _)| !consumed.contains(item_id)));
        assert_eq!(model.recommend_user(0, 5).unwrap().unwrap(), recommendations);

        assert_eq!(model.recommend_user(100, 5).unwrap(), None);
    }

    #[test]
    fn per_epoch_evaluation() {
        let data = toy_data();
        let mut rng = XorShiftRng::from_seed([1; 16]);
        let (train, mut test) = crate::data::train_test_split(&mut data.clone(), &mut rng, 0.2);

        let mut model = model(&data);

        match model.fit_with_eval(&train, &test, 5, &[Metric::Precision]) {
            Err(FittingError::Evaluation(evaluation::EvaluationError::NotPrepared)) => {}
            other => panic!("unexpected result {:?}", other),
        }

        test.sample_negatives(1, &mut rng);
        let reports = model
            .fit_with_eval(&train, &test, 5, &[Metric::Precision, Metric::Ndcg, Metric::RocAuc])
            .unwrap();

        assert_eq!(reports.len(), 3);
        for report in &reports {
            let ndcg = report.get(Metric::Ndcg).unwrap();
            assert!(ndcg >= 0.0 && ndcg <= 1.0);
            assert!(report.get(Metric::RocAuc).is_some());
        }
    }

    #[test]
    fn recommendations_follow_raw_scores() {
        let data = toy_data();
        let hyper = hyperparameters(&data).num_threads(1);

        let mut first = hyper.clone().build().unwrap();
        let mut second = hyper.build().unwrap();
        first.fit(&data).unwrap();
        second.fit(&data).unwrap();

        let recommendations = first.recommend_user(0, 5).unwrap().unwrap();
        assert_eq!(second.recommend_user(0, 5).unwrap().unwrap(), recommendations);

        let latent = first.latent_vectors().unwrap();
        let expected: Vec<(ItemId, f32)> =
            crate::topn::select(&latent.dot_all(0), first.consumed(0).unwrap(), 5)
                .into_iter()
                .map(|(item_id, score)| (item_id, sigmoid(score)))
                .collect();

        assert_eq!(recommendations, expected);
        assert_eq!(recommendations.len(), 5);
        for window in recommendations.windows(2) {
            assert!(window[0].1 > window[1].1);
        }
    }

    #[test]
    fn recent_mode_user_vectors() {
        let data = toy_data();
        let mut model = hyperparameters(&data)
            .interaction_mode(InteractionMode::Recent(3))
            .build()
            .unwrap();
        model.fit(&data).unwrap();

        let consumed = data.consumed();
        let latent = model.latent_vectors().unwrap();

        for user_id in 0..data.num_users() {
            assert_eq!(
                latent.user_vectors().subview(Axis(0), user_id),
                model.params.user_vector(consumed.recent(user_id, 3))
            );
        }
    }

    #[test]
    fn random_mode_is_seeded() {
        let data = toy_data();
        let hyper = hyperparameters(&data)
            .interaction_mode(InteractionMode::Random(3))
            .num_threads(1);

        let mut first = hyper.clone().build().unwrap();
        let mut second = hyper.build().unwrap();
        first.fit(&data).unwrap();
        second.fit(&data).unwrap();

        let first_latent = first.latent_vectors().unwrap();
        let second_latent = second.latent_vectors().unwrap();

        assert_eq!(first_latent.user_vectors(), second_latent.user_vectors());
        assert_eq!(first_latent.item_vectors(), second_latent.item_vectors());
        assert!(first_latent.user_vectors().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn context_items_must_be_known() {
        // Item 9 is outside a 5-item vocabulary.
        let data = Interactions::from(vec![
            Interaction::new(0, 9, 0),
            Interaction::new(0, 1, 1),
            Interaction::new(0, 2, 2),
            Interaction::new(0, 3, 3),
        ]);
        let consumed = data.consumed();

        assert_eq!(
            training_examples(&consumed, 1, 5, InteractionMode::Recent(1)),
            vec![(0, 2), (0, 3)]
        );
        assert!(training_examples(&consumed, 1, 5, InteractionMode::Random(1)).is_empty());
    }

    #[test]
    fn zero_interaction_count_rejected() {
        assert!(Hyperparameters::new(2, 2)
            .interaction_mode(InteractionMode::Random(0))
            .build()
            .is_err());
    }
}
