//! Wide & Deep model after Cheng et al., "Wide & Deep Learning for
//! Recommender Systems".
//!
//! The wide part is a per-user plus per-item scalar weight; the deep part
//! feeds user and item embeddings through a stack of ReLU layers into a
//! single linear output unit. The two parts are summed, and trained with
//! separate optimizers: Adagrad for the wide weights, Adam for the deep
//! ones.
use std::sync::Arc;
use std::time::Instant;

use ndarray::Axis;
use rand;
use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng, XorShiftRng};
use rayon;

use wyrm;
use wyrm::optim::Optimizer as Optim;
use wyrm::{Arr, BoxedNode, DataInput, Variable};

use super::training::{run_epoch, PartitionLoss};
use super::{
    check_hidden_units, dense_init, embedding_init, relu, sigmoid, Bounds, Optimizer, Task,
};
use crate::data::{sample_unconsumed, ConsumedSet, Interactions, UserConsumed};
use crate::evaluation::{self, Metric, MetricReport};
use crate::{ConfigurationError, FittingError, ItemId, PredictionError, ScoringModel, UserId};

/// Hyperparameters describing the Wide & Deep model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hyperparameters {
    num_users: usize,
    num_items: usize,
    task: Task,
    embedding_dim: usize,
    hidden_units: Vec<usize>,
    wide_learning_rate: f32,
    deep_learning_rate: f32,
    l2_penalty: f32,
    num_neg: usize,
    batch_sampling: bool,
    bounds: Option<Bounds>,
    rng: XorShiftRng,
    num_threads: usize,
    num_epochs: usize,
}

impl Hyperparameters {
    /// Build new hyperparameters for a vocabulary of the given size.
    pub fn new(num_users: usize, num_items: usize, task: Task) -> Self {
        Hyperparameters {
            num_users,
            num_items,
            task,
            embedding_dim: 16,
            hidden_units: vec![128, 64, 32],
            wide_learning_rate: 0.01,
            deep_learning_rate: 1e-4,
            l2_penalty: 0.0,
            num_neg: 1,
            batch_sampling: false,
            bounds: None,
            rng: XorShiftRng::from_seed(rand::thread_rng().gen()),
            num_threads: rayon::current_num_threads(),
            num_epochs: 20,
        }
    }

    /// Set the embedding dimensionality of the deep part.
    pub fn embedding_dim(mut self, embedding_dim: usize) -> Self {
        self.embedding_dim = embedding_dim;
        self
    }

    /// Set the sizes of the deep layers.
    pub fn hidden_units(mut self, hidden_units: Vec<usize>) -> Self {
        self.hidden_units = hidden_units;
        self
    }

    /// Set the learning rate of the wide part.
    pub fn wide_learning_rate(mut self, learning_rate: f32) -> Self {
        self.wide_learning_rate = learning_rate;
        self
    }

    /// Set the learning rate of the deep part.
    pub fn deep_learning_rate(mut self, learning_rate: f32) -> Self {
        self.deep_learning_rate = learning_rate;
        self
    }

    /// Set the L2 penalty.
    pub fn l2_penalty(mut self, l2_penalty: f32) -> Self {
        self.l2_penalty = l2_penalty;
        self
    }

    /// Set the number of negatives drawn per positive with batch sampling.
    pub fn num_neg(mut self, num_neg: usize) -> Self {
        self.num_neg = num_neg;
        self
    }

    /// Draw negatives on the fly during ranking training instead of
    /// requiring negative-sampled training data.
    pub fn batch_sampling(mut self, batch_sampling: bool) -> Self {
        self.batch_sampling = batch_sampling;
        self
    }

    /// Set explicit rating bounds. Without them, rating predictions are
    /// clamped to the label range of the training data.
    pub fn lower_upper_bound(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
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
    pub fn random<R: Rng>(num_users: usize, num_items: usize, task: Task, rng: &mut R) -> Self {
        let depth = Uniform::new(1, 4).sample(rng);
        let width = 2_usize.pow(Uniform::new(4, 8).sample(rng));

        Hyperparameters {
            num_users,
            num_items,
            task,
            embedding_dim: 2_usize.pow(Uniform::new(3, 7).sample(rng)),
            hidden_units: (0..depth).map(|layer| (width >> layer).max(8)).collect(),
            wide_learning_rate: (10.0_f32).powf(Uniform::new(-3.0, -1.0).sample(rng)),
            deep_learning_rate: (10.0_f32).powf(Uniform::new(-5.0, -2.0).sample(rng)),
            l2_penalty: (10.0_f32).powf(Uniform::new(-7.0, -3.0).sample(rng)),
            num_neg: Uniform::new(1, 6).sample(rng),
            batch_sampling: true,
            bounds: None,
            rng: XorShiftRng::from_seed(rand::thread_rng().gen()),
            num_threads: rayon::current_num_threads(),
            num_epochs: 2_usize.pow(Uniform::new(2, 6).sample(rng)),
        }
    }

    fn build_params(&mut self) -> Parameters {
        let embedding_dim = self.embedding_dim;
        let first_units = self.hidden_units[0];
        let rng = &mut self.rng;

        let mut layers = Vec::with_capacity(self.hidden_units.len() - 1);
        for window in self.hidden_units.windows(2) {
            layers.push(Arc::new(wyrm::HogwildParameter::new(dense_init(
                window[0], window[1], rng,
            ))));
        }

        let last_units = self.hidden_units[self.hidden_units.len() - 1];

        Parameters {
            wide_user: Arc::new(wyrm::HogwildParameter::new(Arr::zeros((self.num_users, 1)))),
            wide_item: Arc::new(wyrm::HogwildParameter::new(Arr::zeros((self.num_items, 1)))),
            deep_user: Arc::new(wyrm::HogwildParameter::new(embedding_init(
                self.num_users,
                embedding_dim,
                rng,
            ))),
            deep_item: Arc::new(wyrm::HogwildParameter::new(embedding_init(
                self.num_items,
                embedding_dim,
                rng,
            ))),
            user_projection: Arc::new(wyrm::HogwildParameter::new(dense_init(
                embedding_dim,
                first_units,
                rng,
            ))),
            item_projection: Arc::new(wyrm::HogwildParameter::new(dense_init(
                embedding_dim,
                first_units,
                rng,
            ))),
            layers,
            output: Arc::new(wyrm::HogwildParameter::new(dense_init(last_units, 1, rng))),
        }
    }

    /// Build the Wide & Deep model.
    pub fn build(mut self) -> Result<WideDeepModel, ConfigurationError> {
        check_hidden_units(&self.hidden_units)?;
        if self.embedding_dim == 0 {
            return Err(ConfigurationError::InvalidHyperparameter(
                "embedding_dim must be positive",
            ));
        }

        let params = self.build_params();

        Ok(WideDeepModel {
            hyper: self,
            params,
            user_consumed: None,
            bounds: None,
            global_mean: 0.0,
            epochs_trained: 0,
        })
    }
}

#[derive(Debug)]
struct Parameters {
    wide_user: Arc<wyrm::HogwildParameter>,
    wide_item: Arc<wyrm::HogwildParameter>,
    deep_user: Arc<wyrm::HogwildParameter>,
    deep_item: Arc<wyrm::HogwildParameter>,
    user_projection: Arc<wyrm::HogwildParameter>,
    item_projection: Arc<wyrm::HogwildParameter>,
    layers: Vec<Arc<wyrm::HogwildParameter>>,
    output: Arc<wyrm::HogwildParameter>,
}

fn deep_copy(param: &Arc<wyrm::HogwildParameter>) -> Arc<wyrm::HogwildParameter> {
    Arc::new(param.as_ref().clone())
}

impl Clone for Parameters {
    fn clone(&self) -> Self {
        Parameters {
            wide_user: deep_copy(&self.wide_user),
            wide_item: deep_copy(&self.wide_item),
            deep_user: deep_copy(&self.deep_user),
            deep_item: deep_copy(&self.deep_item),
            user_projection: deep_copy(&self.user_projection),
            item_projection: deep_copy(&self.item_projection),
            layers: self.layers.iter().map(deep_copy).collect(),
            output: deep_copy(&self.output),
        }
    }
}

struct Graph {
    user: Variable<wyrm::IndexInputNode>,
    item: Variable<wyrm::IndexInputNode>,
    label: Variable<wyrm::InputNode>,
    loss: Variable<BoxedNode>,
    wide_params: Vec<Variable<wyrm::ParameterNode>>,
    deep_params: Vec<Variable<wyrm::ParameterNode>>,
}

impl Parameters {
    fn build_graph(&self, task: Task) -> Graph {
        let wide_user = wyrm::ParameterNode::shared(self.wide_user.clone());
        let wide_item = wyrm::ParameterNode::shared(self.wide_item.clone());
        let deep_user = wyrm::ParameterNode::shared(self.deep_user.clone());
        let deep_item = wyrm::ParameterNode::shared(self.deep_item.clone());
        let user_projection = wyrm::ParameterNode::shared(self.user_projection.clone());
        let item_projection = wyrm::ParameterNode::shared(self.item_projection.clone());
        let layers: Vec<_> = self
            .layers
            .iter()
            .map(|layer| wyrm::ParameterNode::shared(layer.clone()))
            .collect();
        let output_weights = wyrm::ParameterNode::shared(self.output.clone());

        let user = wyrm::IndexInputNode::new(&[0]);
        let item = wyrm::IndexInputNode::new(&[0]);
        let label = wyrm::InputNode::new(Arr::zeros((1, 1)));

        let wide = wide_user.index(&user) + wide_item.index(&item);

        let mut hidden = (deep_user.index(&user).dot(&user_projection)
            + deep_item.index(&item).dot(&item_projection))
        .relu()
        .boxed();

        for layer in &layers {
            hidden = hidden.dot(layer).relu().boxed();
        }

        let output = (wide + hidden.dot(&output_weights)).boxed();

        let loss = match task {
            Task::Rating => (output - label.clone()).square().boxed(),
            Task::Ranking => {
                let probability = output.sigmoid();
                let positive = label.clone() * (1e-7 + probability.clone()).ln();
                let negative = (1.0 - label.clone()) * (1e-7 + (1.0 - probability)).ln();

                (-(positive + negative)).boxed()
            }
        };

        let mut deep_params = vec![deep_user, deep_item, user_projection, item_projection];
        deep_params.extend(layers);
        deep_params.push(output_weights);

        Graph {
            user,
            item,
            label,
            loss,
            wide_params: vec![wide_user, wide_item],
            deep_params,
        }
    }

    /// Raw model outputs for known `(user, item)` pairs.
    fn forward(&self, user_ids: &[UserId], item_ids: &[ItemId]) -> Vec<f32> {
        let users = self.deep_user.value().select(Axis(0), user_ids);
        let items = self.deep_item.value().select(Axis(0), item_ids);

        let mut hidden = &users.dot(&*self.user_projection.value())
            + &items.dot(&*self.item_projection.value());
        hidden.mapv_inplace(relu);

        for layer in &self.layers {
            hidden = hidden.dot(&*layer.value());
            hidden.mapv_inplace(relu);
        }

        let deep = hidden.dot(&*self.output.value());
        let wide_user = self.wide_user.value();
        let wide_item = self.wide_item.value();

        izip!(user_ids, item_ids, deep.iter())
            .map(|(&user_id, &item_id, &deep)| {
                wide_user[(user_id, 0)] + wide_item[(item_id, 0)] + deep
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug)]
struct Example {
    user_id: UserId,
    item_id: ItemId,
    label: f32,
}

/// Wide & Deep model.
#[derive(Debug, Clone)]
pub struct WideDeepModel {
    hyper: Hyperparameters,
    params: Parameters,
    user_consumed: Option<Arc<UserConsumed>>,
    bounds: Option<Bounds>,
    global_mean: f32,
    epochs_trained: usize,
}

impl WideDeepModel {
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
        evaluation::check_request(self.hyper.task, eval, metrics)?;

        let mut reports = Vec::with_capacity(self.hyper.num_epochs);

        self.fit_epochs(interactions, |model, epoch| {
            let report = evaluation::evaluate(model, eval, k, metrics)?;
            info!("Epoch {} evaluation: {}", epoch, report);
            reports.push(report);
            Ok(())
        })?;

        Ok(reports)
    }

    /// Rating bounds in effect after fitting.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    fn training_examples(
        &self,
        interactions: &Interactions,
    ) -> Result<(Vec<Example>, bool), FittingError> {
        let num_users = self.hyper.num_users;
        let num_items = self.hyper.num_items;

        let in_vocabulary = interactions
            .data()
            .iter()
            .filter(|x| x.user_id() < num_users && x.item_id() < num_items);

        let (examples, sample_online): (Vec<Example>, bool) = match self.hyper.task {
            Task::Rating => (
                in_vocabulary
                    .map(|x| Example {
                        user_id: x.user_id(),
                        item_id: x.item_id(),
                        label: x.label(),
                    })
                    .collect(),
                false,
            ),
            Task::Ranking if interactions.has_sampled() => (
                in_vocabulary
                    .map(|x| Example {
                        user_id: x.user_id(),
                        item_id: x.item_id(),
                        label: if x.is_positive() { 1.0 } else { 0.0 },
                    })
                    .collect(),
                false,
            ),
            Task::Ranking if self.hyper.batch_sampling => (
                in_vocabulary
                    .filter(|x| x.is_positive())
                    .map(|x| Example {
                        user_id: x.user_id(),
                        item_id: x.item_id(),
                        label: 1.0,
                    })
                    .collect(),
                true,
            ),
            Task::Ranking => return Err(FittingError::NotSampled),
        };

        if examples.is_empty() {
            return Err(FittingError::NoInteractions);
        }

        Ok((examples, sample_online))
    }

    fn fit_epochs<F>(
        &mut self,
        interactions: &Interactions,
        mut on_epoch: F,
    ) -> Result<f32, FittingError>
    where
        F: FnMut(&Self, usize) -> Result<(), FittingError>,
    {
        let (mut examples, sample_online) = self.training_examples(interactions)?;

        let data_info = interactions.data_info();
        let (min_rating, max_rating) = data_info.min_max_rating;
        self.global_mean = data_info.global_mean;
        self.bounds = match self.hyper.bounds {
            Some(bounds) => Some(bounds),
            None => Bounds::new(min_rating, max_rating).ok(),
        };

        let consumed = Arc::new(interactions.consumed());
        self.user_consumed = Some(consumed.clone());

        let task = self.hyper.task;
        let num_neg = self.hyper.num_neg;
        let wide_optimizer =
            Optimizer::Adagrad.build(self.hyper.wide_learning_rate, self.hyper.l2_penalty);
        let deep_optimizer =
            Optimizer::Adam.build(self.hyper.deep_learning_rate, self.hyper.l2_penalty);
        let negative_item_range = Uniform::new(0, self.hyper.num_items.max(1));
        let mut rng = XorShiftRng::from_seed(self.hyper.rng.gen());
        let mut epoch_loss = 0.0;

        for _ in 0..self.hyper.num_epochs {
            let start = Instant::now();

            epoch_loss = {
                let params = &self.params;
                let consumed = &consumed;
                let wide_optimizer = &wide_optimizer;
                let deep_optimizer = &deep_optimizer;
                let negative_item_range = &negative_item_range;

                run_epoch(&mut examples, self.hyper.num_threads, &mut rng, |partition, thread_rng| {
                    let mut graph = params.build_graph(task);
                    let mut partition_loss = PartitionLoss::default();

                    let mut train = |user_id: UserId, item_id: ItemId, label: f32| {
                        graph.user.set_value(user_id);
                        graph.item.set_value(item_id);
                        graph.label.set_value(label);

                        graph.loss.forward();
                        graph.loss.backward(1.0);

                        partition_loss.loss += graph.loss.value().scalar_sum();
                        partition_loss.examples += 1;

                        wide_optimizer.step(&graph.wide_params);
                        deep_optimizer.step(&graph.deep_params);
                    };

                    for example in partition {
                        train(example.user_id, example.item_id, example.label);

                        if sample_online {
                            let user_consumed: &ConsumedSet = consumed.consumed(example.user_id);

                            for _ in 0..num_neg {
                                let negative =
                                    sample_unconsumed(user_consumed, negative_item_range, thread_rng);
                                train(example.user_id, negative, 0.0);
                            }
                        }
                    }

                    partition_loss
                })
            };

            self.epochs_trained += 1;

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

    fn finalize(&self, output: f32) -> f32 {
        match (self.hyper.task, self.bounds) {
            (Task::Ranking, _) => sigmoid(output),
            (Task::Rating, Some(bounds)) => bounds.clamp(output),
            (Task::Rating, None) => output,
        }
    }
}

impl ScoringModel for WideDeepModel {
    fn task(&self) -> Task {
        self.hyper.task
    }

    fn shape(&self) -> Result<(usize, usize), PredictionError> {
        if self.user_consumed.is_none() {
            return Err(PredictionError::NotFitted);
        }

        Ok((self.hyper.num_users, self.hyper.num_items))
    }

    fn default_prediction(&self) -> f32 {
        match self.hyper.task {
            Task::Rating => self.global_mean,
            Task::Ranking => 0.0,
        }
    }

    fn score_pairs(
        &self,
        user_ids: &[UserId],
        item_ids: &[ItemId],
    ) -> Result<Vec<f32>, PredictionError> {
        self.shape()?;

        Ok(self
            .params
            .forward(user_ids, item_ids)
            .into_iter()
            .map(|output| self.finalize(output))
            .collect())
    }

    fn score_all_items(&self, user_id: UserId) -> Result<Vec<f32>, PredictionError> {
        let (_, num_items) = self.shape()?;

        let user_ids = vec![user_id; num_items];
        let item_ids: Vec<ItemId> = (0..num_items).collect();

        Ok(self.params.forward(&user_ids, &item_ids))
    }

    fn output_score(&self, score: f32) -> f32 {
        self.finalize(score)
    }

    fn consumed(&self, user_id: UserId) -> Result<&ConsumedSet, PredictionError> {
        self.user_consumed
            .as_ref()
            .map(|consumed| consumed.consumed(user_id))
            .ok_or(PredictionError::NotFitted)
    }
}
