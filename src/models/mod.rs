//! Models module.
use std::fmt;
use std::str::FromStr;

use rand::distributions::{Distribution, Normal};
use rand::{seq, Rng};

use wyrm;
use wyrm::Arr;

use crate::{ConfigurationError, ItemId};

mod latent;
mod training;
pub mod wide_deep;
pub mod youtube_match;

pub use self::latent::LatentVectors;

/// What the model predicts.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Task {
    /// Explicit ratings, clamped to the rating bounds.
    Rating,
    /// Implicit feedback, scored as interaction probabilities.
    Ranking,
}

impl FromStr for Task {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rating" => Ok(Task::Rating),
            "ranking" => Ok(Task::Ranking),
            other => Err(ConfigurationError::InvalidTask(other.to_owned())),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Task::Rating => write!(f, "rating"),
            Task::Ranking => write!(f, "ranking"),
        }
    }
}

/// The loss used for training the two-tower model.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Loss {
    /// Bayesian Personalised Ranking.
    BPR,
    /// Pairwise hinge loss.
    Hinge,
}

impl FromStr for Loss {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bpr" => Ok(Loss::BPR),
            "hinge" => Ok(Loss::Hinge),
            other => Err(ConfigurationError::InvalidLoss(other.to_owned())),
        }
    }
}

/// Optimizer used to train the model.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Optimizer {
    /// Adagrad.
    Adagrad,
    /// Adam.
    Adam,
}

impl Optimizer {
    fn build(self, learning_rate: f32, l2_penalty: f32) -> wyrm::optim::Optimizers {
        match self {
            Optimizer::Adagrad => wyrm::optim::Optimizers::Adagrad(
                wyrm::optim::Adagrad::new()
                    .learning_rate(learning_rate)
                    .l2_penalty(l2_penalty),
            ),
            Optimizer::Adam => wyrm::optim::Optimizers::Adam(
                wyrm::optim::Adam::new()
                    .learning_rate(learning_rate)
                    .l2_penalty(l2_penalty),
            ),
        }
    }
}

/// Which consumed items represent a user.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum InteractionMode {
    /// The `n` most recent items.
    Recent(usize),
    /// `n` items sampled uniformly without replacement.
    Random(usize),
}

impl InteractionMode {
    /// Maximum number of items taken.
    pub fn num(self) -> usize {
        match self {
            InteractionMode::Recent(num) | InteractionMode::Random(num) => num,
        }
    }

    /// Pick the items representing a user from their time-ordered
    /// `history`. Users with at most `num` items keep all of them.
    pub fn select<R: Rng>(self, history: &[ItemId], rng: &mut R) -> Vec<ItemId> {
        match self {
            InteractionMode::Recent(num) => history[history.len().saturating_sub(num)..].to_vec(),
            InteractionMode::Random(num) if history.len() <= num => history.to_vec(),
            InteractionMode::Random(num) => seq::sample_slice(rng, history, num),
        }
    }
}

/// Inclusive rating bounds used to clamp rating predictions.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    lower: f32,
    upper: f32,
}

impl Bounds {
    /// Build bounds, rejecting non-finite or inverted pairs.
    pub fn new(lower: f32, upper: f32) -> Result<Self, ConfigurationError> {
        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(ConfigurationError::InvalidBounds { lower, upper });
        }

        Ok(Bounds { lower, upper })
    }

    /// Lower bound.
    pub fn lower(&self) -> f32 {
        self.lower
    }

    /// Upper bound.
    pub fn upper(&self) -> f32 {
        self.upper
    }

    /// Clamp `value` into the bounds.
    pub fn clamp(&self, value: f32) -> f32 {
        value.max(self.lower).min(self.upper)
    }
}

/// Parse comma-separated layer sizes such as `"128,64,32"`.
pub fn parse_hidden_units(value: &str) -> Result<Vec<usize>, ConfigurationError> {
    let units = value
        .split(',')
        .map(|x| x.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ConfigurationError::InvalidHyperparameter("hidden units must be integers"))?;

    check_hidden_units(&units)?;

    Ok(units)
}

fn check_hidden_units(units: &[usize]) -> Result<(), ConfigurationError> {
    if units.is_empty() || units.iter().any(|&x| x == 0) {
        return Err(ConfigurationError::InvalidHyperparameter(
            "hidden units must be a non-empty list of positive sizes",
        ));
    }

    Ok(())
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn relu(x: f32) -> f32 {
    x.max(0.0)
}

fn embedding_init<T: Rng>(rows: usize, cols: usize, rng: &mut T) -> wyrm::Arr {
    let normal = Normal::new(0.0, 1.0 / cols as f64);
    Arr::zeros((rows, cols)).map(|_| normal.sample(rng) as f32)
}

fn dense_init<T: Rng>(rows: usize, cols: usize, rng: &mut T) -> wyrm::Arr {
    let normal = Normal::new(0.0, (2.0 / (rows + cols) as f64).sqrt());
    Arr::zeros((rows, cols)).map(|_| normal.sample(rng) as f32)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, XorShiftRng};

    use super::*;

    #[test]
    fn task_names() {
        assert_eq!("rating".parse::<Task>(), Ok(Task::Rating));
        assert_eq!("ranking".parse::<Task>(), Ok(Task::Ranking));
        assert_eq!(
            "regression".parse::<Task>(),
            Err(ConfigurationError::InvalidTask("regression".to_owned()))
        );
    }

    #[test]
    fn loss_names() {
        assert_eq!("bpr".parse::<Loss>(), Ok(Loss::BPR));
        assert!("sampled_softmax".parse::<Loss>().is_err());
    }

    #[test]
    fn recent_interactions() {
        let mut rng = XorShiftRng::from_seed([5; 16]);
        let history = [4, 8, 15, 16, 23, 42];

        assert_eq!(
            InteractionMode::Recent(3).select(&history, &mut rng),
            vec![16, 23, 42]
        );
        assert_eq!(
            InteractionMode::Recent(10).select(&history, &mut rng),
            history.to_vec()
        );
    }

    #[test]
    fn random_interactions() {
        let history: Vec<ItemId> = (0..50).collect();
        let mode = InteractionMode::Random(5);

        let sampled = mode.select(&history, &mut XorShiftRng::from_seed([5; 16]));
        let mut distinct = sampled.clone();
        distinct.sort();
        distinct.dedup();

        assert_eq!(distinct.len(), 5);
        assert!(sampled.iter().all(|&item_id| item_id < 50));
        assert_eq!(
            mode.select(&history, &mut XorShiftRng::from_seed([5; 16])),
            sampled
        );
        assert_eq!(
            mode.select(&history[..4], &mut XorShiftRng::from_seed([5; 16])),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn bounds() {
        let bounds = Bounds::new(1.0, 5.0).unwrap();

        assert_eq!(bounds.clamp(7.0), 5.0);
        assert_eq!(bounds.clamp(-1.0), 1.0);
        assert_eq!(bounds.clamp(3.5), 3.5);
        assert!(Bounds::new(5.0, 1.0).is_err());
        assert!(Bounds::new(std::f32::NAN, 1.0).is_err());
    }

    #[test]
    fn hidden_units() {
        assert_eq!(parse_hidden_units("128, 64,32"), Ok(vec![128, 64, 32]));
        assert!(parse_hidden_units("128,x").is_err());
        assert!(parse_hidden_units("0").is_err());
    }
}
