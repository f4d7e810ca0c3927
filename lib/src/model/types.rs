use serde::{Deserialize, Serialize};

/// Predictors per catchment record.
pub const INPUT_DIMENSION: usize = 8;

/// Full passes over the training set between two validation checkpoints.
pub const EPOCHS_PER_CHECKPOINT: usize = 500;

pub const DEFAULT_BATCH_SIZE: usize = 171;
pub const DEFAULT_MOMENTUM: f64 = 0.9;

/// Lowest learning rate annealing decays towards and bold driver may shrink to.
pub const LEARNING_RATE_FLOOR: f64 = 0.01;
/// Bold driver never grows the learning rate to this value or above.
pub const LEARNING_RATE_CEILING: f64 = 0.5;

/// One standardized row: predictors in roughly [0.1, 0.9] plus the target on the same scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
  pub inputs: Vec<f64>,
  pub target: f64,
}

impl Sample {
  pub fn new(inputs: Vec<f64>, target: f64) -> Self {
    Self { inputs, target }
  }
}

/// An ordered `(epoch, value)` series recorded once per checkpoint.
pub type Series = Vec<(usize, f64)>;

/// Root mean squared error of `(target, output)` pairs. NaN for an empty iterator.
pub fn rmse<I: IntoIterator<Item = (f64, f64)>>(pairs: I) -> f64 {
  let (sum, n) = pairs
    .into_iter()
    .fold((0.0, 0usize), |(sum, n), (t, o)| (sum + (t - o).powi(2), n + 1));
  (sum / n as f64).sqrt()
}
