use itertools::iproduct;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
  data::PreparedData,
  error::{Error, TrainError},
  model::{Activation, Improvement, ImprovementSet, Trainer, TrainerConfig, INPUT_DIMENSION},
};

/// Configurations evaluated by [`run_sweep`].
#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
  pub hidden: Vec<usize>,
  pub learning_rates: Vec<f64>,
  pub activations: Vec<Activation>,
  pub improvement_sets: Vec<ImprovementSet>,
  pub epoch_budget: usize,
  /// Independent runs per configuration, each from fresh random weights.
  pub repeats: usize,
  pub seed: Option<u64>,
}

impl Default for SweepGrid {
  fn default() -> Self {
    let annealing = ImprovementSet::none().with(Improvement::Annealing);
    Self {
      hidden: (4..=16).collect(),
      learning_rates: (1..10).map(|k| k as f64 * 0.05).collect(),
      activations: Activation::ALL.to_vec(),
      improvement_sets: vec![annealing, annealing.with(Improvement::Momentum)],
      epoch_budget: 10_000,
      repeats: 3,
      seed: None,
    }
  }
}

impl SweepGrid {
  pub fn len(&self) -> usize {
    self.hidden.len() * self.learning_rates.len() * self.activations.len() * self.improvement_sets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// One row of the sweep report. RMSE values are in original units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepResult {
  pub hidden: usize,
  pub learning_rate: f64,
  pub activation: Activation,
  pub improvements: String,
  pub mean_test_rmse: f64,
  pub best_test_rmse: f64,
  pub failed_runs: usize,
}

#[instrument(level = "info", skip_all, fields(configurations = grid.len(), repeats = grid.repeats))]
pub fn run_sweep(data: &PreparedData, grid: &SweepGrid) -> Result<Vec<SweepResult>, Error> {
  let mut seeds = match grid.seed {
    Some(seed) => StdRng::seed_from_u64(seed),
    None => StdRng::from_entropy(),
  };
  let mut results = Vec::with_capacity(grid.len());

  for (&hidden, &learning_rate, &activation, &improvements) in iproduct!(
    &grid.hidden,
    &grid.learning_rates,
    &grid.activations,
    &grid.improvement_sets
  ) {
    let mut rmses = Vec::with_capacity(grid.repeats);
    let mut failed_runs = 0;
    for repeat in 0..grid.repeats {
      let config = TrainerConfig::new(
        INPUT_DIMENSION,
        hidden,
        learning_rate,
        activation,
        improvements,
        grid.epoch_budget,
      )
      .with_seed(seeds.gen());
      let mut trainer = Trainer::new(config)?;
      match trainer.train(&data.training, &data.validation) {
        Ok(_) => rmses.push(data.score(trainer.predictor())?.rmse),
        Err(TrainError::NonFinite { epoch }) => {
          warn!(hidden, learning_rate, %activation, %improvements, repeat, epoch, "run diverged");
          failed_runs += 1;
        }
        Err(e) => return Err(e.into()),
      }
    }

    let mean_test_rmse = rmses.iter().sum::<f64>() / rmses.len() as f64;
    let best_test_rmse = rmses.iter().copied().fold(f64::NAN, f64::min);
    info!(
      hidden,
      learning_rate,
      %activation,
      %improvements,
      mean_test_rmse,
      "configuration done"
    );
    results.push(SweepResult {
      hidden,
      learning_rate,
      activation,
      improvements: improvements.to_string(),
      mean_test_rmse,
      best_test_rmse,
      failed_runs,
    });
  }
  Ok(results)
}
