use std::{
  error::Error,
  path::{Path, PathBuf},
};

use floodnet::model::{
  Activation, Improvement, ImprovementSet, TrainerConfig, DEFAULT_BATCH_SIZE, DEFAULT_MOMENTUM,
  INPUT_DIMENSION,
};
use serde::Deserialize;

pub const DEFAULT_HIDDEN: usize = 8;
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;
pub const DEFAULT_OUTPUT_DIR: &str = "results";

/// Training settings. Also defines the config file format (Option fields can be omitted).
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
  pub hidden: Option<usize>,
  pub learning_rate: Option<f64>,
  pub activation: Option<Activation>,
  pub improvements: Option<Vec<Improvement>>,
  /// 0 trains until the validation error rises
  pub epochs: Option<usize>,
  pub batch_size: Option<usize>,
  pub momentum: Option<f64>,
  pub seed: Option<u64>,
  pub output: Option<PathBuf>,
  pub restore_best: Option<bool>,
}

impl AppConfig {
  pub fn from_file(path: &Path) -> Result<Self, Box<dyn Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
  }

  // merge configs where the second overwrites the first
  pub fn merge(self, other: Self) -> Self {
    Self {
      hidden: other.hidden.or(self.hidden),
      learning_rate: other.learning_rate.or(self.learning_rate),
      activation: other.activation.or(self.activation),
      improvements: other.improvements.or(self.improvements),
      epochs: other.epochs.or(self.epochs),
      batch_size: other.batch_size.or(self.batch_size),
      momentum: other.momentum.or(self.momentum),
      seed: other.seed.or(self.seed),
      output: other.output.or(self.output),
      restore_best: other.restore_best.or(self.restore_best),
    }
  }

  pub fn output_dir(&self) -> PathBuf {
    self
      .output
      .clone()
      .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
  }

  pub fn trainer_config(&self) -> TrainerConfig {
    let improvements: ImprovementSet = self.improvements.iter().flatten().copied().collect();
    let config = TrainerConfig::new(
      INPUT_DIMENSION,
      self.hidden.unwrap_or(DEFAULT_HIDDEN),
      self.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
      self.activation.unwrap_or(Activation::Sigmoid),
      improvements,
      self.epochs.unwrap_or(0),
    )
    .with_batch_size(self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE))
    .with_momentum(self.momentum.unwrap_or(DEFAULT_MOMENTUM))
    .with_restore_best(self.restore_best.unwrap_or(false));
    match self.seed {
      Some(seed) => config.with_seed(seed),
      None => config,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cli_values_override_file_values() {
    let file: AppConfig = serde_yaml::from_str(
      "hidden: 12\nlearning_rate: 0.3\nimprovements: [momentum, bold-driver]\nseed: 4\n",
    )
    .unwrap();
    let cli = AppConfig {
      learning_rate: Some(0.05),
      epochs: Some(2000),
      ..AppConfig::default()
    };
    let merged = AppConfig::default().merge(file).merge(cli);

    let config = merged.trainer_config();
    assert_eq!(config.num_hidden, 12);
    assert_eq!(config.learning_rate, 0.05);
    assert_eq!(config.epoch_budget, 2000);
    assert_eq!(config.seed, Some(4));
    assert!(config.improvements.momentum && config.improvements.bold_driver);
    assert!(!config.improvements.annealing);
  }

  #[test]
  fn defaults_fill_missing_values() {
    let config = AppConfig::default().trainer_config();
    assert_eq!(config.num_inputs, INPUT_DIMENSION);
    assert_eq!(config.num_hidden, DEFAULT_HIDDEN);
    assert_eq!(config.activation, Activation::Sigmoid);
    assert_eq!(config.improvements, ImprovementSet::none());
    assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    assert_eq!(config.epoch_budget, 0);
    assert!(!config.restore_best);
    assert_eq!(AppConfig::default().output_dir(), PathBuf::from(DEFAULT_OUTPUT_DIR));
  }

  #[test]
  fn unknown_keys_are_rejected() {
    assert!(serde_yaml::from_str::<AppConfig>("hiden: 3\n").is_err());
  }
}
