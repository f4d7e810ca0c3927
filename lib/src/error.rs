use thiserror::Error;

/// Rejected trainer configuration, reported before any weights are drawn.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
  #[error("{layer} layer must have at least one unit")]
  EmptyLayer { layer: &'static str },
  #[error("learning rate must be positive and finite, got {0}")]
  InvalidLearningRate(f64),
  #[error("mini-batch size must be at least 1")]
  InvalidBatchSize,
  #[error("momentum term must be finite and non-negative, got {0}")]
  InvalidMomentum(f64),
  #[error("annealing needs a fixed epoch budget to anneal over")]
  AnnealingWithoutBudget,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrainError {
  #[error("training set is empty")]
  EmptyTrainingSet,
  #[error("validation set is empty")]
  EmptyValidationSet,
  #[error("sample has {found} predictors, network expects {expected}")]
  SampleWidth { expected: usize, found: usize },
  #[error("validation error became non-finite at epoch {epoch}")]
  NonFinite { epoch: usize },
}

#[derive(Debug, Error)]
pub enum DataError {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),
  #[error("csv: {0}")]
  Csv(#[from] csv::Error),
  #[error("need at least {needed} usable records, found {found}")]
  TooFewRecords { found: usize, needed: usize },
  #[error("column {column} has the same value in every record")]
  ConstantColumn { column: &'static str },
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Train(#[from] TrainError),
  #[error(transparent)]
  Data(#[from] DataError),
  #[error("io: {0}")]
  Io(#[from] std::io::Error),
  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
  #[error("csv: {0}")]
  Csv(#[from] csv::Error),
}

/// An activation or improvement name that is not recognised.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("unknown {kind} `{value}`")]
pub struct ParseError {
  kind: &'static str,
  value: String,
}

impl ParseError {
  pub fn new(kind: &'static str, value: &str) -> Self {
    Self {
      kind,
      value: value.to_string(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
