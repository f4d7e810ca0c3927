use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  data::{NormalizationStats, PreparedData, TestReport},
  error::Result,
  model::{Predictor, Trainer, TrainerConfig, TrainingDiagnostics},
  utils::{serialize_to_file, write_predictions, write_series},
};

pub const VALIDATION_RMSE_FILE: &str = "validation_rmse.csv";
pub const TRAINING_RMSE_FILE: &str = "training_rmse.csv";
pub const LEARNING_RATE_FILE: &str = "learning_rate.csv";
pub const PREDICTIONS_FILE: &str = "predictions.csv";
pub const MODEL_FILE: &str = "model.json";

/// Everything needed to predict in original units, as written to [`MODEL_FILE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
  pub config: TrainerConfig,
  pub predictor: Predictor,
  pub stats: NormalizationStats,
}

pub struct TrainOutcome {
  pub diagnostics: TrainingDiagnostics,
  pub test: TestReport,
  pub model: TrainedModel,
}

pub struct Train {
  config: TrainerConfig,
  dataset_path: PathBuf,
  output_dir: PathBuf,
}

impl Train {
  pub fn new(dataset_path: &Path, output_dir: &Path, config: TrainerConfig) -> Self {
    Self {
      config,
      dataset_path: PathBuf::from(dataset_path),
      output_dir: PathBuf::from(output_dir),
    }
  }

  pub fn run(self) -> Result<TrainOutcome> {
    let data = PreparedData::load(&self.dataset_path)?;
    let mut trainer = Trainer::new(self.config.clone())?;
    let diagnostics = trainer.train(&data.training, &data.validation)?;

    let test = data.score(trainer.predictor())?;
    info!(test_rmse = test.rmse, "testing complete");

    let model = TrainedModel {
      config: self.config,
      predictor: trainer.into_predictor(),
      stats: data.stats,
    };

    let dir = &self.output_dir;
    std::fs::create_dir_all(dir)?;
    write_series(&dir.join(VALIDATION_RMSE_FILE), "rmse", &diagnostics.validation_rmse)?;
    write_series(&dir.join(TRAINING_RMSE_FILE), "rmse", &diagnostics.training_rmse)?;
    write_series(&dir.join(LEARNING_RATE_FILE), "learning_rate", &diagnostics.learning_rate)?;
    write_predictions(&dir.join(PREDICTIONS_FILE), &test.pairs)?;
    serialize_to_file(&dir.join(MODEL_FILE), &model)?;
    info!(output = %dir.display(), "wrote results");

    Ok(TrainOutcome {
      diagnostics,
      test,
      model,
    })
  }
}
