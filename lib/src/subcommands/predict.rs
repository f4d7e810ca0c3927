use std::path::{Path, PathBuf};

use tracing::info;

use super::TrainedModel;
use crate::{
  data::{read_dataset, TestReport},
  error::{Result, TrainError},
  model::rmse,
  utils::{deserialize_from_file, write_predictions},
};

/// Scores a saved model against a catchment file, reusing the stats it was trained with.
pub struct Predict {
  model: TrainedModel,
  input_path: PathBuf,
  output_path: PathBuf,
}

impl Predict {
  pub fn new(model_path: &Path, input_path: &Path, output_path: &Path) -> Result<Self> {
    Ok(Self {
      model: deserialize_from_file(model_path)?,
      input_path: PathBuf::from(input_path),
      output_path: PathBuf::from(output_path),
    })
  }

  pub fn run(self) -> Result<TestReport> {
    let stats = &self.model.stats;
    let pairs = read_dataset(&self.input_path)?
      .iter()
      .map(|record| {
        let sample = stats.sample(record);
        let predicted = self.model.predictor.predict(&sample.inputs)?;
        Ok((record.index_flood, stats.destandardize_target(predicted)))
      })
      .collect::<std::result::Result<Vec<(f64, f64)>, TrainError>>()?;
    let report = TestReport {
      rmse: rmse(pairs.iter().copied()),
      pairs,
    };
    write_predictions(&self.output_path, &report.pairs)?;
    info!(records = report.pairs.len(), rmse = report.rmse, "predictions written");
    Ok(report)
  }
}
