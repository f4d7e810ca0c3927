use std::path::{Path, PathBuf};

use tracing::info;

use crate::{
  data::PreparedData,
  error::Result,
  sweep::{run_sweep, SweepGrid, SweepResult},
  utils::write_rows,
};

pub struct Sweep {
  grid: SweepGrid,
  dataset_path: PathBuf,
  output_path: PathBuf,
}

impl Sweep {
  pub fn new(dataset_path: &Path, output_path: &Path, grid: SweepGrid) -> Self {
    Self {
      grid,
      dataset_path: PathBuf::from(dataset_path),
      output_path: PathBuf::from(output_path),
    }
  }

  pub fn run(self) -> Result<Vec<SweepResult>> {
    let data = PreparedData::load(&self.dataset_path)?;
    let results = run_sweep(&data, &self.grid)?;
    write_rows(&self.output_path, &results)?;

    if let Some(best) = results
      .iter()
      .filter(|r| r.mean_test_rmse.is_finite())
      .min_by(|a, b| a.mean_test_rmse.total_cmp(&b.mean_test_rmse))
    {
      info!(
        hidden = best.hidden,
        learning_rate = best.learning_rate,
        activation = %best.activation,
        improvements = %best.improvements,
        mean_test_rmse = best.mean_test_rmse,
        "best configuration"
      );
    }
    info!(
      configurations = results.len(),
      diverged = results.iter().map(|r| r.failed_runs).sum::<usize>(),
      output = %self.output_path.display(),
      "sweep written"
    );
    Ok(results)
  }
}
