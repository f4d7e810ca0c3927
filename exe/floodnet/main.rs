mod app_config;

use app_config::AppConfig;
use floodnet::{
  model::{Activation, Improvement},
  subcommands,
  sweep::SweepGrid,
  utils,
};

use clap::{Args, Parser, Subcommand};
use std::{error::Error, path::PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(version, about = "Index flood regression with a single hidden layer network")]
struct Cli {
  /// Log every checkpoint
  #[arg(short, long, global = true)]
  verbose: bool,
  #[command(subcommand)]
  command: Command,
}

/// Flags that override the config file.
#[derive(Args)]
struct TrainingArgs {
  /// Hidden units
  #[arg(long, value_name = "INT")]
  hidden: Option<usize>,
  #[arg(short, long, value_name = "FLOAT")]
  learning_rate: Option<f64>,
  /// sigmoid, tanh or leaky-relu
  #[arg(short, long)]
  activation: Option<Activation>,
  /// Comma separated: momentum, bold-driver, annealing, mini-batch
  #[arg(short, long, value_delimiter = ',')]
  improvements: Option<Vec<Improvement>>,
  /// Epoch budget. 0 trains until the validation error rises
  #[arg(short, long, value_name = "INT")]
  epochs: Option<usize>,
  #[arg(long, value_name = "INT")]
  batch_size: Option<usize>,
  #[arg(long, value_name = "FLOAT")]
  momentum: Option<f64>,
  #[arg(long)]
  seed: Option<u64>,
  /// Keep the parameters of the best checkpoint when training stops on its own.
  /// Pass false to override a config file that enables it
  #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
  restore_best: Option<bool>,
  /// Output directory
  #[arg(short, long, value_name = "PATH")]
  output: Option<PathBuf>,
}

impl TrainingArgs {
  fn into_app_config(self) -> AppConfig {
    AppConfig {
      hidden: self.hidden,
      learning_rate: self.learning_rate,
      activation: self.activation,
      improvements: self.improvements,
      epochs: self.epochs,
      batch_size: self.batch_size,
      momentum: self.momentum,
      seed: self.seed,
      output: self.output,
      restore_best: self.restore_best,
    }
  }
}

#[derive(Subcommand)]
enum Command {
  /// Train one network and test it on the held-out records
  Train {
    /// Catchment CSV
    #[arg(short, long, value_name = "PATH")]
    data: PathBuf,
    /// YAML file with training settings
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(flatten)]
    args: TrainingArgs,
  },
  /// Train every configuration of the grid and report mean test RMSE
  Sweep {
    #[arg(short, long, value_name = "PATH")]
    data: PathBuf,
    #[arg(short, long, value_name = "PATH", default_value = "sweep.csv")]
    output: PathBuf,
    #[arg(short, long, value_name = "INT", default_value_t = 10_000)]
    epochs: usize,
    #[arg(short, long, value_name = "INT", default_value_t = 3)]
    repeats: usize,
    #[arg(long)]
    seed: Option<u64>,
  },
  /// Predict index flood with a saved model
  Predict {
    #[arg(short, long, value_name = "PATH")]
    model: PathBuf,
    #[arg(short, long, value_name = "PATH")]
    data: PathBuf,
    #[arg(short, long, value_name = "PATH", default_value = "predictions.csv")]
    output: PathBuf,
  },
}

fn main() -> Result<(), Box<dyn Error>> {
  let args = Cli::parse();
  utils::init_logging(args.verbose)?;

  match args.command {
    Command::Train { data, config, args } => {
      let file_config = match config {
        Some(path) => AppConfig::from_file(&path)?,
        None => AppConfig::default(),
      };
      let app_config = AppConfig::default()
        .merge(file_config)
        .merge(args.into_app_config());
      let app = subcommands::Train::new(
        &data,
        &app_config.output_dir(),
        app_config.trainer_config(),
      );
      let outcome = app.run()?;
      info!(
        epochs = outcome.diagnostics.epochs,
        stop_reason = ?outcome.diagnostics.stop_reason,
        test_rmse = outcome.test.rmse,
        "done"
      );
    }
    Command::Sweep {
      data,
      output,
      epochs,
      repeats,
      seed,
    } => {
      let grid = SweepGrid {
        epoch_budget: epochs,
        repeats,
        seed,
        ..SweepGrid::default()
      };
      let app = subcommands::Sweep::new(&data, &output, grid);
      app.run()?;
    }
    Command::Predict {
      model,
      data,
      output,
    } => {
      let app = subcommands::Predict::new(&model, &data, &output)?;
      let report = app.run()?;
      println!("{}", report.rmse);
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn training_args(extra: &[&str]) -> AppConfig {
    let argv = ["floodnet", "train", "--data", "catchments.csv"].iter().chain(extra);
    match Cli::try_parse_from(argv).unwrap().command {
      Command::Train { args, .. } => args.into_app_config(),
      _ => unreachable!(),
    }
  }

  #[test]
  fn restore_best_flag_overrides_file_in_both_directions() {
    let file = AppConfig {
      restore_best: Some(true),
      ..AppConfig::default()
    };
    let merged = AppConfig::default()
      .merge(file.clone())
      .merge(training_args(&["--restore-best", "false"]));
    assert!(!merged.trainer_config().restore_best);

    let merged = AppConfig::default().merge(file).merge(training_args(&[]));
    assert!(merged.trainer_config().restore_best);

    assert_eq!(training_args(&["--restore-best"]).restore_best, Some(true));
    assert_eq!(training_args(&[]).restore_best, None);
  }
}
