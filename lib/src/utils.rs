use serde::Serialize;
use std::{fs::File, io::BufWriter, path::Path};

#[cfg(not(debug_assertions))]
use human_panic::setup_panic;
use tracing::subscriber::{self, DefaultGuard, SetGlobalDefaultError};

#[cfg(debug_assertions)]
extern crate better_panic;

use tracing_subscriber::fmt;

use crate::{error::Result, model::Series};

pub fn install_logger(verbose: bool) -> std::result::Result<(), SetGlobalDefaultError> {
  let level = if verbose {
    tracing::Level::DEBUG
  } else {
    tracing::Level::INFO
  };
  let subscriber = fmt().compact().with_max_level(level).finish();
  subscriber::set_global_default(subscriber)
}

pub fn init_logging(verbose: bool) -> std::result::Result<(), SetGlobalDefaultError> {
  // Human Panic. Only enabled when *not* debugging.
  #[cfg(not(debug_assertions))]
  {
    setup_panic!();
  }

  // Better Panic. Only enabled *when* debugging.
  #[cfg(debug_assertions)]
  {
    better_panic::Settings::debug()
      .most_recent_first(false)
      .lineno_suffix(true)
      .verbosity(better_panic::Verbosity::Full)
      .install();
  }

  install_logger(verbose)
}

/// Thread-local subscriber writing through the test harness. Keep the guard alive
/// for the duration of the test.
pub fn init_logging_tests() -> DefaultGuard {
  let subscriber = fmt()
    .compact()
    .with_max_level(tracing::Level::DEBUG)
    .with_test_writer()
    .finish();
  subscriber::set_default(subscriber)
}

pub fn serialize_to_file<T: Serialize>(path: &Path, obj: &T) -> Result<()> {
  let writer = BufWriter::new(File::create(path)?);
  serde_json::to_writer_pretty(writer, obj)?;
  Ok(())
}

pub fn deserialize_from_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
  let file = File::open(path)?;
  Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

/// Writes `epoch,<value_column>` rows.
pub fn write_series(path: &Path, value_column: &str, series: &Series) -> Result<()> {
  let mut writer = csv::Writer::from_path(path)?;
  writer.write_record(["epoch", value_column])?;
  for (epoch, value) in series {
    writer.write_record(&[epoch.to_string(), value.to_string()])?;
  }
  writer.flush()?;
  Ok(())
}

/// Writes `expected,predicted` rows.
pub fn write_predictions(path: &Path, pairs: &[(f64, f64)]) -> Result<()> {
  let mut writer = csv::Writer::from_path(path)?;
  writer.write_record(["expected", "predicted"])?;
  for (expected, predicted) in pairs {
    writer.write_record(&[expected.to_string(), predicted.to_string()])?;
  }
  writer.flush()?;
  Ok(())
}

/// Writes any serializable rows with a header derived from the field names.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
  let mut writer = csv::Writer::from_path(path)?;
  for row in rows {
    writer.serialize(row)?;
  }
  writer.flush()?;
  Ok(())
}
