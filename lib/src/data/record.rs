use std::{fs::File, io, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{error::DataError, model::INPUT_DIMENSION};

/// Sentinel for a missing measurement.
pub const MISSING_VALUE: f64 = -999.0;

/// Predictors followed by the target.
pub const NUM_COLUMNS: usize = INPUT_DIMENSION + 1;

pub const COLUMNS: [&str; NUM_COLUMNS] = [
  "area",
  "base_flow_index",
  "flood_attenuation",
  "flood_plain_extent",
  "longest_drainage_path",
  "proportion_wet_days",
  "median_annual_max_rainfall",
  "standard_annual_average_rainfall",
  "index_flood",
];

/// Index of the target column in [`CatchmentRecord::values`].
pub const TARGET_COLUMN: usize = INPUT_DIMENSION;

/// Measurements for one catchment, in original units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatchmentRecord {
  pub area: f64,
  pub base_flow_index: f64,
  pub flood_attenuation: f64,
  pub flood_plain_extent: f64,
  pub longest_drainage_path: f64,
  pub proportion_wet_days: f64,
  /// Median annual maximum 1-day rainfall.
  pub median_annual_max_rainfall: f64,
  pub standard_annual_average_rainfall: f64,
  pub index_flood: f64,
}

impl CatchmentRecord {
  pub fn from_values(values: [f64; NUM_COLUMNS]) -> Self {
    let [area, base_flow_index, flood_attenuation, flood_plain_extent, longest_drainage_path, proportion_wet_days, median_annual_max_rainfall, standard_annual_average_rainfall, index_flood] =
      values;
    Self {
      area,
      base_flow_index,
      flood_attenuation,
      flood_plain_extent,
      longest_drainage_path,
      proportion_wet_days,
      median_annual_max_rainfall,
      standard_annual_average_rainfall,
      index_flood,
    }
  }

  /// All columns in [`COLUMNS`] order.
  pub fn values(&self) -> [f64; NUM_COLUMNS] {
    [
      self.area,
      self.base_flow_index,
      self.flood_attenuation,
      self.flood_plain_extent,
      self.longest_drainage_path,
      self.proportion_wet_days,
      self.median_annual_max_rainfall,
      self.standard_annual_average_rainfall,
      self.index_flood,
    ]
  }
}

/// `None` for short rows, non-numeric fields and missing-value sentinels.
pub fn parse_row(row: &csv::StringRecord) -> Option<CatchmentRecord> {
  if row.len() < NUM_COLUMNS {
    return None;
  }
  let mut values = [0.0; NUM_COLUMNS];
  for (value, field) in values.iter_mut().zip(row.iter()) {
    let parsed: f64 = field.parse().ok()?;
    if !parsed.is_finite() || parsed == MISSING_VALUE {
      return None;
    }
    *value = parsed;
  }
  Some(CatchmentRecord::from_values(values))
}

/// Reads comma separated rows. Header lines fail to parse and are skipped like any
/// other unusable row.
pub fn parse_records<R: io::Read>(reader: R) -> Result<Vec<CatchmentRecord>, DataError> {
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(false)
    .flexible(true)
    .trim(csv::Trim::All)
    .from_reader(reader);

  let mut records = Vec::new();
  let mut skipped = 0;
  for (line, row) in reader.records().enumerate() {
    let row = row?;
    match parse_row(&row) {
      Some(record) => records.push(record),
      None => {
        debug!(line = line + 1, ?row, "skipping row");
        skipped += 1;
      }
    }
  }
  if skipped > 0 {
    warn!(skipped, kept = records.len(), "skipped unusable rows");
  }
  Ok(records)
}

pub fn read_dataset(path: &Path) -> Result<Vec<CatchmentRecord>, DataError> {
  let records = parse_records(File::open(path)?)?;
  info!(path = %path.display(), records = records.len(), "read dataset");
  Ok(records)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn skips_header_sentinels_and_garbage() {
    let csv = "\
AREA,BFIHOST,FARL,FPEXT,LDP,PROPWET,RMED-1D,SAAR,Index flood
1.0, 0.5, 0.9, 0.1, 10.0, 0.4, 30.0, 700.0, 12.0
2.0,-999,0.9,0.1,10.0,0.4,30.0,700.0,12.0
3.0,0.5,abc,0.1,10.0,0.4,30.0,700.0,12.0
4.0,0.5,0.9
5.0,0.6,0.8,0.2,11.0,0.5,31.0,710.0,13.0,extra
";
    let records = parse_records(csv.as_bytes()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].area, 1.0);
    assert_eq!(records[0].index_flood, 12.0);
    assert_eq!(records[1].values()[0], 5.0);
    assert_eq!(records[1].standard_annual_average_rainfall, 710.0);
  }

  #[test]
  fn values_follow_column_order() {
    let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
    let record = CatchmentRecord::from_values(values);
    assert_eq!(record.values(), values);
    assert_eq!(record.values()[TARGET_COLUMN], record.index_flood);
    assert_eq!(COLUMNS[TARGET_COLUMN], "index_flood");
  }

  #[test]
  fn missing_file_is_an_io_error() {
    let result = read_dataset(Path::new("/nonexistent/floodnet/data.csv"));
    assert!(matches!(result, Err(DataError::Io(_))));
  }
}
