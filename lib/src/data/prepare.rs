use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{read_dataset, CatchmentRecord, COLUMNS, NUM_COLUMNS, TARGET_COLUMN};
use crate::{
  error::{DataError, TrainError},
  model::{rmse, Predictor, Sample, INPUT_DIMENSION},
};

/// Standard deviations from the column mean beyond which a record is dropped.
pub const OUTLIER_SIGMA: f64 = 4.0;

const TRAINING_FRACTION: f64 = 0.6;
const HOLDOUT_FRACTION: f64 = 0.2;
const TEST_OFFSET: f64 = 0.8;

/// Smallest record count for which every split is non-empty.
pub const MIN_RECORDS: usize = 5;

/// Lower and upper end of the standardized range.
const SCALE_LOW: f64 = 0.1;
const SCALE_SPAN: f64 = 0.8;

/// Per-column mean and population standard deviation.
pub fn column_moments(records: &[CatchmentRecord]) -> ([f64; NUM_COLUMNS], [f64; NUM_COLUMNS]) {
  let n = records.len() as f64;
  let mut mean = [0.0; NUM_COLUMNS];
  for record in records {
    for (m, v) in mean.iter_mut().zip(record.values()) {
      *m += v;
    }
  }
  mean.iter_mut().for_each(|m| *m /= n);

  let mut std_dev = [0.0; NUM_COLUMNS];
  for record in records {
    for ((s, v), m) in std_dev.iter_mut().zip(record.values()).zip(&mean) {
      *s += (v - m).powi(2);
    }
  }
  std_dev.iter_mut().for_each(|s| *s = (*s / n).sqrt());
  (mean, std_dev)
}

/// Drops every record with any column outside `mean ± k·σ`, moments taken over all
/// records. Order of the survivors is kept.
pub fn remove_outliers(records: Vec<CatchmentRecord>, k: f64) -> Vec<CatchmentRecord> {
  if records.is_empty() {
    return records;
  }
  let (mean, std_dev) = column_moments(&records);
  let before = records.len();
  let kept: Vec<CatchmentRecord> = records
    .into_iter()
    .filter(|record| {
      record
        .values()
        .iter()
        .zip(mean.iter().zip(&std_dev))
        .all(|(v, (m, s))| *v <= m + k * s && *v >= m - k * s)
    })
    .collect();
  info!(removed = before - kept.len(), remaining = kept.len(), "removed outliers");
  kept
}

/// Ordered, non-shuffled partition of the records.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
  pub training: Vec<CatchmentRecord>,
  pub validation: Vec<CatchmentRecord>,
  pub test: Vec<CatchmentRecord>,
}

/// 60/20/20 by position. Sizes are floored, so up to two trailing records belong to
/// no subset.
pub fn split(records: &[CatchmentRecord]) -> Split {
  let n = records.len() as f64;
  let training_end = (n * TRAINING_FRACTION) as usize;
  let holdout = (n * HOLDOUT_FRACTION) as usize;
  let test_start = (n * TEST_OFFSET) as usize;
  Split {
    training: records[..training_end].to_vec(),
    validation: records[training_end..training_end + holdout].to_vec(),
    test: records[test_start..test_start + holdout].to_vec(),
  }
}

/// Column ranges from the training and validation records. The test records never
/// contribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
  pub min: [f64; NUM_COLUMNS],
  pub max: [f64; NUM_COLUMNS],
}

impl NormalizationStats {
  pub fn from_records<'a, I>(records: I) -> Result<Self, DataError>
  where
    I: IntoIterator<Item = &'a CatchmentRecord>,
  {
    let mut min = [f64::INFINITY; NUM_COLUMNS];
    let mut max = [f64::NEG_INFINITY; NUM_COLUMNS];
    for record in records {
      for (column, v) in record.values().into_iter().enumerate() {
        min[column] = min[column].min(v);
        max[column] = max[column].max(v);
      }
    }
    for column in 0..NUM_COLUMNS {
      if !(max[column] > min[column]) {
        return Err(DataError::ConstantColumn {
          column: COLUMNS[column],
        });
      }
    }
    Ok(Self { min, max })
  }

  pub fn standardize(&self, column: usize, x: f64) -> f64 {
    SCALE_SPAN * (x - self.min[column]) / (self.max[column] - self.min[column]) + SCALE_LOW
  }

  pub fn destandardize(&self, column: usize, y: f64) -> f64 {
    ((y - SCALE_LOW) / SCALE_SPAN) * (self.max[column] - self.min[column]) + self.min[column]
  }

  pub fn destandardize_target(&self, y: f64) -> f64 {
    self.destandardize(TARGET_COLUMN, y)
  }

  pub fn standardize_inputs(&self, predictors: &[f64]) -> Vec<f64> {
    predictors
      .iter()
      .enumerate()
      .map(|(column, x)| self.standardize(column, *x))
      .collect()
  }

  pub fn sample(&self, record: &CatchmentRecord) -> Sample {
    let values = record.values();
    Sample::new(
      self.standardize_inputs(&values[..INPUT_DIMENSION]),
      self.standardize(TARGET_COLUMN, values[TARGET_COLUMN]),
    )
  }
}

/// Test-set predictions in original units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReport {
  /// `(expected, predicted)` per test record.
  pub pairs: Vec<(f64, f64)>,
  pub rmse: f64,
}

/// Standardized subsets ready for training.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedData {
  pub training: Vec<Sample>,
  pub validation: Vec<Sample>,
  pub test: Vec<Sample>,
  pub stats: NormalizationStats,
}

impl PreparedData {
  /// Outlier removal, split, then standardization with stats from training and
  /// validation.
  pub fn from_records(records: Vec<CatchmentRecord>) -> Result<Self, DataError> {
    let records = remove_outliers(records, OUTLIER_SIGMA);
    if records.len() < MIN_RECORDS {
      return Err(DataError::TooFewRecords {
        found: records.len(),
        needed: MIN_RECORDS,
      });
    }
    let split = split(&records);
    let stats = NormalizationStats::from_records(split.training.iter().chain(&split.validation))?;
    let standardize = |subset: &[CatchmentRecord]| subset.iter().map(|r| stats.sample(r)).collect::<Vec<_>>();
    let prepared = Self {
      training: standardize(&split.training),
      validation: standardize(&split.validation),
      test: standardize(&split.test),
      stats,
    };
    info!(
      training = prepared.training.len(),
      validation = prepared.validation.len(),
      test = prepared.test.len(),
      "prepared data"
    );
    Ok(prepared)
  }

  pub fn load(path: &Path) -> Result<Self, DataError> {
    Self::from_records(read_dataset(path)?)
  }

  /// Predicts every test sample and compares in original units.
  pub fn score(&self, predictor: &Predictor) -> Result<TestReport, TrainError> {
    let pairs = self
      .test
      .iter()
      .map(|s| {
        let predicted = predictor.predict(&s.inputs)?;
        Ok((
          self.stats.destandardize_target(s.target),
          self.stats.destandardize_target(predicted),
        ))
      })
      .collect::<Result<Vec<(f64, f64)>, TrainError>>()?;
    let rmse = rmse(pairs.iter().copied());
    Ok(TestReport { pairs, rmse })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn record(i: usize) -> CatchmentRecord {
    let x = i as f64;
    CatchmentRecord::from_values([x, x * 2.0, x + 1.0, x * 0.5, x * 3.0, x + 2.0, x * 4.0, x + 3.0, x * 5.0])
  }

  #[test]
  fn split_uses_floored_offsets() {
    let records: Vec<_> = (0..12).map(record).collect();
    let split = split(&records);
    // 7 / 2 / 2 starting at 0, 7 and 9
    assert_eq!(split.training, records[..7].to_vec());
    assert_eq!(split.validation, records[7..9].to_vec());
    assert_eq!(split.test, records[9..11].to_vec());
  }

  #[test]
  fn outliers_are_dropped_on_any_column() {
    let mut records: Vec<_> = (0..40).map(|_| record(1)).collect();
    records.extend((0..40).map(|_| record(2)));
    let mut odd = record(1);
    odd.flood_plain_extent = 1_000.0;
    records.insert(10, odd);

    let kept = remove_outliers(records.clone(), OUTLIER_SIGMA);
    assert_eq!(kept.len(), 80);
    assert!(kept.iter().all(|r| r.flood_plain_extent < 10.0));
  }

  #[test]
  fn constant_column_is_rejected() {
    let records: Vec<_> = (0..5)
      .map(|i| CatchmentRecord {
        proportion_wet_days: 0.3,
        ..record(i)
      })
      .collect();
    assert!(matches!(
      NormalizationStats::from_records(&records),
      Err(DataError::ConstantColumn {
        column: "proportion_wet_days"
      })
    ));
  }

  #[test]
  fn too_few_records_is_rejected() {
    let records: Vec<_> = (0..4).map(record).collect();
    assert!(matches!(
      PreparedData::from_records(records),
      Err(DataError::TooFewRecords { found: 4, needed: 5 })
    ));
  }

  #[test]
  fn stats_ignore_test_records() {
    let records: Vec<_> = (0..10).map(record).collect();
    let prepared = PreparedData::from_records(records).unwrap();
    assert_eq!(prepared.stats.min[0], 0.0);
    assert_eq!(prepared.stats.max[0], 7.0);
    assert_eq!(prepared.training.len(), 6);
    assert_eq!(prepared.validation.len(), 2);
    assert_eq!(prepared.test.len(), 2);
    // test records lie beyond the training range
    assert!(prepared.test.iter().all(|s| s.inputs[0] > 0.9));
    assert!(prepared.training.iter().chain(&prepared.validation).all(|s| {
      s.inputs.iter().all(|x| (0.1 - 1e-12..=0.9 + 1e-12).contains(x))
    }));
  }

  #[test]
  fn test_targets_map_back_to_original_units() {
    let records: Vec<_> = (0..10).map(record).collect();
    let prepared = PreparedData::from_records(records.clone()).unwrap();
    assert!((prepared.stats.destandardize_target(prepared.test[0].target) - records[8].index_flood).abs() < 1e-9);
  }

  proptest! {
    #[test]
    fn standardize_inverts(x in -1e4f64..1e4, lo in -100.0f64..100.0, width in 0.1f64..1e3) {
      let mut min = [0.0; NUM_COLUMNS];
      let mut max = [1.0; NUM_COLUMNS];
      min[TARGET_COLUMN] = lo;
      max[TARGET_COLUMN] = lo + width;
      let stats = NormalizationStats { min, max };
      let y = stats.standardize(TARGET_COLUMN, x);
      let back = stats.destandardize_target(y);
      prop_assert!((back - x).abs() <= 1e-9 * (1.0 + x.abs()));
    }
  }
}
