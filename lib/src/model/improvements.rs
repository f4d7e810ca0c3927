use std::{fmt, str::FromStr};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::LEARNING_RATE_FLOOR;
use crate::error::ParseError;

/// Learning rate multiplier applied when bold driver rolls back an update.
pub const BOLD_DRIVER_SHRINK: f64 = 0.7;
/// Learning rate multiplier applied when validation error did not increase.
pub const BOLD_DRIVER_GROW: f64 = 1.05;
/// Validation error increase, in percent, above which bold driver rolls back instead of stopping.
pub const BOLD_DRIVER_TOLERANCE_PERCENT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Improvement {
  Momentum,
  BoldDriver,
  Annealing,
  MiniBatch,
}

impl Improvement {
  pub const ALL: [Improvement; 4] = [
    Improvement::Momentum,
    Improvement::BoldDriver,
    Improvement::Annealing,
    Improvement::MiniBatch,
  ];
}

impl fmt::Display for Improvement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Improvement::Momentum => "momentum",
      Improvement::BoldDriver => "bold-driver",
      Improvement::Annealing => "annealing",
      Improvement::MiniBatch => "mini-batch",
    };
    f.write_str(name)
  }
}

impl FromStr for Improvement {
  type Err = ParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
      "momentum" => Ok(Improvement::Momentum),
      "bold-driver" => Ok(Improvement::BoldDriver),
      "annealing" => Ok(Improvement::Annealing),
      "mini-batch" | "batch" => Ok(Improvement::MiniBatch),
      other => Err(ParseError::new("improvement", other)),
    }
  }
}

/// Independent switches consumed by the update rule and the checkpoint logic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ImprovementSet {
  pub momentum: bool,
  pub bold_driver: bool,
  pub annealing: bool,
  pub mini_batch: bool,
}

impl ImprovementSet {
  pub fn none() -> Self {
    Self::default()
  }

  pub fn with(mut self, improvement: Improvement) -> Self {
    *self.flag_mut(improvement) = true;
    self
  }

  pub fn contains(&self, improvement: Improvement) -> bool {
    match improvement {
      Improvement::Momentum => self.momentum,
      Improvement::BoldDriver => self.bold_driver,
      Improvement::Annealing => self.annealing,
      Improvement::MiniBatch => self.mini_batch,
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = Improvement> + '_ {
    Improvement::ALL.into_iter().filter(move |i| self.contains(*i))
  }

  fn flag_mut(&mut self, improvement: Improvement) -> &mut bool {
    match improvement {
      Improvement::Momentum => &mut self.momentum,
      Improvement::BoldDriver => &mut self.bold_driver,
      Improvement::Annealing => &mut self.annealing,
      Improvement::MiniBatch => &mut self.mini_batch,
    }
  }
}

impl FromIterator<Improvement> for ImprovementSet {
  fn from_iter<T: IntoIterator<Item = Improvement>>(iter: T) -> Self {
    iter.into_iter().fold(Self::none(), Self::with)
  }
}

impl fmt::Display for ImprovementSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.iter().next().is_none() {
      f.write_str("none")
    } else {
      write!(f, "{}", self.iter().join("+"))
    }
  }
}

/// Sigmoid-shaped decay from `start` towards [`LEARNING_RATE_FLOOR`] over `budget` epochs.
///
/// `floor + (start - floor) * (1 - 1 / (1 + e^(10 - 20 * epoch / budget)))`
pub fn annealed_learning_rate(start: f64, epoch: usize, budget: usize) -> f64 {
  let progress = epoch as f64 / budget as f64;
  let decay = 1.0 - 1.0 / (1.0 + (10.0 - 20.0 * progress).exp());
  LEARNING_RATE_FLOOR + (start - LEARNING_RATE_FLOOR) * decay
}
