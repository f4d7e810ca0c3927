use serde::{Deserialize, Serialize};

use super::{rmse, Activation, NetworkParameters, Sample};
use crate::error::TrainError;

/// Forward-only view of trained parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictor {
  pub activation: Activation,
  pub parameters: NetworkParameters,
}

impl Predictor {
  pub fn new(activation: Activation, parameters: NetworkParameters) -> Self {
    Self {
      activation,
      parameters,
    }
  }

  /// Rejects inputs whose width differs from the network's input layer.
  pub fn check_width(&self, inputs: &[f64]) -> Result<(), TrainError> {
    let expected = self.parameters.num_inputs();
    if inputs.len() == expected {
      Ok(())
    } else {
      Err(TrainError::SampleWidth {
        expected,
        found: inputs.len(),
      })
    }
  }

  /// Network output for standardized predictors, on the standardized target scale.
  pub fn predict(&self, inputs: &[f64]) -> Result<f64, TrainError> {
    self.check_width(inputs)?;
    Ok(self.parameters.forward(self.activation, inputs).1)
  }

  /// RMSE over `samples` on the standardized scale.
  pub fn evaluate(&self, samples: &[Sample]) -> Result<f64, TrainError> {
    for sample in samples {
      self.check_width(&sample.inputs)?;
    }
    Ok(self.rmse_unchecked(samples))
  }

  /// [`evaluate`](Self::evaluate) for samples whose width is already known to match.
  pub(crate) fn rmse_unchecked(&self, samples: &[Sample]) -> f64 {
    let mut hidden = vec![0.0; self.parameters.num_hidden()];
    rmse(samples.iter().map(|s| {
      let output = self
        .parameters
        .forward_into(self.activation, &s.inputs, &mut hidden);
      (s.target, output)
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn constant_network(output_bias: f64) -> Predictor {
    Predictor::new(
      Activation::LeakyRelu,
      NetworkParameters {
        input_to_hidden: vec![vec![0.0], vec![0.0]],
        hidden_biases: vec![0.0],
        hidden_to_output: vec![0.0],
        output_bias,
      },
    )
  }

  #[test]
  fn predicts_bias_when_weights_are_zero() {
    let p = constant_network(0.3);
    assert_eq!(p.predict(&[0.7, 0.2]), Ok(0.3));
  }

  #[test]
  fn evaluate_is_root_mean_squared_error() {
    let p = constant_network(0.5);
    let samples = vec![Sample::new(vec![0.1, 0.1], 0.2), Sample::new(vec![0.9, 0.9], 0.9)];
    let expected = ((0.3f64.powi(2) + 0.4f64.powi(2)) / 2.0).sqrt();
    assert!((p.evaluate(&samples).unwrap() - expected).abs() < 1e-12);
  }

  #[test]
  fn rejects_short_and_long_inputs() {
    let p = constant_network(0.3);
    assert_eq!(
      p.predict(&[0.5]),
      Err(TrainError::SampleWidth { expected: 2, found: 1 })
    );
    assert_eq!(
      p.predict(&[0.5; 20]),
      Err(TrainError::SampleWidth { expected: 2, found: 20 })
    );
    let samples = vec![Sample::new(vec![0.1, 0.1], 0.2), Sample::new(vec![0.9], 0.9)];
    assert_eq!(
      p.evaluate(&samples),
      Err(TrainError::SampleWidth { expected: 2, found: 1 })
    );
  }

  #[test]
  fn round_trips_through_json() {
    let p = constant_network(0.25);
    let json = serde_json::to_string(&p).unwrap();
    let back: Predictor = serde_json::from_str(&json).unwrap();
    assert_eq!(back, p);
  }
}
