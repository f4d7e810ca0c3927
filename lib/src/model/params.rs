use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Activation;
use crate::error::ConfigError;

/// Weights and biases of a network with one hidden layer and a single output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkParameters {
  /// `input_to_hidden[i][h]` weights the edge from input `i` to hidden unit `h`.
  pub input_to_hidden: Vec<Vec<f64>>,
  pub hidden_biases: Vec<f64>,
  pub hidden_to_output: Vec<f64>,
  pub output_bias: f64,
}

/// Saved copy of a full parameter set, see [`NetworkParameters::restore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(NetworkParameters);

/// Intermediate values of one forward and backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardState {
  pub hidden_outputs: Vec<f64>,
  pub hidden_deltas: Vec<f64>,
  pub output: f64,
  pub output_delta: f64,
}

impl ForwardState {
  pub fn new(num_hidden: usize) -> Self {
    Self {
      hidden_outputs: vec![0.0; num_hidden],
      hidden_deltas: vec![0.0; num_hidden],
      output: 0.0,
      output_delta: 0.0,
    }
  }
}

/// Half-width of the uniform initialization interval for a unit with `fan_in` upstream units.
pub fn init_bound(fan_in: usize) -> f64 {
  2.0 / fan_in as f64
}

impl NetworkParameters {
  /// Draws every weight and bias uniformly from `[-2/fan_in, 2/fan_in]`.
  /// Input-to-hidden weights and hidden biases use `num_inputs` as fan-in,
  /// hidden-to-output weights and the output bias use `num_hidden`.
  pub fn initialize_random<R: Rng + ?Sized>(
    num_inputs: usize,
    num_hidden: usize,
    rng: &mut R,
  ) -> Result<Self, ConfigError> {
    if num_inputs == 0 {
      return Err(ConfigError::EmptyLayer { layer: "input" });
    }
    if num_hidden == 0 {
      return Err(ConfigError::EmptyLayer { layer: "hidden" });
    }
    let hidden_bound = init_bound(num_inputs);
    let output_bound = init_bound(num_hidden);
    let mut draw = |bound: f64| rng.gen_range(-bound..=bound);

    let input_to_hidden: Vec<Vec<f64>> = (0..num_inputs)
      .map(|_| (0..num_hidden).map(|_| draw(hidden_bound)).collect::<Vec<f64>>())
      .collect();
    let hidden_biases: Vec<f64> = (0..num_hidden).map(|_| draw(hidden_bound)).collect();
    let hidden_to_output: Vec<f64> = (0..num_hidden).map(|_| draw(output_bound)).collect();
    let output_bias = draw(output_bound);

    Ok(Self {
      input_to_hidden,
      hidden_biases,
      hidden_to_output,
      output_bias,
    })
  }

  pub fn num_inputs(&self) -> usize {
    self.input_to_hidden.len()
  }

  pub fn num_hidden(&self) -> usize {
    self.hidden_biases.len()
  }

  /// Computes the hidden unit outputs into `hidden` and returns the network output.
  pub fn forward_into(&self, activation: Activation, inputs: &[f64], hidden: &mut [f64]) -> f64 {
    debug_assert_eq!(inputs.len(), self.num_inputs());
    for (h, out) in hidden.iter_mut().enumerate() {
      let sum = inputs
        .iter()
        .zip(&self.input_to_hidden)
        .fold(self.hidden_biases[h], |acc, (x, row)| acc + x * row[h]);
      *out = activation.forward(sum);
    }
    let sum = hidden
      .iter()
      .zip(&self.hidden_to_output)
      .fold(self.output_bias, |acc, (y, w)| acc + y * w);
    activation.forward(sum)
  }

  /// Returns `(hidden_outputs, output)` for one input vector.
  pub fn forward(&self, activation: Activation, inputs: &[f64]) -> (Vec<f64>, f64) {
    let mut hidden = vec![0.0; self.num_hidden()];
    let output = self.forward_into(activation, inputs, &mut hidden);
    (hidden, output)
  }

  pub fn snapshot(&self) -> Snapshot {
    Snapshot(self.clone())
  }

  /// Restores every field saved by [`snapshot`](Self::snapshot).
  pub fn restore(&mut self, snapshot: &Snapshot) {
    self.copy_from(&snapshot.0);
  }

  /// Overwrites the snapshot in place, reusing its buffers.
  pub fn save_into(&self, snapshot: &mut Snapshot) {
    snapshot.0.copy_from(self);
  }

  fn copy_from(&mut self, other: &Self) {
    debug_assert_eq!(self.num_inputs(), other.num_inputs());
    debug_assert_eq!(self.num_hidden(), other.num_hidden());
    for (dst, src) in self.input_to_hidden.iter_mut().zip(&other.input_to_hidden) {
      dst.copy_from_slice(src);
    }
    self.hidden_biases.copy_from_slice(&other.hidden_biases);
    self.hidden_to_output.copy_from_slice(&other.hidden_to_output);
    self.output_bias = other.output_bias;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;
  use rand::{rngs::StdRng, SeedableRng};

  fn within(value: f64, bound: f64) -> bool {
    -bound <= value && value <= bound
  }

  #[test]
  fn initialization_respects_fan_in_bounds() {
    let (inputs, hidden) = (8, 16);
    let mut draws = 0;
    let mut rng = StdRng::seed_from_u64(0);
    while draws < 10_000 {
      let p = NetworkParameters::initialize_random(inputs, hidden, &mut rng).unwrap();
      for row in &p.input_to_hidden {
        assert!(row.iter().all(|w| within(*w, 2.0 / 8.0)));
      }
      assert!(p.hidden_biases.iter().all(|b| within(*b, 2.0 / 8.0)));
      assert!(p.hidden_to_output.iter().all(|w| within(*w, 2.0 / 16.0)));
      assert!(within(p.output_bias, 2.0 / 16.0));
      draws += inputs * hidden + 2 * hidden + 1;
    }
  }

  #[test]
  fn rejects_empty_layers() {
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(
      NetworkParameters::initialize_random(0, 4, &mut rng),
      Err(ConfigError::EmptyLayer { layer: "input" })
    );
    assert_eq!(
      NetworkParameters::initialize_random(8, 0, &mut rng),
      Err(ConfigError::EmptyLayer { layer: "hidden" })
    );
  }

  #[test]
  fn forward_matches_hand_computation() {
    let p = NetworkParameters {
      input_to_hidden: vec![vec![0.1, -0.2], vec![0.3, 0.4]],
      hidden_biases: vec![0.05, -0.05],
      hidden_to_output: vec![0.5, -0.6],
      output_bias: 0.2,
    };
    let sig = |x: f64| 1.0 / (1.0 + (-x).exp());
    let h0 = sig(0.2 * 0.1 + 0.3 * 0.3 + 0.05);
    let h1 = sig(0.2 * -0.2 + 0.3 * 0.4 - 0.05);
    let expected = sig(h0 * 0.5 + h1 * -0.6 + 0.2);

    let (hidden, output) = p.forward(Activation::Sigmoid, &[0.2, 0.3]);
    assert!((hidden[0] - h0).abs() < 1e-15);
    assert!((hidden[1] - h1).abs() < 1e-15);
    assert!((output - expected).abs() < 1e-15);
  }

  #[test]
  fn restore_undoes_every_field() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut p = NetworkParameters::initialize_random(3, 4, &mut rng).unwrap();
    let original = p.clone();
    let snapshot = p.snapshot();

    p.input_to_hidden[2][3] += 1.0;
    p.hidden_biases[0] -= 1.0;
    p.hidden_to_output[1] *= 2.0;
    p.output_bias = 7.0;
    assert_ne!(p, original);

    p.restore(&snapshot);
    assert_eq!(p, original);
  }

  #[test]
  fn save_into_overwrites_previous_snapshot() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut p = NetworkParameters::initialize_random(2, 2, &mut rng).unwrap();
    let mut snapshot = p.snapshot();
    p.output_bias += 0.5;
    p.hidden_to_output[0] = -3.0;
    let saved = p.clone();
    p.save_into(&mut snapshot);

    p.output_bias = 0.0;
    p.input_to_hidden[1][1] = 9.0;
    p.restore(&snapshot);
    assert_eq!(p, saved);
  }

  proptest! {
    #[test]
    fn forward_is_deterministic(seed in any::<u64>(), inputs in proptest::collection::vec(0.1..0.9f64, 8)) {
      let mut rng = StdRng::seed_from_u64(seed);
      let p = NetworkParameters::initialize_random(8, 5, &mut rng).unwrap();
      for activation in Activation::ALL {
        let (h1, o1) = p.forward(activation, &inputs);
        let (h2, o2) = p.forward(activation, &inputs);
        prop_assert_eq!(o1.to_bits(), o2.to_bits());
        prop_assert!(h1.iter().zip(&h2).all(|(a, b)| a.to_bits() == b.to_bits()));
      }
    }
  }
}
