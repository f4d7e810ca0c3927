use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Activation shared by the hidden and output units.
///
/// `derivative` takes the unit's *output* `y = forward(x)`, not its weighted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Activation {
  Sigmoid,
  Tanh,
  LeakyRelu,
}

const LEAK: f64 = 0.01;

impl Activation {
  pub const ALL: [Activation; 3] = [Activation::Sigmoid, Activation::Tanh, Activation::LeakyRelu];

  pub fn forward(self, x: f64) -> f64 {
    match self {
      Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
      // same as (e^x - e^-x) / (e^x + e^-x), without the inf/inf for |x| > ~710
      Activation::Tanh => x.tanh(),
      Activation::LeakyRelu => x.max(LEAK * x),
    }
  }

  pub fn derivative(self, y: f64) -> f64 {
    match self {
      Activation::Sigmoid => y * (1.0 - y),
      Activation::Tanh => 1.0 - y * y,
      Activation::LeakyRelu => {
        if y <= 0.0 {
          LEAK
        } else {
          1.0
        }
      }
    }
  }
}

impl fmt::Display for Activation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Activation::Sigmoid => "sigmoid",
      Activation::Tanh => "tanh",
      Activation::LeakyRelu => "leaky-relu",
    };
    f.write_str(name)
  }
}

impl FromStr for Activation {
  type Err = ParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "sigmoid" => Ok(Activation::Sigmoid),
      "tanh" => Ok(Activation::Tanh),
      "leaky-relu" | "leakyrelu" | "relu" => Ok(Activation::LeakyRelu),
      other => Err(ParseError::new("activation", other)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  proptest! {
    #[test]
    fn sigmoid_and_tanh_stay_in_open_interval(x in -15.0..15.0f64) {
      let s = Activation::Sigmoid.forward(x);
      let t = Activation::Tanh.forward(x);
      prop_assert!(s > 0.0 && s < 1.0, "sigmoid({}) = {}", x, s);
      prop_assert!(t > -1.0 && t < 1.0, "tanh({}) = {}", x, t);
    }

    #[test]
    fn saturated_inputs_stay_finite(x in -1e6..1e6f64) {
      let s = Activation::Sigmoid.forward(x);
      let t = Activation::Tanh.forward(x);
      prop_assert!((0.0..=1.0).contains(&s));
      prop_assert!((-1.0..=1.0).contains(&t));
    }

    #[test]
    fn leaky_relu_is_piecewise_linear(x in -1e3..1e3f64) {
      let y = Activation::LeakyRelu.forward(x);
      if x >= 0.0 {
        prop_assert_eq!(y, x);
      } else {
        prop_assert_eq!(y, 0.01 * x);
      }
    }
  }

  #[test]
  fn sigmoid_derivative_matches_output_form() {
    for i in 0..=200 {
      let x = -10.0 + i as f64 * 0.1;
      let y = Activation::Sigmoid.forward(x);
      let expected = y * (1.0 - y);
      assert!((Activation::Sigmoid.derivative(y) - expected).abs() < 1e-12);
      // agrees with a central difference of forward
      let h = 1e-6;
      let numeric = (Activation::Sigmoid.forward(x + h) - Activation::Sigmoid.forward(x - h)) / (2.0 * h);
      assert!((Activation::Sigmoid.derivative(y) - numeric).abs() < 1e-6);
    }
  }

  #[test]
  fn tanh_derivative_uses_output() {
    let y = Activation::Tanh.forward(0.5);
    assert!((Activation::Tanh.derivative(y) - (1.0 - y * y)).abs() < 1e-15);
    assert_eq!(Activation::Tanh.derivative(0.0), 1.0);
  }

  #[test]
  fn leaky_relu_derivative_dispatches_on_output_sign() {
    assert_eq!(Activation::LeakyRelu.derivative(-0.3), 0.01);
    assert_eq!(Activation::LeakyRelu.derivative(0.0), 0.01);
    assert_eq!(Activation::LeakyRelu.derivative(2.0), 1.0);
  }

  #[test]
  fn parses_names() {
    assert_eq!("Sigmoid".parse::<Activation>().unwrap(), Activation::Sigmoid);
    assert_eq!("relu".parse::<Activation>().unwrap(), Activation::LeakyRelu);
    assert!("softmax".parse::<Activation>().is_err());
    for a in Activation::ALL {
      assert_eq!(a.to_string().parse::<Activation>().unwrap(), a);
    }
  }
}
