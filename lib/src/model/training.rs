use std::sync::atomic::{AtomicBool, Ordering};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{
  annealed_learning_rate, Activation, ForwardState, ImprovementSet, NetworkParameters, Predictor,
  Sample, Series, Snapshot, BOLD_DRIVER_GROW, BOLD_DRIVER_SHRINK, BOLD_DRIVER_TOLERANCE_PERCENT,
  DEFAULT_BATCH_SIZE, DEFAULT_MOMENTUM, EPOCHS_PER_CHECKPOINT, LEARNING_RATE_CEILING,
  LEARNING_RATE_FLOOR,
};
use crate::error::{ConfigError, TrainError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
  pub num_inputs: usize,
  pub num_hidden: usize,
  pub learning_rate: f64,
  pub activation: Activation,
  pub improvements: ImprovementSet,
  /// Epochs to train for. 0 trains until the validation error rises.
  pub epoch_budget: usize,
  /// Samples averaged per update when mini-batch is enabled.
  pub batch_size: usize,
  pub momentum: f64,
  /// On automatic stop, return the parameters of the last checkpoint that did not
  /// increase the validation error instead of the ones at stop time.
  pub restore_best: bool,
  pub seed: Option<u64>,
}

impl TrainerConfig {
  pub fn new(
    num_inputs: usize,
    num_hidden: usize,
    learning_rate: f64,
    activation: Activation,
    improvements: ImprovementSet,
    epoch_budget: usize,
  ) -> Self {
    Self {
      num_inputs,
      num_hidden,
      learning_rate,
      activation,
      improvements,
      epoch_budget,
      batch_size: DEFAULT_BATCH_SIZE,
      momentum: DEFAULT_MOMENTUM,
      restore_best: false,
      seed: None,
    }
  }

  pub fn with_batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size;
    self
  }

  pub fn with_momentum(mut self, momentum: f64) -> Self {
    self.momentum = momentum;
    self
  }

  pub fn with_restore_best(mut self, restore_best: bool) -> Self {
    self.restore_best = restore_best;
    self
  }

  pub fn with_seed(mut self, seed: u64) -> Self {
    self.seed = Some(seed);
    self
  }

  pub fn auto_stop(&self) -> bool {
    self.epoch_budget == 0
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.num_inputs == 0 {
      return Err(ConfigError::EmptyLayer { layer: "input" });
    }
    if self.num_hidden == 0 {
      return Err(ConfigError::EmptyLayer { layer: "hidden" });
    }
    if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
      return Err(ConfigError::InvalidLearningRate(self.learning_rate));
    }
    if self.batch_size == 0 {
      return Err(ConfigError::InvalidBatchSize);
    }
    if !(self.momentum.is_finite() && self.momentum >= 0.0) {
      return Err(ConfigError::InvalidMomentum(self.momentum));
    }
    if self.improvements.annealing && self.auto_stop() {
      return Err(ConfigError::AnnealingWithoutBudget);
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
  /// Validation error rose and bold driver did not (or could not) recover.
  AutoStopped,
  BudgetExhausted,
  Cancelled,
}

/// Per-checkpoint series emitted by [`Trainer::train`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDiagnostics {
  pub training_rmse: Series,
  pub validation_rmse: Series,
  pub learning_rate: Series,
  pub epochs: usize,
  pub final_learning_rate: f64,
  pub stop_reason: StopReason,
}

/// Outcome of the error-driven checkpoint test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
  Improved,
  RolledBack,
  Stop,
}

/// Bookkeeping for a single call to [`Trainer::train`].
struct TrainingRun {
  epoch: usize,
  starting_learning_rate: f64,
  previous_validation_rmse: f64,
  best: Option<Snapshot>,
  training_rmse: Series,
  validation_rmse: Series,
  learning_rate: Series,
}

impl TrainingRun {
  fn new(starting_learning_rate: f64) -> Self {
    Self {
      epoch: 0,
      starting_learning_rate,
      previous_validation_rmse: f64::INFINITY,
      best: None,
      training_rmse: Vec::new(),
      validation_rmse: Vec::new(),
      learning_rate: Vec::new(),
    }
  }

  fn record(&mut self, training_rmse: f64, validation_rmse: f64, learning_rate: f64) {
    self.training_rmse.push((self.epoch, training_rmse));
    self.validation_rmse.push((self.epoch, validation_rmse));
    self.learning_rate.push((self.epoch, learning_rate));
  }

  fn finish(self, final_learning_rate: f64, stop_reason: StopReason) -> TrainingDiagnostics {
    TrainingDiagnostics {
      training_rmse: self.training_rmse,
      validation_rmse: self.validation_rmse,
      learning_rate: self.learning_rate,
      epochs: self.epoch,
      final_learning_rate,
      stop_reason,
    }
  }
}

/// Gradient sums with the same shape as [`NetworkParameters`].
#[derive(Debug, Clone)]
struct Gradients {
  input_to_hidden: Vec<Vec<f64>>,
  hidden_biases: Vec<f64>,
  hidden_to_output: Vec<f64>,
  output_bias: f64,
}

impl Gradients {
  fn zeros(num_inputs: usize, num_hidden: usize) -> Self {
    Self {
      input_to_hidden: vec![vec![0.0; num_hidden]; num_inputs],
      hidden_biases: vec![0.0; num_hidden],
      hidden_to_output: vec![0.0; num_hidden],
      output_bias: 0.0,
    }
  }

  fn accumulate(&mut self, inputs: &[f64], state: &ForwardState) {
    for (row, x) in self.input_to_hidden.iter_mut().zip(inputs) {
      for (g, delta) in row.iter_mut().zip(&state.hidden_deltas) {
        *g += delta * x;
      }
    }
    for (g, delta) in self.hidden_biases.iter_mut().zip(&state.hidden_deltas) {
      *g += delta;
    }
    for (g, y) in self.hidden_to_output.iter_mut().zip(&state.hidden_outputs) {
      *g += state.output_delta * y;
    }
    self.output_bias += state.output_delta;
  }

  fn clear(&mut self) {
    self.input_to_hidden.iter_mut().for_each(|row| row.fill(0.0));
    self.hidden_biases.fill(0.0);
    self.hidden_to_output.fill(0.0);
    self.output_bias = 0.0;
  }
}

/// Backpropagation trainer owning one network for one configuration.
pub struct Trainer {
  config: TrainerConfig,
  model: Predictor,
  learning_rate: f64,
  /// Parameters as they were before the latest update. Only kept with bold driver.
  history: Option<Snapshot>,
  state: ForwardState,
  gradients: Gradients,
  /// Samples accumulated into `gradients` since the last update.
  pending: usize,
}

impl Trainer {
  /// Initializes random weights from `config.seed`, or from entropy when unset.
  pub fn new(config: TrainerConfig) -> Result<Self, ConfigError> {
    let mut rng = match config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    Self::with_rng(config, &mut rng)
  }

  pub fn with_rng<R: Rng + ?Sized>(config: TrainerConfig, rng: &mut R) -> Result<Self, ConfigError> {
    config.validate()?;
    let parameters = NetworkParameters::initialize_random(config.num_inputs, config.num_hidden, rng)?;
    let history = config.improvements.bold_driver.then(|| parameters.snapshot());
    Ok(Self {
      learning_rate: config.learning_rate,
      model: Predictor::new(config.activation, parameters),
      history,
      state: ForwardState::new(config.num_hidden),
      gradients: Gradients::zeros(config.num_inputs, config.num_hidden),
      pending: 0,
      config,
    })
  }

  pub fn config(&self) -> &TrainerConfig {
    &self.config
  }

  pub fn parameters(&self) -> &NetworkParameters {
    &self.model.parameters
  }

  pub fn learning_rate(&self) -> f64 {
    self.learning_rate
  }

  pub fn predictor(&self) -> &Predictor {
    &self.model
  }

  pub fn into_predictor(self) -> Predictor {
    self.model
  }

  /// Network output for one set of standardized predictors.
  pub fn predict(&self, inputs: &[f64]) -> Result<f64, TrainError> {
    self.model.predict(inputs)
  }

  /// Forward-only RMSE on the standardized scale.
  pub fn evaluate(&self, samples: &[Sample]) -> Result<f64, TrainError> {
    self.model.evaluate(samples)
  }

  pub fn train(
    &mut self,
    training: &[Sample],
    validation: &[Sample],
  ) -> Result<TrainingDiagnostics, TrainError> {
    let never = AtomicBool::new(false);
    self.train_with_cancel(training, validation, &never)
  }

  /// Trains in blocks of [`EPOCHS_PER_CHECKPOINT`] epochs. `cancel` is only looked at
  /// after each checkpoint.
  #[instrument(
    level = "info",
    name = "train",
    skip_all,
    fields(
      hidden = self.config.num_hidden,
      activation = %self.config.activation,
      improvements = %self.config.improvements,
    )
  )]
  pub fn train_with_cancel(
    &mut self,
    training: &[Sample],
    validation: &[Sample],
    cancel: &AtomicBool,
  ) -> Result<TrainingDiagnostics, TrainError> {
    self.check_samples(training, validation)?;
    let budget = self.config.epoch_budget;
    let mut run = TrainingRun::new(self.config.learning_rate);
    info!(
      learning_rate = self.learning_rate,
      budget,
      training = training.len(),
      validation = validation.len(),
      "training started"
    );

    let stop_reason = loop {
      for _ in 0..EPOCHS_PER_CHECKPOINT {
        self.run_epoch(training);
      }
      run.epoch += EPOCHS_PER_CHECKPOINT;

      let training_rmse = self.model.rmse_unchecked(training);
      let validation_rmse = self.model.rmse_unchecked(validation);
      if !validation_rmse.is_finite() {
        warn!(epoch = run.epoch, training_rmse, validation_rmse, "validation error is not finite");
        return Err(TrainError::NonFinite { epoch: run.epoch });
      }
      if self.config.improvements.annealing {
        self.learning_rate = annealed_learning_rate(run.starting_learning_rate, run.epoch, budget);
      }
      run.record(training_rmse, validation_rmse, self.learning_rate);

      if self.config.auto_stop() {
        let verdict = self.checkpoint(&mut run, validation_rmse);
        debug!(
          epoch = run.epoch,
          training_rmse,
          validation_rmse,
          learning_rate = self.learning_rate,
          ?verdict,
          "checkpoint"
        );
        match verdict {
          Verdict::Improved if self.config.restore_best => match run.best.as_mut() {
            Some(best) => self.model.parameters.save_into(best),
            None => run.best = Some(self.model.parameters.snapshot()),
          },
          Verdict::Stop => {
            if let Some(best) = &run.best {
              self.model.parameters.restore(best);
            }
            break StopReason::AutoStopped;
          }
          _ => {}
        }
      } else {
        debug!(
          epoch = run.epoch,
          training_rmse,
          validation_rmse,
          learning_rate = self.learning_rate,
          "checkpoint"
        );
        if run.epoch >= budget {
          break StopReason::BudgetExhausted;
        }
      }

      if cancel.load(Ordering::Relaxed) {
        break StopReason::Cancelled;
      }
    };

    info!(
      epochs = run.epoch,
      learning_rate = self.learning_rate,
      ?stop_reason,
      "training finished"
    );
    Ok(run.finish(self.learning_rate, stop_reason))
  }

  fn check_samples(&self, training: &[Sample], validation: &[Sample]) -> Result<(), TrainError> {
    if training.is_empty() {
      return Err(TrainError::EmptyTrainingSet);
    }
    if validation.is_empty() {
      return Err(TrainError::EmptyValidationSet);
    }
    training
      .iter()
      .chain(validation)
      .try_for_each(|s| self.model.check_width(&s.inputs))
  }

  /// Error-driven stopping and bold driver adaptation.
  fn checkpoint(&mut self, run: &mut TrainingRun, validation_rmse: f64) -> Verdict {
    let bold_driver = self.config.improvements.bold_driver;
    let previous = run.previous_validation_rmse;

    if validation_rmse > previous {
      let percent_increase = 100.0 * (validation_rmse - previous) / previous;
      let shrunk = self.learning_rate * BOLD_DRIVER_SHRINK;
      if bold_driver && percent_increase > BOLD_DRIVER_TOLERANCE_PERCENT && shrunk > LEARNING_RATE_FLOOR {
        // only the latest single update is undone, not the whole block
        self.rollback_last_update();
        self.learning_rate = shrunk;
        Verdict::RolledBack
      } else {
        Verdict::Stop
      }
    } else {
      run.previous_validation_rmse = validation_rmse;
      let grown = self.learning_rate * BOLD_DRIVER_GROW;
      if bold_driver && grown < LEARNING_RATE_CEILING {
        self.learning_rate = grown;
      }
      Verdict::Improved
    }
  }

  fn rollback_last_update(&mut self) {
    if let Some(history) = &self.history {
      self.model.parameters.restore(history);
    }
  }

  fn run_epoch(&mut self, training: &[Sample]) {
    for sample in training {
      self.train_sample(sample);
    }
  }

  fn effective_batch_size(&self) -> usize {
    if self.config.improvements.mini_batch {
      self.config.batch_size
    } else {
      1
    }
  }

  /// Forward and backward pass for one sample. Updates the parameters once the
  /// current batch is full; without mini-batch every sample is its own batch.
  fn train_sample(&mut self, sample: &Sample) {
    let activation = self.config.activation;
    let parameters = &self.model.parameters;
    let state = &mut self.state;

    state.output = parameters.forward_into(activation, &sample.inputs, &mut state.hidden_outputs);
    state.output_delta = (sample.target - state.output) * activation.derivative(state.output);
    let output_delta = state.output_delta;
    for ((delta, y), w) in state
      .hidden_deltas
      .iter_mut()
      .zip(&state.hidden_outputs)
      .zip(&parameters.hidden_to_output)
    {
      *delta = w * output_delta * activation.derivative(*y);
    }

    self.gradients.accumulate(&sample.inputs, &self.state);
    self.pending += 1;
    if self.pending == self.effective_batch_size() {
      self.apply_gradients();
    }
  }

  /// `param += lr * mean(grad)`, then `param += momentum * (param - old)` when enabled.
  fn apply_gradients(&mut self) {
    if let Some(history) = self.history.as_mut() {
      self.model.parameters.save_into(history);
    }

    let learning_rate = self.learning_rate;
    let count = self.pending as f64;
    let momentum = self
      .config
      .improvements
      .momentum
      .then_some(self.config.momentum);
    let step = |param: &mut f64, grad_sum: f64| {
      let old = *param;
      let mut new = old + learning_rate * (grad_sum / count);
      if let Some(momentum) = momentum {
        new += momentum * (new - old);
      }
      *param = new;
    };

    let parameters = &mut self.model.parameters;
    let gradients = &self.gradients;
    for (row, grads) in parameters
      .input_to_hidden
      .iter_mut()
      .zip(&gradients.input_to_hidden)
    {
      for (w, g) in row.iter_mut().zip(grads) {
        step(w, *g);
      }
    }
    for (b, g) in parameters.hidden_biases.iter_mut().zip(&gradients.hidden_biases) {
      step(b, *g);
    }
    for (w, g) in parameters
      .hidden_to_output
      .iter_mut()
      .zip(&gradients.hidden_to_output)
    {
      step(w, *g);
    }
    step(&mut parameters.output_bias, gradients.output_bias);

    self.gradients.clear();
    self.pending = 0;
  }
}

/// Trainer with default batch size and momentum, seeded from entropy.
/// `epoch_budget` 0 selects the error-driven stop.
pub fn create_trainer(
  num_inputs: usize,
  num_hidden: usize,
  learning_rate: f64,
  activation: Activation,
  improvements: ImprovementSet,
  epoch_budget: usize,
) -> Result<Trainer, ConfigError> {
  Trainer::new(TrainerConfig::new(
    num_inputs,
    num_hidden,
    learning_rate,
    activation,
    improvements,
    epoch_budget,
  ))
}
