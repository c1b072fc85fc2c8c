//! Fixed-topology feed-forward classifier: dense layers, dropout, Adam, and
//! binary cross-entropy.
//!
//! - `9 → dense(32, relu) → dropout(0.3) → dense(16, relu) → dropout(0.2) → dense(1, sigmoid)`
//! - mini-batch training with per-epoch progress reports
//! - inference without dropout
use std::ops::ControlFlow;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::encoding::{EncodedBatch, FeatureVector, FEATURE_COUNT};
use super::metrics::ConfusionCounts;
use super::model::ModelError;

/// Matrix type, row-major `[output][input]`.
pub type Matrix = Vec<Vec<f64>>;

pub const LEARNING_RATE: f64 = 0.001;
pub const DECISION_THRESHOLD: f64 = 0.5;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;
const PROBABILITY_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Sigmoid,
}

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            // `f64::max` would swallow NaN and hide a diverged layer.
            Activation::Relu => {
                if x.is_nan() {
                    x
                } else {
                    x.max(0.0)
                }
            }
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }

    /// Derivative with respect to the pre-activation `z`.
    pub fn derivative(self, z: f64) -> f64 {
        match self {
            Activation::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Sigmoid => {
                let s = self.apply(z);
                s * (1.0 - s)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initializer {
    /// Truncated normal, `σ = sqrt(2 / fan_in)`.
    HeNormal,
    /// `U(-sqrt(6 / (fan_in + fan_out)), sqrt(6 / (fan_in + fan_out)))`.
    GlorotUniform,
}

impl Initializer {
    fn sample<R: Rng>(self, rng: &mut R, fan_in: usize, fan_out: usize) -> f64 {
        match self {
            Initializer::HeNormal => {
                let std = (2.0 / fan_in as f64).sqrt();
                truncated_normal(rng) * std
            }
            Initializer::GlorotUniform => {
                let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
                rng.gen_range(-limit..limit)
            }
        }
    }
}

/// Standard normal draw, redrawn until it lies within two standard deviations.
fn truncated_normal<R: Rng>(rng: &mut R) -> f64 {
    loop {
        let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        let u2: f64 = rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        if z.abs() <= 2.0 {
            return z;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSpec {
    pub units: usize,
    pub activation: Activation,
    pub initializer: Initializer,
    /// Fraction of this layer's outputs zeroed while fitting.
    pub dropout: f64,
}

pub const ARCHITECTURE: [LayerSpec; 3] = [
    LayerSpec {
        units: 32,
        activation: Activation::Relu,
        initializer: Initializer::HeNormal,
        dropout: 0.3,
    },
    LayerSpec {
        units: 16,
        activation: Activation::Relu,
        initializer: Initializer::HeNormal,
        dropout: 0.2,
    },
    LayerSpec {
        units: 1,
        activation: Activation::Sigmoid,
        initializer: Initializer::GlorotUniform,
        dropout: 0.0,
    },
];

/// A fully-connected layer followed by optional dropout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Matrix,
    pub bias: Vec<f64>,
    pub activation: Activation,
    #[serde(default)]
    pub dropout: f64,
}

impl DenseLayer {
    pub fn new<R: Rng>(input_size: usize, spec: &LayerSpec, rng: &mut R) -> Self {
        let weights = (0..spec.units)
            .map(|_| {
                (0..input_size)
                    .map(|_| spec.initializer.sample(rng, input_size, spec.units))
                    .collect()
            })
            .collect();
        Self {
            weights,
            bias: vec![0.0; spec.units],
            activation: spec.activation,
            dropout: spec.dropout,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.first().map(Vec::len).unwrap_or(0)
    }

    pub fn output_size(&self) -> usize {
        self.bias.len()
    }

    /// Computes pre-activations `z = W·x + b` and activations `a = act(z)`.
    pub fn forward(&self, input: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let z: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, &b)| row.iter().zip(input).map(|(&w, &x)| w * x).sum::<f64>() + b)
            .collect();
        let a = z.iter().map(|&value| self.activation.apply(value)).collect();
        (z, a)
    }

    /// Inverted-dropout mask; `None` when the layer has no dropout.
    fn dropout_mask<R: Rng>(&self, rng: &mut R) -> Option<Vec<f64>> {
        if self.dropout <= 0.0 {
            return None;
        }
        let keep = 1.0 - self.dropout;
        Some(
            (0..self.output_size())
                .map(|_| {
                    if rng.gen::<f64>() < self.dropout {
                        0.0
                    } else {
                        1.0 / keep
                    }
                })
                .collect(),
        )
    }

    fn is_finite(&self) -> bool {
        self.bias.iter().all(|b| b.is_finite())
            && self.weights.iter().flatten().all(|w| w.is_finite())
    }
}

/// Options for [`RiskNetwork::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub shuffle: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            shuffle: true,
        }
    }
}

/// Progress emitted at the end of every completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    /// 0-based epoch index.
    pub epoch: usize,
    pub total_epochs: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
}

/// Receives epoch reports. Returning `Break` stops training at that epoch boundary.
pub trait ProgressObserver {
    fn on_epoch_end(&mut self, report: &EpochReport) -> ControlFlow<()>;
}

impl<F> ProgressObserver for F
where
    F: FnMut(&EpochReport) -> ControlFlow<()>,
{
    fn on_epoch_end(&mut self, report: &EpochReport) -> ControlFlow<()> {
        self(report)
    }
}

/// Observer that ignores progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_epoch_end(&mut self, _report: &EpochReport) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochReport>,
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn last(&self) -> Option<&EpochReport> {
        self.epochs.last()
    }
}

#[derive(Debug)]
struct Gradients {
    d_w: Vec<Matrix>,
    db: Vec<Vec<f64>>,
}

impl Gradients {
    fn zeros_like(layers: &[DenseLayer]) -> Self {
        Self {
            d_w: layers
                .iter()
                .map(|l| vec![vec![0.0; l.input_size()]; l.output_size()])
                .collect(),
            db: layers.iter().map(|l| vec![0.0; l.output_size()]).collect(),
        }
    }
}

/// First and second moment estimates for every parameter.
#[derive(Debug)]
struct Adam {
    learning_rate: f64,
    step: i32,
    m: Gradients,
    v: Gradients,
}

impl Adam {
    fn new(layers: &[DenseLayer], learning_rate: f64) -> Self {
        Self {
            learning_rate,
            step: 0,
            m: Gradients::zeros_like(layers),
            v: Gradients::zeros_like(layers),
        }
    }

    /// Applies `grads * scale` (the batch mean) to every layer.
    fn apply(&mut self, layers: &mut [DenseLayer], grads: &Gradients, scale: f64) {
        self.step += 1;
        let correction1 = 1.0 - BETA1.powi(self.step);
        let correction2 = 1.0 - BETA2.powi(self.step);
        let lr = self.learning_rate;
        let update = |param: &mut f64, m: &mut f64, v: &mut f64, grad: f64| {
            let g = grad * scale;
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *param -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
        };

        for (l, layer) in layers.iter_mut().enumerate() {
            for (i, b) in layer.bias.iter_mut().enumerate() {
                update(b, &mut self.m.db[l][i], &mut self.v.db[l][i], grads.db[l][i]);
            }
            for (i, row) in layer.weights.iter_mut().enumerate() {
                for (j, w) in row.iter_mut().enumerate() {
                    update(
                        w,
                        &mut self.m.d_w[l][i][j],
                        &mut self.v.d_w[l][i][j],
                        grads.d_w[l][i][j],
                    );
                }
            }
        }
    }
}

/// The risk classifier network. Outputs `P(risk = Alto)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskNetwork {
    pub layers: Vec<DenseLayer>,
}

impl RiskNetwork {
    /// Fresh network with the fixed architecture and random initial weights.
    pub fn build(rng: &mut StdRng) -> Self {
        let mut layers = Vec::with_capacity(ARCHITECTURE.len());
        let mut input_size = FEATURE_COUNT;
        for spec in &ARCHITECTURE {
            layers.push(DenseLayer::new(input_size, spec, rng));
            input_size = spec.units;
        }
        Self { layers }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map(DenseLayer::input_size).unwrap_or(0)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map(DenseLayer::output_size).unwrap_or(0)
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.input_size() * l.output_size() + l.output_size())
            .sum()
    }

    /// Checks layer chaining and that every weight is finite.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.input_size() != FEATURE_COUNT || self.output_size() != 1 {
            return Err(ModelError::Shape(format!(
                "expected {FEATURE_COUNT} inputs and 1 output, found {} and {}",
                self.input_size(),
                self.output_size()
            )));
        }
        for pair in self.layers.windows(2) {
            if pair[0].output_size() != pair[1].input_size() {
                return Err(ModelError::Shape("layer sizes do not chain".to_string()));
            }
        }
        for layer in &self.layers {
            if layer.weights.iter().any(|row| row.len() != layer.input_size()) {
                return Err(ModelError::Shape("ragged weight matrix".to_string()));
            }
            if !layer.is_finite() {
                return Err(ModelError::NonFinite { epoch: None });
            }
        }
        Ok(())
    }

    /// Inference-mode forward pass for one row.
    pub fn forward(&self, input: &[f64]) -> f64 {
        let mut current = input.to_vec();
        for layer in &self.layers {
            let (_, a) = layer.forward(&current);
            current = a;
        }
        current.first().copied().unwrap_or(f64::NAN)
    }

    /// One probability per row.
    pub fn predict(&self, rows: &[FeatureVector]) -> Vec<f64> {
        rows.iter().map(|row| self.forward(row.values())).collect()
    }

    pub fn evaluate_confusion(
        &self,
        rows: &[FeatureVector],
        labels: &[f64],
        threshold: f64,
    ) -> ConfusionCounts {
        ConfusionCounts::from_predictions(&self.predict(rows), labels, threshold)
    }

    /// Mini-batch training. `train` is reshuffled every epoch when `options.shuffle`
    /// is set; `validation` is evaluated in its given order.
    pub fn fit<O>(
        &mut self,
        train: &EncodedBatch,
        validation: &EncodedBatch,
        options: &FitOptions,
        rng: &mut StdRng,
        observer: &mut O,
    ) -> Result<TrainingHistory, ModelError>
    where
        O: ProgressObserver + ?Sized,
    {
        if train.is_empty() {
            return Err(ModelError::Shape("training split is empty".to_string()));
        }
        if train.labels.len() != train.len() || validation.labels.len() != validation.len() {
            return Err(ModelError::Shape(
                "feature and label counts differ".to_string(),
            ));
        }
        if options.batch_size == 0 {
            return Err(ModelError::Shape("batch size must be positive".to_string()));
        }

        let mut adam = Adam::new(&self.layers, LEARNING_RATE);
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut history = TrainingHistory::default();
        let samples = train.len() as f64;

        for epoch in 0..options.epochs {
            if options.shuffle {
                order.shuffle(rng);
            }

            let mut loss_sum = 0.0;
            let mut correct = 0usize;
            for chunk in order.chunks(options.batch_size) {
                let mut grads = Gradients::zeros_like(&self.layers);
                for &idx in chunk {
                    let target = train.labels[idx];
                    let p = self.accumulate(train.features[idx].values(), target, rng, &mut grads);
                    loss_sum += binary_cross_entropy(p, target);
                    if predicted_label(p, DECISION_THRESHOLD) == target {
                        correct += 1;
                    }
                }
                adam.apply(&mut self.layers, &grads, 1.0 / chunk.len() as f64);
            }

            let loss = loss_sum / samples;
            if !loss.is_finite() || !self.layers.iter().all(DenseLayer::is_finite) {
                return Err(ModelError::NonFinite { epoch: Some(epoch) });
            }

            let (val_loss, val_accuracy) = if validation.is_empty() {
                (None, None)
            } else {
                let probabilities = self.predict(&validation.features);
                (
                    Some(mean_binary_cross_entropy(&probabilities, &validation.labels)),
                    Some(accuracy(&probabilities, &validation.labels)),
                )
            };

            let report = EpochReport {
                epoch,
                total_epochs: options.epochs,
                loss,
                accuracy: correct as f64 / samples,
                val_loss,
                val_accuracy,
            };
            debug!(
                epoch = epoch + 1,
                total = options.epochs,
                loss = report.loss,
                accuracy = report.accuracy,
                val_accuracy = ?report.val_accuracy,
                "epoch finished"
            );
            let flow = observer.on_epoch_end(&report);
            history.epochs.push(report);
            if flow.is_break() {
                history.stopped_early = true;
                break;
            }
        }

        Ok(history)
    }

    /// Training-mode forward and backward pass for one sample. Adds this sample's
    /// gradients to `grads` and returns the predicted probability.
    fn accumulate(
        &self,
        input: &[f64],
        target: f64,
        rng: &mut StdRng,
        grads: &mut Gradients,
    ) -> f64 {
        let depth = self.layers.len();
        let mut activations: Vec<Vec<f64>> = Vec::with_capacity(depth + 1);
        let mut zs: Vec<Vec<f64>> = Vec::with_capacity(depth);
        let mut masks: Vec<Option<Vec<f64>>> = Vec::with_capacity(depth);
        activations.push(input.to_vec());

        for (l, layer) in self.layers.iter().enumerate() {
            let (z, mut a) = layer.forward(&activations[l]);
            let mask = layer.dropout_mask(rng);
            if let Some(mask) = &mask {
                for (value, keep) in a.iter_mut().zip(mask) {
                    *value *= keep;
                }
            }
            zs.push(z);
            masks.push(mask);
            activations.push(a);
        }

        let p = activations[depth][0];
        // sigmoid + cross-entropy: dL/dz = p - y
        let mut dz = vec![p - target];

        for l in (0..depth).rev() {
            let a_prev = &activations[l];
            for (i, &dz_i) in dz.iter().enumerate() {
                grads.db[l][i] += dz_i;
                for (j, &a_j) in a_prev.iter().enumerate() {
                    grads.d_w[l][i][j] += dz_i * a_j;
                }
            }
            if l == 0 {
                break;
            }

            let mut da_prev = vec![0.0; a_prev.len()];
            for (i, row) in self.layers[l].weights.iter().enumerate() {
                for (j, &w) in row.iter().enumerate() {
                    da_prev[j] += w * dz[i];
                }
            }
            if let Some(mask) = &masks[l - 1] {
                for (d, keep) in da_prev.iter_mut().zip(mask) {
                    *d *= keep;
                }
            }
            let below = &self.layers[l - 1];
            dz = da_prev
                .iter()
                .zip(&zs[l - 1])
                .map(|(&d, &z)| d * below.activation.derivative(z))
                .collect();
        }

        p
    }
}

pub fn predicted_label(probability: f64, threshold: f64) -> f64 {
    if probability >= threshold {
        1.0
    } else {
        0.0
    }
}

pub fn binary_cross_entropy(probability: f64, target: f64) -> f64 {
    let p = probability.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON);
    -(target * p.ln() + (1.0 - target) * (1.0 - p).ln())
}

pub fn mean_binary_cross_entropy(probabilities: &[f64], labels: &[f64]) -> f64 {
    if probabilities.is_empty() {
        return 0.0;
    }
    probabilities
        .iter()
        .zip(labels)
        .map(|(&p, &y)| binary_cross_entropy(p, y))
        .sum::<f64>()
        / probabilities.len() as f64
}

fn accuracy(probabilities: &[f64], labels: &[f64]) -> f64 {
    ConfusionCounts::from_predictions(probabilities, labels, DECISION_THRESHOLD).accuracy()
}
