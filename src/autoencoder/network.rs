//! Dense feed-forward layers with manual backpropagation

use crate::error::{HarnessError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Tanh,
    Linear,
}

impl Activation {
    fn apply(self, z: &mut Array2<f64>) {
        if self == Activation::Tanh {
            z.mapv_inplace(f64::tanh);
        }
    }

    /// Derivative expressed through the activation output
    fn derivative(self, a: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Tanh => a.mapv(|v| 1.0 - v * v),
            Activation::Linear => Array2::ones(a.raw_dim()),
        }
    }
}

/// Fully connected layer: `activation(x * W + b)`
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    pub(crate) weights: Array2<f64>,
    pub(crate) bias: Array1<f64>,
    pub(crate) activation: Activation,
}

impl DenseLayer {
    /// Glorot-uniform weights, zero bias
    pub fn new(inputs: usize, outputs: usize, activation: Activation, rng: &mut ChaCha8Rng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-limit..limit));
        Self {
            weights,
            bias: Array1::zeros(outputs),
            activation,
        }
    }

    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }

    pub fn forward(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut z = x.dot(&self.weights) + &self.bias;
        self.activation.apply(&mut z);
        z
    }
}

/// Gradients for one layer
#[derive(Debug, Clone)]
pub struct LayerGradient {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

/// Stack of dense layers
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    layers: Vec<DenseLayer>,
}

impl Network {
    /// Layers of widths `dims[0] -> dims[1] -> ...`, one activation per layer
    pub fn new(dims: &[usize], activations: &[Activation], rng: &mut ChaCha8Rng) -> Result<Self> {
        if dims.len() < 2 || activations.len() != dims.len() - 1 {
            return Err(HarnessError::precondition(format!(
                "network needs one activation per layer ({} widths, {} activations)",
                dims.len(),
                activations.len()
            )));
        }
        if let Some(width) = dims.iter().find(|&&w| w == 0) {
            return Err(HarnessError::precondition(format!("layer width {} is invalid", width)));
        }

        let layers = dims
            .windows(2)
            .zip(activations.iter())
            .map(|(pair, &activation)| DenseLayer::new(pair[0], pair[1], activation, rng))
            .collect();
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map(DenseLayer::inputs).unwrap_or(0)
    }

    /// Split off the first `depth` layers
    pub(crate) fn into_prefix(self, depth: usize) -> Vec<DenseLayer> {
        self.layers.into_iter().take(depth).collect()
    }

    pub fn forward(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.input_dim() {
            return Err(HarnessError::DimensionMismatch {
                context: "network input",
                expected: self.input_dim(),
                actual: x.ncols(),
            });
        }
        Ok(forward_through(&self.layers, x))
    }

    /// Mean squared reconstruction error over all entries
    pub fn reconstruction_loss(&self, x: ArrayView2<f64>) -> Result<f64> {
        let out = self.forward(x)?;
        Ok(mse(&out, x))
    }

    /// Forward pass plus backpropagation of the reconstruction MSE.
    ///
    /// Returns the batch loss and one gradient per layer.
    pub fn reconstruction_gradients(&self, x: ArrayView2<f64>) -> Result<(f64, Vec<LayerGradient>)> {
        if x.ncols() != self.input_dim() {
            return Err(HarnessError::DimensionMismatch {
                context: "network input",
                expected: self.input_dim(),
                actual: x.ncols(),
            });
        }

        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(x.to_owned());
        for layer in &self.layers {
            let next = layer.forward(activations[activations.len() - 1].view());
            activations.push(next);
        }

        let output = &activations[self.layers.len()];
        let loss = mse(output, x);
        let scale = 2.0 / (x.nrows() * x.ncols()) as f64;
        let mut delta = (output - &x) * scale;

        let mut gradients = Vec::with_capacity(self.layers.len());
        for (l, layer) in self.layers.iter().enumerate().rev() {
            delta = delta * layer.activation.derivative(&activations[l + 1]);
            gradients.push(LayerGradient {
                weights: activations[l].t().dot(&delta),
                bias: delta.sum_axis(Axis(0)),
            });
            if l > 0 {
                delta = delta.dot(&layer.weights.t());
            }
        }
        gradients.reverse();

        Ok((loss, gradients))
    }
}

pub(crate) fn forward_through(layers: &[DenseLayer], x: ArrayView2<f64>) -> Array2<f64> {
    let mut current = x.to_owned();
    for layer in layers {
        current = layer.forward(current.view());
    }
    current
}

fn mse(output: &Array2<f64>, target: ArrayView2<f64>) -> f64 {
    let n = output.len().max(1) as f64;
    output
        .iter()
        .zip(target.iter())
        .map(|(o, t)| (o - t) * (o - t))
        .sum::<f64>()
        / n
}
