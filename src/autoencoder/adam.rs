//! Adam optimizer over dense layer parameters

use super::network::{DenseLayer, LayerGradient};
use ndarray::{Array, Array1, Array2, Dimension, Zip};

/// First and second moment buffers for one layer
#[derive(Debug, Clone)]
struct LayerMoments {
    m_weights: Array2<f64>,
    v_weights: Array2<f64>,
    m_bias: Array1<f64>,
    v_bias: Array1<f64>,
}

/// Adam with bias correction
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: i32,
    moments: Vec<LayerMoments>,
}

impl Adam {
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            moments: Vec::new(),
        }
    }

    pub fn step_count(&self) -> i32 {
        self.t
    }

    /// Apply one update to every layer
    pub fn step(&mut self, layers: &mut [DenseLayer], gradients: &[LayerGradient]) {
        if self.moments.is_empty() {
            self.moments = layers
                .iter()
                .map(|layer| LayerMoments {
                    m_weights: Array2::zeros(layer.weights.raw_dim()),
                    v_weights: Array2::zeros(layer.weights.raw_dim()),
                    m_bias: Array1::zeros(layer.bias.raw_dim()),
                    v_bias: Array1::zeros(layer.bias.raw_dim()),
                })
                .collect();
        }
        self.t = self.t.saturating_add(1);

        // bias correction folded into the step size
        let lr_t = self.lr * (1.0 - self.beta2.powi(self.t)).sqrt() / (1.0 - self.beta1.powi(self.t));
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);

        for ((layer, grad), moments) in layers.iter_mut().zip(gradients).zip(self.moments.iter_mut()) {
            update(
                &mut layer.weights,
                &mut moments.m_weights,
                &mut moments.v_weights,
                &grad.weights,
                lr_t,
                beta1,
                beta2,
                epsilon,
            );
            update(
                &mut layer.bias,
                &mut moments.m_bias,
                &mut moments.v_bias,
                &grad.bias,
                lr_t,
                beta1,
                beta2,
                epsilon,
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn update<D: Dimension>(
    param: &mut Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    lr_t: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
) {
    Zip::from(param)
        .and(m)
        .and(v)
        .and(grad)
        .for_each(|p, m, v, &g| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            *p -= lr_t * *m / (v.sqrt() + epsilon);
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autoencoder::network::Activation;
    use ndarray::array;

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut layers = vec![DenseLayer {
            weights: array![[1.0, -1.0]],
            bias: array![0.0, 0.0],
            activation: Activation::Linear,
        }];
        let grads = vec![LayerGradient {
            weights: array![[0.5, -2.0]],
            bias: array![0.0, 3.0],
        }];

        let mut adam = Adam::new(0.01);
        adam.step(&mut layers, &grads);

        // the first Adam step has magnitude lr in the gradient's sign
        assert!((layers[0].weights[[0, 0]] - 0.99).abs() < 1e-6);
        assert!((layers[0].weights[[0, 1]] + 0.99).abs() < 1e-6);
        assert_eq!(layers[0].bias[0], 0.0);
        assert!((layers[0].bias[1] + 0.01).abs() < 1e-6);
        assert_eq!(adam.step_count(), 1);
    }

    #[test]
    fn test_minimizes_quadratic() {
        // minimize ||w - target||^2
        let target = array![[3.0, -2.0]];
        let mut layers = vec![DenseLayer {
            weights: Array2::zeros((1, 2)),
            bias: Array1::zeros(2),
            activation: Activation::Linear,
        }];
        let mut adam = Adam::new(0.1);
        for _ in 0..2_000 {
            let grads = vec![LayerGradient {
                weights: (&layers[0].weights - &target) * 2.0,
                bias: Array1::zeros(2),
            }];
            adam.step(&mut layers, &grads);
        }
        assert!((layers[0].weights[[0, 0]] - 3.0).abs() < 5e-2);
        assert!((layers[0].weights[[0, 1]] + 2.0).abs() < 5e-2);
    }
}
