//! L2-regularized binary logistic regression

use super::linalg::solve_spd;
use super::Classifier;
use crate::error::{HarnessError, Result};
use crate::types::dataset::{check_rows, ClassCounts};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::{debug, warn};

/// Sufficient-decrease constant for the backtracking line search
const ARMIJO: f64 = 1e-4;
const MAX_HALVINGS: usize = 40;

/// Logistic regression fit by Newton's method.
///
/// Minimizes `sum(log_loss) + ||w||^2 / (2C)`; the intercept is not
/// penalized. The decision function is the logit, so a score above zero
/// predicts fraud.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    c: f64,
    max_iter: usize,
    tol: f64,
    coef: Option<Array1<f64>>,
    intercept: f64,
    n_iter: usize,
    converged: bool,
}

impl LogisticRegression {
    pub fn new(c: f64, max_iter: usize, tol: f64) -> Self {
        Self {
            c,
            max_iter,
            tol,
            coef: None,
            intercept: 0.0,
            n_iter: 0,
            converged: false,
        }
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn coefficients(&self) -> Result<&Array1<f64>> {
        self.coef.as_ref().ok_or(HarnessError::NotFitted {
            component: "LogisticRegression",
        })
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Newton iterations taken by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Whether the last fit met the gradient tolerance
    pub fn converged(&self) -> bool {
        self.converged
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<()> {
        check_rows(x, y)?;
        let counts = ClassCounts::from_labels(y)?;
        if counts.normal == 0 || counts.fraud == 0 {
            return Err(HarnessError::precondition(format!(
                "logistic regression needs both classes (normal={}, fraud={})",
                counts.normal, counts.fraud
            )));
        }
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(HarnessError::precondition(format!(
                "C must be positive and finite, got {}",
                self.c
            )));
        }

        let n = x.nrows() as f64;
        let d = x.ncols();
        let lambda = 1.0 / self.c;
        let yf = y.mapv(f64::from);

        let mut w = Array1::<f64>::zeros(d);
        let mut b = (counts.fraud as f64 / counts.normal as f64).ln();
        let mut loss = objective(x, &yf, &w, b, lambda);
        let mut converged = false;
        let mut iter = 0;

        while iter < self.max_iter {
            let p = (x.dot(&w) + b).mapv(sigmoid);
            let residual = &p - &yf;

            let mut grad = Array1::<f64>::zeros(d + 1);
            grad.slice_mut(s![..d])
                .assign(&((x.t().dot(&residual) + &w * lambda) / n));
            grad[d] = residual.sum() / n;

            if max_abs(&grad) < self.tol {
                converged = true;
                break;
            }

            let weights = p.mapv(|p| p * (1.0 - p));
            let hessian = hessian(x, &weights, lambda, n);
            let step = solve_spd(&hessian, &grad)?;
            let slope = -grad.dot(&step);

            let mut t = 1.0;
            let mut accepted = false;
            for _ in 0..MAX_HALVINGS {
                let w_new = &w - &(step.slice(s![..d]).to_owned() * t);
                let b_new = b - t * step[d];
                let loss_new = objective(x, &yf, &w_new, b_new, lambda);
                if loss_new <= loss + ARMIJO * t * slope {
                    w = w_new;
                    b = b_new;
                    loss = loss_new;
                    accepted = true;
                    break;
                }
                t *= 0.5;
            }

            iter += 1;
            debug!(iter, loss, step = t, "Newton step");

            if !accepted {
                warn!(iter, loss, "Line search stalled before reaching tolerance");
                break;
            }
        }

        if !converged {
            warn!(
                c = self.c,
                max_iter = self.max_iter,
                iterations = iter,
                "Logistic regression did not converge; keeping best-effort model"
            );
        }

        self.coef = Some(w);
        self.intercept = b;
        self.n_iter = iter;
        self.converged = converged;
        Ok(())
    }

    fn predict_score(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let coef = self.coefficients()?;
        if x.ncols() != coef.len() {
            return Err(HarnessError::DimensionMismatch {
                context: "logistic regression features",
                expected: coef.len(),
                actual: x.ncols(),
            });
        }
        Ok(x.dot(coef) + self.intercept)
    }
}

/// Mean penalized log loss
fn objective(x: ArrayView2<f64>, y: &Array1<f64>, w: &Array1<f64>, b: f64, lambda: f64) -> f64 {
    let n = x.nrows() as f64;
    let z = x.dot(w) + b;
    let data: f64 = z
        .iter()
        .zip(y.iter())
        .map(|(&z, &y)| softplus(z) - y * z)
        .sum();
    (data + 0.5 * lambda * w.dot(w)) / n
}

/// Hessian of the mean objective over `[w, b]`
fn hessian(x: ArrayView2<f64>, weights: &Array1<f64>, lambda: f64, n: f64) -> Array2<f64> {
    let d = x.ncols();
    let weighted = &x * &weights.view().insert_axis(Axis(1));

    let mut h = Array2::<f64>::zeros((d + 1, d + 1));
    h.slice_mut(s![..d, ..d]).assign(&(weighted.t().dot(&x) / n));
    for j in 0..d {
        h[[j, j]] += lambda / n;
    }
    let cross = weighted.sum_axis(Axis(0)) / n;
    h.slice_mut(s![..d, d]).assign(&cross);
    h.slice_mut(s![d, ..d]).assign(&cross);
    h[[d, d]] = weights.sum() / n;
    h
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn max_abs(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0, |m, g| m.max(g.abs()))
}
