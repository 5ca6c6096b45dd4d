//! Small dense solvers for Newton steps

use crate::error::{HarnessError, Result};
use ndarray::{Array1, Array2};

/// Solve `a * x = b` for symmetric positive-definite `a` via Cholesky.
///
/// When the factorization breaks down a growing ridge is added to the
/// diagonal before giving up.
pub fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return Err(HarnessError::DimensionMismatch {
            context: "spd solve",
            expected: n,
            actual: b.len(),
        });
    }

    let diag_max = (0..n).map(|i| a[[i, i]].abs()).fold(0.0, f64::max).max(1.0);
    let mut ridge = 0.0;
    for _ in 0..8 {
        if let Some(l) = cholesky(a, ridge) {
            return Ok(back_substitute(&l, b));
        }
        ridge = if ridge == 0.0 { diag_max * 1e-10 } else { ridge * 100.0 };
    }

    Err(HarnessError::Numerical(
        "matrix is not positive definite".to_string(),
    ))
}

/// Lower-triangular factor of `a + ridge * I`, or `None` if not positive definite
fn cholesky(a: &Array2<f64>, ridge: f64) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut d = a[[j, j]] + ridge;
        for k in 0..j {
            d -= l[[j, k]] * l[[j, k]];
        }
        if d <= 0.0 || !d.is_finite() {
            return None;
        }
        let d = d.sqrt();
        l[[j, j]] = d;
        for i in (j + 1)..n {
            let mut s = a[[i, j]];
            for k in 0..j {
                s -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = s / d;
        }
    }
    Some(l)
}

/// Solve `l * l^T * x = b`
fn back_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut s = b[i];
        for k in 0..i {
            s -= l[[i, k]] * y[k];
        }
        y[i] = s / l[[i, i]];
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut s = y[i];
        for k in (i + 1)..n {
            s -= l[[k, i]] * x[k];
        }
        x[i] = s / l[[i, i]];
    }
    x
}
