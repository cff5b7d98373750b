//! Dense symmetric solves for the linear estimators.

use qsarkit_core::{QsarError, Result};

/// In-place Cholesky factorisation of a row-major `n x n` SPD matrix into
/// its lower factor. Returns `false` if a pivot is not positive.
fn cholesky(a: &mut [f64], n: usize) -> bool {
    for j in 0..n {
        let mut d = a[j * n + j];
        for k in 0..j {
            d -= a[j * n + k] * a[j * n + k];
        }
        if !(d > 0.0) || !d.is_finite() {
            return false;
        }
        let d = d.sqrt();
        a[j * n + j] = d;
        for i in (j + 1)..n {
            let mut s = a[i * n + j];
            for k in 0..j {
                s -= a[i * n + k] * a[j * n + k];
            }
            a[i * n + j] = s / d;
        }
    }
    true
}

/// Solve `A x = b` for symmetric positive semi-definite `A`.
///
/// A vanishing pivot is handled by adding a small ridge to the diagonal and
/// retrying, which yields the minimum-norm-leaning solution for
/// rank-deficient systems.
pub(crate) fn solve_spd(a: &[f64], b: &[f64]) -> Result<Vec<f64>> {
    let n = b.len();
    if a.len() != n * n {
        return Err(QsarError::InvalidInput("matrix/vector size mismatch".into()));
    }
    let trace = (0..n).map(|i| a[i * n + i].abs()).sum::<f64>().max(1.0);
    let mut jitter = 0.0;
    for _ in 0..8 {
        let mut l = a.to_vec();
        for i in 0..n {
            l[i * n + i] += jitter;
        }
        if cholesky(&mut l, n) {
            // forward then back substitution
            let mut y = vec![0.0; n];
            for i in 0..n {
                let s: f64 = (0..i).map(|k| l[i * n + k] * y[k]).sum();
                y[i] = (b[i] - s) / l[i * n + i];
            }
            let mut x = vec![0.0; n];
            for i in (0..n).rev() {
                let s: f64 = ((i + 1)..n).map(|k| l[k * n + i] * x[k]).sum();
                x[i] = (y[i] - s) / l[i * n + i];
            }
            return Ok(x);
        }
        jitter = if jitter == 0.0 { 1e-10 * trace / n as f64 } else { jitter * 100.0 };
    }
    Err(QsarError::Other("linear system is not positive definite".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_spd_system() {
        let a = [4.0, 1.0, 1.0, 3.0];
        let x = solve_spd(&a, &[1.0, 2.0]).unwrap();
        assert!((4.0 * x[0] + x[1] - 1.0).abs() < 1e-12);
        assert!((x[0] + 3.0 * x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn singular_system_gets_regularised() {
        let a = [1.0, 1.0, 1.0, 1.0];
        let x = solve_spd(&a, &[2.0, 2.0]).unwrap();
        assert!((x[0] + x[1] - 2.0).abs() < 1e-4);
    }
}
