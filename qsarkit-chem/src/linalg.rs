//! Small dense linear algebra for 3D descriptors and embedding.
//!
//! Cyclic Jacobi eigen-decomposition for symmetric matrices (3×3 and n×n)
//! and a thin SVD of n×3 coordinate matrices built on top of it.

/// A 3×3 matrix stored in row-major order.
pub type Matrix3 = [[f64; 3]; 3];

const JACOBI_SWEEPS: usize = 100;
const JACOBI_TOL: f64 = 1e-14;

/// Eigen-decomposition of a symmetric matrix.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Eigenvalues in descending order.
    pub values: Vec<f64>,
    /// `vectors[k]` is the unit eigenvector for `values[k]`.
    pub vectors: Vec<Vec<f64>>,
}

/// Jacobi eigen-decomposition of an n×n symmetric matrix given row-major.
///
/// Only the upper triangle is read. Eigenvalues are sorted descending.
pub fn symmetric_eigen(matrix: &[f64], n: usize) -> SymmetricEigen {
    let mut a: Vec<f64> = matrix.to_vec();
    for i in 0..n {
        for j in 0..i {
            a[i * n + j] = a[j * n + i];
        }
    }
    let mut v = vec![0.0_f64; n * n];
    for i in 0..n {
        v[i * n + i] = 1.0;
    }

    for _ in 0..JACOBI_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .map(|(i, j)| a[i * n + j] * a[i * n + j])
            .sum();
        let scale: f64 = (0..n).map(|i| a[i * n + i].abs()).sum::<f64>().max(1.0);
        if off.sqrt() < JACOBI_TOL * scale {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p * n + q];
                if apq.abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let app = a[p * n + p];
                let aqq = a[q * n + q];
                // Stable rotation (Golub & Van Loan 8.4).
                let tau = (aqq - app) / (2.0 * apq);
                let t = tau.signum() / (tau.abs() + (1.0 + tau * tau).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[k * n + p];
                    let akq = a[k * n + q];
                    a[k * n + p] = c * akp - s * akq;
                    a[k * n + q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[p * n + k];
                    let aqk = a[q * n + k];
                    a[p * n + k] = c * apk - s * aqk;
                    a[q * n + k] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[k * n + p];
                    let vkq = v[k * n + q];
                    v[k * n + p] = c * vkp - s * vkq;
                    v[k * n + q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&x, &y| a[y * n + y].total_cmp(&a[x * n + x]));
    SymmetricEigen {
        values: order.iter().map(|&k| a[k * n + k]).collect(),
        vectors: order.iter().map(|&k| (0..n).map(|row| v[row * n + k]).collect()).collect(),
    }
}

/// Eigenvalues (descending) and matching eigenvectors of a symmetric 3×3 matrix.
pub fn symmetric_eigen3(m: &Matrix3) -> ([f64; 3], [[f64; 3]; 3]) {
    let flat: Vec<f64> = m.iter().flatten().copied().collect();
    let eig = symmetric_eigen(&flat, 3);
    let mut values = [0.0; 3];
    let mut vectors = [[0.0; 3]; 3];
    for k in 0..3 {
        values[k] = eig.values[k];
        for d in 0..3 {
            vectors[k][d] = eig.vectors[k][d];
        }
    }
    (values, vectors)
}

/// Thin SVD of an n×3 matrix: singular values (descending) and the rows
/// of Vᵀ. The left singular vectors are not needed by any caller.
#[derive(Debug, Clone)]
pub struct Svd3 {
    pub singular_values: [f64; 3],
    pub vt: [[f64; 3]; 3],
}

/// SVD of the n×3 matrix whose rows are `points`.
pub fn svd_n3(points: &[[f64; 3]]) -> Svd3 {
    let mut ata: Matrix3 = [[0.0; 3]; 3];
    for p in points {
        for i in 0..3 {
            for j in 0..3 {
                ata[i][j] += p[i] * p[j];
            }
        }
    }
    let (values, vectors) = symmetric_eigen3(&ata);
    Svd3 {
        singular_values: values.map(|v| v.max(0.0).sqrt()),
        vt: vectors,
    }
}

/// Moore-Penrose pseudo-inverse of a symmetric 3×3 matrix.
pub fn pseudo_inverse3(m: &Matrix3) -> Matrix3 {
    let (values, vectors) = symmetric_eigen3(m);
    let cutoff = values[0].abs().max(1.0) * 1e-10;
    let mut inv = [[0.0; 3]; 3];
    for k in 0..3 {
        if values[k].abs() <= cutoff {
            continue;
        }
        for i in 0..3 {
            for j in 0..3 {
                inv[i][j] += vectors[k][i] * vectors[k][j] / values[k];
            }
        }
    }
    inv
}

// ---------------------------------------------------------------------------
// Vector helpers
// ---------------------------------------------------------------------------

pub(crate) fn sub3(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn cross3(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn dot3(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn norm3(v: [f64; 3]) -> f64 {
    dot3(v, v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_matrix_eigenvalues_sorted() {
        let m = [[1.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 3.0]];
        let (values, vectors) = symmetric_eigen3(&m);
        assert!((values[0] - 5.0).abs() < 1e-12);
        assert!((values[1] - 3.0).abs() < 1e-12);
        assert!((values[2] - 1.0).abs() < 1e-12);
        assert!((vectors[0][1].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn eigenvectors_satisfy_definition() {
        let m = [[4.0, 1.0, 2.0], [1.0, 3.0, 0.5], [2.0, 0.5, 6.0]];
        let (values, vectors) = symmetric_eigen3(&m);
        for k in 0..3 {
            for i in 0..3 {
                let mv: f64 = (0..3).map(|j| m[i][j] * vectors[k][j]).sum();
                assert!((mv - values[k] * vectors[k][i]).abs() < 1e-9, "k={k} i={i}");
            }
        }
        let trace: f64 = values.iter().sum();
        assert!((trace - 13.0).abs() < 1e-9);
    }

    #[test]
    fn larger_symmetric_matrix() {
        // Path graph Laplacian on 4 nodes: eigenvalues 2 - 2cos(k*pi/4).
        let m = [
            1.0, -1.0, 0.0, 0.0, //
            -1.0, 2.0, -1.0, 0.0, //
            0.0, -1.0, 2.0, -1.0, //
            0.0, 0.0, -1.0, 1.0,
        ];
        let eig = symmetric_eigen(&m, 4);
        let mut expected: Vec<f64> = (0..4)
            .map(|k| 2.0 - 2.0 * (k as f64 * std::f64::consts::PI / 4.0).cos())
            .collect();
        expected.sort_by(|a, b| b.total_cmp(a));
        for (got, want) in eig.values.iter().zip(&expected) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
    }

    #[test]
    fn svd_of_planar_points() {
        let pts = [[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, -2.0, 0.0]];
        let svd = svd_n3(&pts);
        assert!(svd.singular_values[2].abs() < 1e-9);
        assert!((svd.vt[2][2].abs() - 1.0).abs() < 1e-9, "normal is z");
        assert!((svd.singular_values[0] - 8.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn pseudo_inverse_of_full_rank() {
        let m = [[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 0.5]];
        let inv = pseudo_inverse3(&m);
        assert!((inv[0][0] - 0.5).abs() < 1e-12);
        assert!((inv[1][1] - 0.25).abs() < 1e-12);
        assert!((inv[2][2] - 2.0).abs() < 1e-12);
    }
}
