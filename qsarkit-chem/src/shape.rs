//! Principal moments of inertia and plane-of-best-fit deviation.
//!
//! Both work on raw coordinates with unit weight per atom, centered on the
//! geometric centroid.

use crate::conformer::Conformer;
use crate::linalg::{dot3, svd_n3, symmetric_eigen3, Matrix3};

/// Principal moments (descending) and, when their sum is positive, the same
/// moments divided by that sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrincipalMoments {
    pub pmi: [f64; 3],
    pub normalized: Option<[f64; 3]>,
}

/// Inertia tensor of centroid-centered coordinates.
pub fn inertia_tensor(conf: &Conformer) -> Matrix3 {
    let mut t = [[0.0; 3]; 3];
    for [x, y, z] in conf.centered() {
        t[0][0] += y * y + z * z;
        t[1][1] += x * x + z * z;
        t[2][2] += x * x + y * y;
        t[0][1] -= x * y;
        t[0][2] -= x * z;
        t[1][2] -= y * z;
    }
    t[1][0] = t[0][1];
    t[2][0] = t[0][2];
    t[2][1] = t[1][2];
    t
}

/// PMI1 ≥ PMI2 ≥ PMI3.
pub fn principal_moments(conf: &Conformer) -> PrincipalMoments {
    let (values, _) = symmetric_eigen3(&inertia_tensor(conf));
    // Jacobi round-off can leave tiny negatives on degenerate geometries.
    let pmi = values.map(|v| if v.abs() < 1e-12 { 0.0 } else { v });
    let sum: f64 = pmi.iter().sum();
    let normalized = (sum > 0.0).then(|| pmi.map(|v| v / sum));
    PrincipalMoments { pmi, normalized }
}

/// Mean absolute distance of the centered atoms from their best-fit plane.
///
/// The plane normal is the right singular vector with the smallest singular
/// value. Zero for fewer than three atoms or a planar molecule.
pub fn plane_of_best_fit(conf: &Conformer) -> f64 {
    if conf.is_empty() {
        return 0.0;
    }
    let centered = conf.centered();
    let normal = svd_n3(&centered).vt[2];
    let total: f64 = centered.iter().map(|&p| dot3(p, normal).abs()).sum();
    total / centered.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn linear_molecule_has_one_zero_moment() {
        let conf = Conformer::new(vec![[-1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let pm = principal_moments(&conf);
        assert!((pm.pmi[0] - 2.0).abs() < 1e-9);
        assert!((pm.pmi[1] - 2.0).abs() < 1e-9);
        assert!(pm.pmi[2].abs() < 1e-9);
        let norm = pm.normalized.unwrap();
        assert!((norm.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn single_atom_skips_normalisation() {
        let pm = principal_moments(&Conformer::new(vec![[3.0, -1.0, 2.0]]));
        assert_eq!(pm.pmi, [0.0; 3]);
        assert!(pm.normalized.is_none());
    }

    #[test]
    fn planar_points_fit_exactly() {
        let conf = Conformer::new(vec![[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0]]);
        assert!(plane_of_best_fit(&conf) < 1e-9);
    }

    #[test]
    fn tetrahedron_deviates_from_plane() {
        let conf = Conformer::new(vec![
            [1.0, 1.0, 1.0],
            [1.0, -1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
        ]);
        // Any plane through the centroid; every vertex sits 1/sqrt(3)·sqrt(3) = 1 away.
        assert!((plane_of_best_fit(&conf) - 1.0).abs() < 1e-9);
        let pm = principal_moments(&conf);
        assert!((pm.pmi[0] - pm.pmi[2]).abs() < 1e-9, "spherical top");
    }

    proptest! {
        #[test]
        fn moments_are_ordered_and_normalised(
            pts in proptest::collection::vec(
                (-5.0f64..5.0, -5.0f64..5.0, -5.0f64..5.0), 1..30)
        ) {
            let conf = Conformer::new(pts.into_iter().map(|(x, y, z)| [x, y, z]).collect());
            let pm = principal_moments(&conf);
            prop_assert!(pm.pmi[0] >= pm.pmi[1] && pm.pmi[1] >= pm.pmi[2]);
            if let Some(norm) = pm.normalized {
                prop_assert!((norm.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            }
            prop_assert!(plane_of_best_fit(&conf) >= 0.0);
        }
    }
}
