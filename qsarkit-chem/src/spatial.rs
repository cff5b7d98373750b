//! Whole-molecule 3D descriptors: WHIM, GETAWAY and 3D-MoRSE.
//!
//! Each family is computed independently and returns its own `Result`, so a
//! caller can keep whichever groups succeed.

use std::collections::BTreeMap;

use qsarkit_core::{QsarError, Result};

use crate::conformer::Conformer;
use crate::linalg::{dot3, norm3, pseudo_inverse3, sub3, symmetric_eigen3, Matrix3};

/// Number of values each family emits.
pub const WHIM_COUNT: usize = 7;
pub const GETAWAY_COUNT: usize = 5;
pub const MORSE_COUNT: usize = 5;

fn check(conf: &Conformer) -> Result<()> {
    if conf.is_empty() {
        return Err(QsarError::InvalidInput("conformer has no atoms".into()));
    }
    if !conf.is_finite() {
        return Err(QsarError::InvalidInput("conformer has non-finite coordinates".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// WHIM
// ---------------------------------------------------------------------------

/// Mass-weighted WHIM: λ1, λ2, λ3, T, A, K, V.
///
/// λ are the eigenvalues of the weighted covariance of the coordinates,
/// T = Σλ, A = λ1λ2 + λ1λ3 + λ2λ3, V = T + A + λ1λ2λ3 and K is the
/// shape anisotropy Σ|λm/T − 1/3| / (4/3).
pub fn whim(conf: &Conformer, weights: &[f64]) -> Result<[f64; WHIM_COUNT]> {
    check(conf)?;
    if weights.len() != conf.len() {
        return Err(QsarError::InvalidInput(format!(
            "{} weights for {} atoms",
            weights.len(),
            conf.len()
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(QsarError::InvalidInput("WHIM weights sum to zero".into()));
    }

    let mut center = [0.0; 3];
    for (p, w) in conf.coords.iter().zip(weights) {
        for d in 0..3 {
            center[d] += w * p[d] / total;
        }
    }
    let mut cov: Matrix3 = [[0.0; 3]; 3];
    for (p, w) in conf.coords.iter().zip(weights) {
        let c = sub3(*p, center);
        for i in 0..3 {
            for j in 0..3 {
                cov[i][j] += w * c[i] * c[j] / total;
            }
        }
    }

    let (values, _) = symmetric_eigen3(&cov);
    let [l1, l2, l3] = values.map(|v| v.max(0.0));
    let t = l1 + l2 + l3;
    let a = l1 * l2 + l1 * l3 + l2 * l3;
    let v = t + a + l1 * l2 * l3;
    let k = if t > 0.0 {
        [l1, l2, l3].iter().map(|l| (l / t - 1.0 / 3.0).abs()).sum::<f64>() / (4.0 / 3.0)
    } else {
        0.0
    };
    Ok([l1, l2, l3, t, a, k, v])
}

// ---------------------------------------------------------------------------
// GETAWAY
// ---------------------------------------------------------------------------

/// Leverage of each atom: diagonal of H = X (XᵀX)⁺ Xᵀ on centered coordinates.
pub fn leverages(conf: &Conformer) -> Vec<f64> {
    let centered = conf.centered();
    let mut xtx: Matrix3 = [[0.0; 3]; 3];
    for p in &centered {
        for i in 0..3 {
            for j in 0..3 {
                xtx[i][j] += p[i] * p[j];
            }
        }
    }
    let inv = pseudo_inverse3(&xtx);
    centered
        .iter()
        .map(|p| {
            let q = [dot3(inv[0], *p), dot3(inv[1], *p), dot3(inv[2], *p)];
            dot3(*p, q).max(0.0)
        })
        .collect()
}

/// GETAWAY summary indices: ITH, ISH, HGM, HATS0, RARS.
///
/// - ITH: information content of the leverage distribution (atoms grouped by
///   leverage to three decimals)
/// - ISH: ITH standardised by n·log2(n)
/// - HGM: 100 × geometric mean of the leverages
/// - HATS0: Σ h_ii², the unweighted lag-0 leverage autocorrelation
/// - RARS: mean row sum of the influence/distance matrix √(h_ii h_jj) / r_ij
pub fn getaway(conf: &Conformer) -> Result<[f64; GETAWAY_COUNT]> {
    check(conf)?;
    let h = leverages(conf);
    let n = h.len();
    let nf = n as f64;

    let mut groups: BTreeMap<i64, usize> = BTreeMap::new();
    for &v in &h {
        *groups.entry((v * 1000.0).round() as i64).or_default() += 1;
    }
    let ith = nf * nf.log2() - groups.values().map(|&g| g as f64 * (g as f64).log2()).sum::<f64>();
    let ish = if n > 1 { ith / (nf * nf.log2()) } else { 0.0 };

    let positive: Vec<f64> = h.iter().copied().filter(|&v| v > 1e-12).collect();
    let hgm = if positive.len() == n && n > 0 {
        100.0 * (positive.iter().map(|v| v.ln()).sum::<f64>() / nf).exp()
    } else {
        0.0
    };

    let hats0 = h.iter().map(|v| v * v).sum();

    let mut row_sums = vec![0.0; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let r = norm3(sub3(conf.coords[i], conf.coords[j]));
            if r < 1e-9 {
                return Err(QsarError::InvalidInput(format!("atoms {i} and {j} coincide")));
            }
            let v = (h[i] * h[j]).sqrt() / r;
            row_sums[i] += v;
            row_sums[j] += v;
        }
    }
    let rars = row_sums.iter().sum::<f64>() / nf;

    Ok([ith, ish, hgm, hats0, rars])
}

// ---------------------------------------------------------------------------
// 3D-MoRSE
// ---------------------------------------------------------------------------

/// Unweighted MoRSE signal I(s) = Σ_{i<j} sin(s·r_ij) / (s·r_ij) at
/// s = 0, 1, 2, 3, 4 Å⁻¹. At s = 0 every pair contributes 1.
pub fn morse(conf: &Conformer) -> Result<[f64; MORSE_COUNT]> {
    check(conf)?;
    let mut out = [0.0; MORSE_COUNT];
    let n = conf.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let r = conf.distance(i, j);
            for (k, slot) in out.iter_mut().enumerate() {
                let x = k as f64 * r;
                *slot += if x.abs() < 1e-12 { 1.0 } else { x.sin() / x };
            }
        }
    }
    Ok(out)
}
