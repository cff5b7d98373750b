//! Column standardisation fit on training data and reused at inference.

use std::fmt;

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};

use crate::data::validate_data;

/// Per-column z-score scaler (population standard deviation).
///
/// Constant columns keep a scale of 1.0 so they map to zero rather than NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(data: &[f64], n_features: usize) -> Result<Self> {
        let n_rows = validate_data(data, n_features)?;
        let nf = n_rows as f64;
        let mut mean = vec![0.0; n_features];
        for row in data.chunks_exact(n_features) {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= nf);

        let mut var = vec![0.0; n_features];
        for row in data.chunks_exact(n_features) {
            for ((s, v), m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (v - m).powi(2);
            }
        }
        let scale = var
            .iter()
            .map(|s| {
                let std = (s / nf).sqrt();
                if std > 1e-12 && std.is_finite() {
                    std
                } else {
                    1.0
                }
            })
            .collect();
        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn transform(&self, data: &[f64]) -> Result<Vec<f64>> {
        validate_data(data, self.n_features())?;
        let mut out = data.to_vec();
        for row in out.chunks_exact_mut(self.n_features()) {
            for ((v, m), s) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
                *v = (*v - m) / s;
            }
        }
        Ok(out)
    }

    pub fn fit_transform(data: &[f64], n_features: usize) -> Result<(Self, Vec<f64>)> {
        let scaler = Self::fit(data, n_features)?;
        let scaled = scaler.transform(data)?;
        Ok((scaler, scaled))
    }

    pub fn inverse_transform(&self, data: &[f64]) -> Result<Vec<f64>> {
        if data.len() % self.n_features().max(1) != 0 {
            return Err(QsarError::InvalidInput("data does not match scaler width".into()));
        }
        let mut out = data.to_vec();
        for row in out.chunks_exact_mut(self.n_features()) {
            for ((v, m), s) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
                *v = *v * s + m;
            }
        }
        Ok(out)
    }
}

impl fmt::Display for StandardScaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StandardScaler(n_features={})", self.n_features())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn columns_get_zero_mean_unit_variance() {
        let data = vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0];
        let (scaler, scaled) = StandardScaler::fit_transform(&data, 2).unwrap();
        assert_eq!(scaler.mean(), &[2.0, 20.0]);
        for c in 0..2 {
            let col: Vec<f64> = (0..3).map(|r| scaled[r * 2 + c]).collect();
            let mean = col.iter().sum::<f64>() / 3.0;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_column_maps_to_zero() {
        let data = vec![5.0, 1.0, 5.0, 2.0];
        let (scaler, scaled) = StandardScaler::fit_transform(&data, 2).unwrap();
        assert_eq!(scaler.scale()[0], 1.0);
        assert_eq!(scaled[0], 0.0);
        assert_eq!(scaled[2], 0.0);
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let scaler = StandardScaler::fit(&[1.0, 2.0, 3.0, 4.0], 2).unwrap();
        assert!(scaler.transform(&[1.0, 2.0, 3.0]).is_err());
        assert_eq!(scaler.to_string(), "StandardScaler(n_features=2)");
    }

    proptest! {
        #[test]
        fn inverse_round_trips(rows in proptest::collection::vec(proptest::collection::vec(-1e3f64..1e3, 3), 2..20)) {
            let data = rows.concat();
            let (scaler, scaled) = StandardScaler::fit_transform(&data, 3).unwrap();
            let back = scaler.inverse_transform(&scaled).unwrap();
            for (a, b) in data.iter().zip(&back) {
                prop_assert!((a - b).abs() < 1e-6);
            }
        }
    }
}
