//! Per-atom xyz coordinates produced by embedding and consumed by the 3D
//! descriptor families.

use qsarkit_core::{QsarError, Result};

use crate::linalg::{dot3, norm3, sub3};

/// A single 3D conformer: one set of xyz coordinates per atom.
#[derive(Debug, Clone, PartialEq)]
pub struct Conformer {
    /// `coords[i]` is `[x, y, z]` for atom `i`.
    pub coords: Vec<[f64; 3]>,
}

impl Conformer {
    pub fn new(coords: Vec<[f64; 3]>) -> Self {
        Conformer { coords }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Euclidean distance between two atoms.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        norm3(sub3(self.coords[i], self.coords[j]))
    }

    /// Geometric centroid of all atoms.
    pub fn centroid(&self) -> [f64; 3] {
        if self.coords.is_empty() {
            return [0.0; 3];
        }
        let n = self.coords.len() as f64;
        let mut c = [0.0; 3];
        for p in &self.coords {
            for d in 0..3 {
                c[d] += p[d];
            }
        }
        c.map(|v| v / n)
    }

    /// Coordinates translated so the centroid sits at the origin.
    pub fn centered(&self) -> Vec<[f64; 3]> {
        let c = self.centroid();
        self.coords.iter().map(|&p| sub3(p, c)).collect()
    }

    /// Root-mean-square deviation from another conformer (same atom count).
    pub fn rmsd(&self, other: &Conformer) -> Result<f64> {
        if self.coords.len() != other.coords.len() {
            return Err(QsarError::InvalidInput(
                "conformers must have the same number of atoms for RMSD".into(),
            ));
        }
        if self.coords.is_empty() {
            return Ok(0.0);
        }
        let sum: f64 = self
            .coords
            .iter()
            .zip(&other.coords)
            .map(|(&a, &b)| {
                let d = sub3(a, b);
                dot3(d, d)
            })
            .sum();
        Ok((sum / self.coords.len() as f64).sqrt())
    }

    /// Whether every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.coords.iter().flatten().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_triangle() -> Conformer {
        Conformer::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
    }

    #[test]
    fn distances() {
        let c = make_triangle();
        assert!((c.distance(0, 1) - 1.0).abs() < 1e-10);
        assert!((c.distance(1, 2) - 2.0_f64.sqrt()).abs() < 1e-10);
        assert!(c.is_finite());
        assert!(!Conformer::new(vec![[f64::NAN, 0.0, 0.0]]).is_finite());
    }

    #[test]
    fn centroid_and_centering() {
        let c = make_triangle();
        let ctr = c.centroid();
        assert!((ctr[0] - 1.0 / 3.0).abs() < 1e-10);
        assert!(ctr[2].abs() < 1e-10);
        let centered = Conformer::new(c.centered());
        assert!(centered.centroid().iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn rmsd_behaviour() {
        let c1 = Conformer::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let c2 = Conformer::new(vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        assert!((c1.rmsd(&c2).unwrap() - 0.5_f64.sqrt()).abs() < 1e-10);
        assert!(c1.rmsd(&c1).unwrap().abs() < 1e-12);
        assert!(c1.rmsd(&Conformer::new(vec![[0.0; 3]])).is_err());
    }
}
