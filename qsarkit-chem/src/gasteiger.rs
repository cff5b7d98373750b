//! Gasteiger-Marsili partial charge calculation.
//!
//! Iterative partial equalization of orbital electronegativity over the
//! hydrogen-completed graph. Used by the 2D charge descriptors and the force
//! field electrostatic terms.

use qsarkit_core::{QsarError, Result};

use crate::hydrogens::add_hydrogens;
use crate::molecule::{Hybridization, Molecule};

const ITERATIONS: usize = 12;

/// Cation electronegativity used for hydrogen in place of a + b + c.
const HYDROGEN_CHI_PLUS: f64 = 20.02;

/// Electronegativity coefficients (a, b, c) for the equation:
/// χ = a + b·q + c·q²
/// where q is the partial charge on the atom.
///
/// Source: Gasteiger & Marsili, Tetrahedron 36, 3219 (1980).
#[derive(Debug, Clone, Copy)]
struct ElectroParams {
    a: f64,
    b: f64,
    c: f64,
}

impl ElectroParams {
    const fn new(a: f64, b: f64, c: f64) -> Self {
        ElectroParams { a, b, c }
    }

    fn chi(&self, q: f64) -> f64 {
        self.a + self.b * q + self.c * q * q
    }

    fn chi_plus(&self) -> f64 {
        self.a + self.b + self.c
    }
}

fn electro_params(atomic_number: u8, hybridization: Hybridization) -> Option<ElectroParams> {
    use Hybridization::*;
    Some(match (atomic_number, hybridization) {
        (1, _) => ElectroParams::new(7.17, 6.24, -0.56),
        (5, _) => ElectroParams::new(5.98, 6.82, 1.605),
        (6, SP3) => ElectroParams::new(7.98, 9.18, 1.88),
        (6, SP2) => ElectroParams::new(8.79, 9.32, 1.51),
        (6, _) => ElectroParams::new(10.39, 9.45, 0.73),
        (7, SP3) => ElectroParams::new(11.54, 10.82, 1.36),
        (7, SP2) => ElectroParams::new(12.87, 11.15, 0.85),
        (7, _) => ElectroParams::new(15.68, 11.70, -0.27),
        (8, SP3) => ElectroParams::new(14.18, 12.92, 1.39),
        (8, _) => ElectroParams::new(17.07, 13.79, 0.47),
        (9, _) => ElectroParams::new(14.66, 13.85, 2.31),
        (14, _) => ElectroParams::new(7.30, 6.567, 0.657),
        (15, _) => ElectroParams::new(8.90, 8.24, 0.96),
        (16, SP3) => ElectroParams::new(10.14, 9.13, 1.38),
        (16, _) => ElectroParams::new(10.88, 9.485, 1.325),
        (17, _) => ElectroParams::new(11.00, 9.69, 1.35),
        (34, _) => ElectroParams::new(10.00, 8.80, 1.20),
        (35, _) => ElectroParams::new(10.08, 8.47, 1.16),
        (53, _) => ElectroParams::new(9.90, 7.96, 0.96),
        _ => return None,
    })
}

/// Compute Gasteiger-Marsili partial charges, one per atom of `mol`.
///
/// Implicit hydrogens take part in the equalization; their charge is not
/// returned. Isolated atoms keep their formal charge. Bonded atoms of an
/// element without parameters give `QsarError::Unsupported`.
///
/// # Example
///
/// ```
/// use qsarkit_chem::{parse_smiles, gasteiger_charges};
///
/// let mol = parse_smiles("CCO").unwrap();
/// let charges = gasteiger_charges(&mol).unwrap();
/// assert_eq!(charges.len(), 3);
/// assert!(charges[2] < 0.0);
/// ```
pub fn gasteiger_charges(mol: &Molecule) -> Result<Vec<f64>> {
    let n = mol.atom_count();
    if n == 0 {
        return Ok(Vec::new());
    }
    let full = add_hydrogens(mol);

    let params: Vec<Option<ElectroParams>> = (0..full.atom_count())
        .map(|i| {
            let atom = &full.atoms[i];
            let p = electro_params(atom.atomic_number, full.hybridization(i));
            if p.is_none() && full.degree(i) > 0 {
                return Err(QsarError::Unsupported(format!(
                    "no Gasteiger parameters for element {} (atom {i})",
                    atom.atomic_number
                )));
            }
            Ok(p)
        })
        .collect::<Result<_>>()?;

    let mut charges: Vec<f64> = full.atoms.iter().map(|a| a.formal_charge as f64).collect();
    let mut damping = 1.0;
    for _ in 0..ITERATIONS {
        damping *= 0.5;
        let chi: Vec<f64> = params
            .iter()
            .zip(&charges)
            .map(|(p, &q)| p.map_or(0.0, |p| p.chi(q)))
            .collect();
        let mut delta = vec![0.0_f64; full.atom_count()];

        for bond in &full.bonds {
            let (i, j) = (bond.atom1, bond.atom2);
            let (Some(pi), Some(pj)) = (params[i], params[j]) else {
                continue;
            };
            // Electrons move toward the more electronegative atom; the
            // donor's cation electronegativity scales the transfer.
            let (donor, donor_params) = if chi[j] > chi[i] { (i, pi) } else { (j, pj) };
            let chi_plus = if full.atoms[donor].atomic_number == 1 {
                HYDROGEN_CHI_PLUS
            } else {
                donor_params.chi_plus()
            };
            if chi_plus.abs() < 1e-12 {
                continue;
            }
            let transfer = damping * (chi[j] - chi[i]) / chi_plus;
            delta[i] += transfer;
            delta[j] -= transfer;
        }

        for (q, d) in charges.iter_mut().zip(&delta) {
            *q += d;
        }
    }

    charges.truncate(n);
    Ok(charges)
}
