//! Labute approximate surface area and E-state binned VSA descriptors.

use crate::descriptors::estate_indices;
use crate::molecule::{BondOrder, Molecule};

/// Upper bin edges for EState_VSA1..EState_VSA10; values at or above the
/// last edge fall into EState_VSA11.
pub const ESTATE_VSA_BINS: [f64; 10] = [-0.39, 0.29, 0.717, 1.165, 1.54, 1.807, 2.05, 4.69, 9.17, 15.0];

/// Number of EState_VSA bins.
pub const ESTATE_VSA_COUNT: usize = ESTATE_VSA_BINS.len() + 1;

/// Sphere radius (Å) used for the Labute surface of an element.
fn labute_radius(z: u8) -> f64 {
    match z {
        1 => 0.33,
        5 => 0.82,
        6 => 0.77,
        7 => 0.70,
        8 => 0.66,
        9 => 0.611,
        14 => 1.17,
        15 => 1.10,
        16 => 1.04,
        17 => 0.99,
        34 => 1.17,
        35 => 1.14,
        53 => 1.33,
        _ => 1.20,
    }
}

fn bond_shrink(order: BondOrder) -> f64 {
    match order {
        BondOrder::Single => 0.0,
        BondOrder::Aromatic => 0.1,
        BondOrder::Double => 0.2,
        BondOrder::Triple => 0.3,
    }
}

/// Area of sphere `ri` cut by a sphere `rj` whose center is `bij` away, as
/// the overlap term `(rj² − (ri − d)²) / d` with `d` clamped to a valid range.
fn overlap(ri: f64, rj: f64, bij: f64) -> f64 {
    let d = bij.max((ri - rj).abs()).min(ri + rj);
    if d <= 0.0 {
        return 0.0;
    }
    (rj * rj - (ri - d) * (ri - d)) / d
}

/// Per-atom Labute ASA contributions plus the pooled hydrogen contribution.
///
/// Each atom is a sphere whose exposed area is 4πr² minus the caps cut off
/// by bonded neighbours; implicit hydrogens are treated as bonded spheres.
pub fn labute_contributions(mol: &Molecule) -> (Vec<f64>, f64) {
    let n = mol.atom_count();
    let radii: Vec<f64> = mol.atoms.iter().map(|a| labute_radius(a.atomic_number)).collect();
    let mut cut = vec![0.0; n];
    for bond in &mol.bonds {
        let (i, j) = (bond.atom1, bond.atom2);
        let order = if bond.is_aromatic { BondOrder::Aromatic } else { bond.order };
        let bij = radii[i] + radii[j] - bond_shrink(order);
        cut[i] += overlap(radii[i], radii[j], bij);
        cut[j] += overlap(radii[j], radii[i], bij);
    }

    let rh = labute_radius(1);
    let mut h_cut = 0.0;
    let mut h_total = 0usize;
    for (i, atom) in mol.atoms.iter().enumerate() {
        let nh = atom.implicit_hydrogens as usize;
        if nh == 0 {
            continue;
        }
        let bij = radii[i] + rh;
        cut[i] += nh as f64 * overlap(radii[i], rh, bij);
        h_cut += nh as f64 * overlap(rh, radii[i], bij);
        h_total += nh;
    }

    let pi = std::f64::consts::PI;
    let contribs = (0..n).map(|i| 4.0 * pi * radii[i] * radii[i] - pi * radii[i] * cut[i]).collect();
    let h_contrib = h_total as f64 * 4.0 * pi * rh * rh - pi * rh * h_cut;
    (contribs, h_contrib)
}

/// Labute's approximate surface area (Å²).
pub fn labute_asa(mol: &Molecule) -> f64 {
    let (contribs, h) = labute_contributions(mol);
    contribs.iter().sum::<f64>() + h
}

/// Bin index for an E-state value.
fn estate_bin(value: f64) -> usize {
    ESTATE_VSA_BINS.iter().position(|&edge| value < edge).unwrap_or(ESTATE_VSA_BINS.len())
}

/// EState_VSA1..EState_VSA11: Labute ASA summed over atoms whose E-state
/// index falls in each bin.
pub fn estate_vsa(mol: &Molecule) -> [f64; ESTATE_VSA_COUNT] {
    let (contribs, _) = labute_contributions(mol);
    let estate = estate_indices(mol);
    let mut bins = [0.0; ESTATE_VSA_COUNT];
    for (s, area) in estate.iter().zip(&contribs) {
        bins[estate_bin(*s)] += area;
    }
    bins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    #[test]
    fn isolated_atoms_have_full_sphere_area() {
        let mol = parse_smiles("[Ne]").unwrap();
        let asa = labute_asa(&mol);
        assert!((asa - 4.0 * std::f64::consts::PI * 1.2 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn asa_grows_with_size() {
        let ethane = labute_asa(&parse_smiles("CC").unwrap());
        let butane = labute_asa(&parse_smiles("CCCC").unwrap());
        let octane = labute_asa(&parse_smiles("CCCCCCCC").unwrap());
        assert!(ethane > 0.0);
        assert!(butane > ethane && octane > butane);
    }

    #[test]
    fn multiple_bonds_bury_more_surface() {
        let ethane = labute_contributions(&parse_smiles("CC").unwrap()).0[0];
        let ethene = labute_contributions(&parse_smiles("C=C").unwrap()).0[0];
        let ethyne = labute_contributions(&parse_smiles("C#C").unwrap()).0[0];
        assert!(ethane > ethene && ethene > ethyne);
    }

    #[test]
    fn bins_partition_heavy_atom_area() {
        let mol = parse_smiles("CC(=O)Oc1ccccc1C(=O)O").unwrap();
        let (contribs, _) = labute_contributions(&mol);
        let bins = estate_vsa(&mol);
        assert!((bins.iter().sum::<f64>() - contribs.iter().sum::<f64>()).abs() < 1e-9);
        assert_eq!(bins.len(), 11);
    }

    #[test]
    fn bin_edges_are_exclusive_upper_bounds() {
        assert_eq!(estate_bin(-1.0), 0);
        assert_eq!(estate_bin(-0.39), 1);
        assert_eq!(estate_bin(1.0), 3);
        assert_eq!(estate_bin(15.0), 10);
        assert_eq!(estate_bin(100.0), 10);
    }
}
