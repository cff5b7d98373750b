//! Graph-based molecular descriptors: TPSA, Wildman-Crippen logP/MR and
//! electrotopological state indices.
//!
//! All functions expect a hydrogen-suppressed graph with hydrogens carried as
//! implicit counts.

use std::collections::VecDeque;

use crate::element::element_by_number;
use crate::molecule::{BondOrder, Molecule};
use crate::ring::RingInfo;

// ---------------------------------------------------------------------------
// Shortest path matrix (BFS from each atom)
// ---------------------------------------------------------------------------

/// Topological distances in bonds; `usize::MAX` between disconnected atoms.
pub fn shortest_path_matrix(mol: &Molecule) -> Vec<Vec<usize>> {
    let n = mol.atom_count();
    let mut dist = vec![vec![usize::MAX; n]; n];

    for start in 0..n {
        dist[start][start] = 0;
        let mut queue = VecDeque::new();
        queue.push_back(start);
        while let Some(curr) = queue.pop_front() {
            for &(neighbor, _) in &mol.adjacency[curr] {
                if dist[start][neighbor] == usize::MAX {
                    dist[start][neighbor] = dist[start][curr] + 1;
                    queue.push_back(neighbor);
                }
            }
        }
    }
    dist
}

// ---------------------------------------------------------------------------
// Neighbourhood summary shared by the typing rules
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BondCensus {
    single: usize,
    double: usize,
    triple: usize,
    aromatic: usize,
}

fn bond_census(mol: &Molecule, idx: usize) -> BondCensus {
    let mut census = BondCensus::default();
    for &(_, bi) in &mol.adjacency[idx] {
        match mol.bonds[bi].order {
            BondOrder::Single => census.single += 1,
            BondOrder::Double => census.double += 1,
            BondOrder::Triple => census.triple += 1,
            BondOrder::Aromatic => census.aromatic += 1,
        }
    }
    census
}

/// Neighbour joined to `idx` by a bond of the given order.
fn partner_by_order(mol: &Molecule, idx: usize, order: BondOrder) -> Option<usize> {
    mol.adjacency[idx]
        .iter()
        .find(|&&(_, bi)| mol.bonds[bi].order == order)
        .map(|&(n, _)| n)
}

fn is_halogen(z: u8) -> bool {
    matches!(z, 9 | 17 | 35 | 53)
}

// ---------------------------------------------------------------------------
// Topological polar surface area
// ---------------------------------------------------------------------------

/// Topological Polar Surface Area (Ertl 2000), nitrogen and oxygen
/// contributions only.
pub fn tpsa(mol: &Molecule) -> f64 {
    let rings = RingInfo::new(mol);
    (0..mol.atom_count()).map(|i| tpsa_contribution(mol, i, &rings)).sum()
}

/// Polar surface contribution of one atom.
pub fn tpsa_contribution(mol: &Molecule, idx: usize, rings: &RingInfo) -> f64 {
    let atom = &mol.atoms[idx];
    let h = mol.total_hydrogens(idx);
    let heavy = mol.heavy_degree(idx);
    let c = bond_census(mol, idx);
    let in_three_ring = rings.atom_in_ring_of_size(idx, 3);
    let charge = atom.formal_charge;

    match atom.atomic_number {
        7 if atom.is_aromatic => match (c.aromatic, c.single + c.double, h, charge) {
            (2, 0, 0, 0) => 12.89,
            (3, 0, 0, 0) => 4.41,
            (2, 1, 0, 0) if c.double == 1 => 8.39,
            (2, 1, 0, 0) => 4.93,
            (2, 0, 1, 0) => 15.79,
            (3, 0, 0, 1) => 4.10,
            (2, 1, 0, 1) => 3.88,
            (2, 0, 1, 1) => 14.14,
            _ => fallback_n(heavy, h),
        },
        7 => match (c.single, c.double, c.triple, h, charge) {
            (3, 0, 0, 0, 0) if in_three_ring => 3.01,
            (3, 0, 0, 0, 0) => 3.24,
            (1, 1, 0, 0, 0) => 12.36,
            (0, 0, 1, 0, 0) => 23.79,
            (1, 2, 0, 0, 0) => 11.68,
            (0, 1, 1, 0, 0) => 13.60,
            (2, 0, 0, 1, 0) if in_three_ring => 21.94,
            (2, 0, 0, 1, 0) => 12.03,
            (0, 1, 0, 1, 0) => 23.85,
            (1, 0, 0, 2, 0) => 26.02,
            (4, 0, 0, 0, 1) => 0.00,
            (2, 1, 0, 0, 1) => 3.01,
            (1, 0, 1, 0, 1) => 4.36,
            (3, 0, 0, 1, 1) => 4.44,
            (1, 1, 0, 1, 1) => 13.97,
            (2, 0, 0, 2, 1) => 16.61,
            (0, 1, 0, 2, 1) => 25.59,
            (1, 0, 0, 3, 1) => 27.64,
            _ => fallback_n(heavy, h),
        },
        8 if atom.is_aromatic => 13.14,
        8 => match (c.single, c.double, h, charge) {
            (2, 0, 0, 0) if in_three_ring => 12.53,
            (2, 0, 0, 0) => 9.23,
            (0, 1, 0, 0) => 17.07,
            (1, 0, 1, 0) => 20.23,
            (1, 0, 0, -1) => 23.06,
            _ => (28.5 - 8.6 * heavy as f64 + 1.5 * h as f64).max(0.0),
        },
        _ => 0.0,
    }
}

fn fallback_n(heavy: usize, h: usize) -> f64 {
    (30.5 - 8.2 * heavy as f64 + 1.5 * h as f64).max(0.0)
}

// ---------------------------------------------------------------------------
// Wildman-Crippen logP and molar refractivity
// ---------------------------------------------------------------------------

/// Per-atom (logP, MR) contributions with attached hydrogens folded into
/// their parent atom.
pub fn crippen_contributions(mol: &Molecule) -> Vec<(f64, f64)> {
    (0..mol.atom_count())
        .map(|i| {
            let (mut lp, mut mr) = crippen_heavy(mol, i);
            let (hlp, hmr) = crippen_hydrogen(mol, i);
            let h = mol.atoms[i].implicit_hydrogens as f64;
            lp += h * hlp;
            mr += h * hmr;
            (lp, mr)
        })
        .collect()
}

/// Wildman-Crippen (logP, molar refractivity).
pub fn crippen_logp_mr(mol: &Molecule) -> (f64, f64) {
    crippen_contributions(mol)
        .into_iter()
        .fold((0.0, 0.0), |(lp, mr), (a, b)| (lp + a, mr + b))
}

fn crippen_heavy(mol: &Molecule, idx: usize) -> (f64, f64) {
    let atom = &mol.atoms[idx];
    match atom.atomic_number {
        1 => crippen_hydrogen(mol, mol.adjacency[idx].first().map_or(idx, |&(n, _)| n)),
        6 if atom.is_aromatic => crippen_aromatic_carbon(mol, idx),
        6 => crippen_aliphatic_carbon(mol, idx),
        7 => crippen_nitrogen(mol, idx),
        8 => crippen_oxygen(mol, idx),
        9 | 17 | 35 | 53 if atom.formal_charge < 0 => (-2.996, 0.0),
        9 => (0.4202, 1.108),
        17 => (0.6895, 5.853),
        35 => (0.8456, 8.927),
        53 => (0.8857, 14.02),
        15 => (0.8612, 6.920),
        16 if atom.is_aromatic => (0.6237, 6.691),
        16 if atom.formal_charge != 0 => (-0.0024, 7.365),
        16 => (0.6482, 7.591),
        3 | 11 | 19 | 37 | 4 | 12 | 20 | 38 => (-0.3808, 5.754),
        _ => (-0.0025, 0.0),
    }
}

fn crippen_aromatic_carbon(mol: &Molecule, idx: usize) -> (f64, f64) {
    let c = bond_census(mol, idx);
    if let Some(p) = partner_by_order(mol, idx, BondOrder::Double) {
        if matches!(mol.atoms[p].atomic_number, 6 | 7 | 8) {
            return (-0.8186, 3.135);
        }
    }
    if mol.total_hydrogens(idx) > 0 {
        return (0.1581, 3.35);
    }
    if c.aromatic >= 3 {
        return (0.2955, 4.346);
    }
    let substituent = mol.adjacency[idx]
        .iter()
        .find(|&&(_, bi)| mol.bonds[bi].order == BondOrder::Single)
        .map(|&(n, _)| n);
    match substituent {
        Some(s) if mol.atoms[s].is_aromatic => (0.2713, 3.904),
        Some(s) => match mol.atoms[s].atomic_number {
            9 => (0.0, 3.257),
            17 => (0.245, 3.564),
            35 => (0.198, 3.18),
            53 => (0.0, 3.104),
            6 => (0.136, 3.509),
            7 => (0.4619, 3.067),
            8 => (0.5437, 3.853),
            16 => (0.1893, 2.673),
            _ => (-0.5443, 4.041),
        },
        None => (0.08129, 3.243),
    }
}

fn crippen_aliphatic_carbon(mol: &Molecule, idx: usize) -> (f64, f64) {
    let c = bond_census(mol, idx);
    if c.triple > 0 {
        return (0.0017, 3.888);
    }
    if let Some(p) = partner_by_order(mol, idx, BondOrder::Double) {
        let partner = &mol.atoms[p];
        if partner.atomic_number != 6 && !partner.is_aromatic {
            return (-0.2783, 5.007);
        }
        let aryl = partner.is_aromatic || mol.adjacency[idx].iter().any(|&(n, _)| mol.atoms[n].is_aromatic);
        return if aryl { (0.264, 4.305) } else { (0.1551, 3.513) };
    }

    let h = mol.total_hydrogens(idx);
    let neighbors: Vec<usize> = mol.neighbors(idx);
    if neighbors
        .iter()
        .any(|&n| !matches!(mol.atoms[n].atomic_number, 1 | 6 | 7 | 8 | 15 | 16) && !is_halogen(mol.atoms[n].atomic_number))
    {
        return (0.2148, 2.693);
    }
    if let Some(&aryl) = neighbors.iter().find(|&&n| mol.atoms[n].is_aromatic) {
        return match h {
            3.. if mol.atoms[aryl].atomic_number == 6 => (0.08452, 2.464),
            3.. => (-0.1444, 2.412),
            2 => (-0.0516, 2.488),
            1 => (0.1193, 2.582),
            _ => (-0.0967, 2.576),
        };
    }
    let hetero = neighbors.iter().any(|&n| !matches!(mol.atoms[n].atomic_number, 1 | 6));
    match (hetero, h) {
        (true, 2..) => (-0.2035, 2.753),
        (true, _) => (-0.2051, 2.731),
        (false, 2..) => (0.1441, 2.503),
        (false, _) => (0.0, 2.433),
    }
}

fn crippen_nitrogen(mol: &Molecule, idx: usize) -> (f64, f64) {
    let atom = &mol.atoms[idx];
    let h = mol.total_hydrogens(idx);
    if atom.is_aromatic {
        return if atom.formal_charge > 0 { (-1.119, 0.0) } else { (-0.3239, 2.202) };
    }
    if atom.formal_charge > 0 {
        return if h > 0 { (-1.950, 0.0) } else { (-0.3396, 0.2604) };
    }
    if atom.formal_charge < 0 {
        return (0.2887, 3.359);
    }
    let c = bond_census(mol, idx);
    if c.triple > 0 {
        return (0.01508, 1.725);
    }
    if c.double > 0 {
        return if h > 0 { (0.08387, 1.757) } else { (0.1836, 2.428) };
    }
    let aryl = mol.adjacency[idx].iter().any(|&(n, _)| mol.atoms[n].is_aromatic);
    match (h, aryl) {
        (2.., true) => (-1.027, 2.827),
        (2.., false) => (-1.019, 2.262),
        (1, true) => (-0.5188, 3.0),
        (1, false) => (-0.7096, 2.173),
        (_, true) => (-0.4458, 2.819),
        (_, false) => (-0.3187, 1.839),
    }
}

fn crippen_oxygen(mol: &Molecule, idx: usize) -> (f64, f64) {
    let atom = &mol.atoms[idx];
    if atom.is_aromatic {
        return (0.1552, 1.08);
    }
    if atom.formal_charge < 0 {
        let Some(&(p, _)) = mol.adjacency[idx].first() else {
            return (-1.189, 0.0);
        };
        return match mol.atoms[p].atomic_number {
            7 => (0.0335, 3.367),
            16 => (-0.3339, 0.7774),
            6 if partner_by_order(mol, p, BondOrder::Double)
                .is_some_and(|q| mol.atoms[q].atomic_number == 8) =>
            {
                (-1.326, 0.0)
            }
            _ => (-1.189, 0.0),
        };
    }
    if let Some(p) = partner_by_order(mol, idx, BondOrder::Double) {
        let partner = &mol.atoms[p];
        return match partner.atomic_number {
            7 | 8 => (0.0335, 3.367),
            15 | 16 => (-0.3339, 0.7774),
            6 if partner.is_aromatic => (0.1788, 3.135),
            6 => {
                let others: Vec<usize> = mol.neighbors(p).into_iter().filter(|&n| n != idx).collect();
                if others.iter().any(|&n| mol.atoms[n].is_aromatic) {
                    (0.1129, 0.2215)
                } else if others.iter().any(|&n| !matches!(mol.atoms[n].atomic_number, 1 | 6)) {
                    (0.4833, 0.389)
                } else {
                    (-0.1526, 0.0)
                }
            }
            _ => (-0.1188, 0.6865),
        };
    }
    if mol.total_hydrogens(idx) > 0 {
        return (-0.2893, 0.8238);
    }
    if mol.adjacency[idx].iter().any(|&(n, _)| mol.atoms[n].is_aromatic) {
        (-0.4195, 1.182)
    } else {
        (-0.0684, 1.085)
    }
}

/// Contribution of one hydrogen attached to `parent`.
fn crippen_hydrogen(mol: &Molecule, parent: usize) -> (f64, f64) {
    match mol.atoms[parent].atomic_number {
        6 => (0.123, 1.057),
        7 => (0.2142, 0.9627),
        8 => {
            let acidic = mol.adjacency[parent].iter().any(|&(n, _)| {
                let z = mol.atoms[n].atomic_number;
                matches!(z, 7 | 8 | 16)
                    || (z == 6
                        && mol.adjacency[n].iter().any(|&(m, bi)| {
                            m != parent
                                && mol.bonds[bi].order == BondOrder::Double
                                && matches!(mol.atoms[m].atomic_number, 6 | 7 | 8 | 16)
                        }))
            });
            let amine_like = mol.adjacency[parent].iter().any(|&(n, _)| mol.atoms[n].atomic_number == 7);
            if amine_like {
                (0.2142, 0.9627)
            } else if acidic {
                (0.298, 1.805)
            } else {
                (-0.2677, 1.395)
            }
        }
        _ => (-0.2677, 1.395),
    }
}

// ---------------------------------------------------------------------------
// Electrotopological state
// ---------------------------------------------------------------------------

/// Kier-Hall intrinsic state `I = ((2/N)^2 * dv + 1) / d` with `N` the
/// principal quantum number, `dv` outer electrons minus hydrogens and `d`
/// the heavy-atom degree. Isolated atoms get 0.
pub fn intrinsic_states(mol: &Molecule) -> Vec<f64> {
    (0..mol.atom_count())
        .map(|i| {
            let d = mol.heavy_degree(i);
            let Some(elem) = element_by_number(mol.atoms[i].atomic_number) else {
                return 0.0;
            };
            if d == 0 {
                return 0.0;
            }
            let n = elem.period() as f64;
            let dv = elem.valence_electrons as f64 - mol.total_hydrogens(i) as f64;
            (4.0 / (n * n) * dv + 1.0) / d as f64
        })
        .collect()
}

/// Electrotopological state per atom:
/// `S_i = I_i + sum_j (I_i - I_j) / (d_ij + 1)^2` over connected atoms.
pub fn estate_indices(mol: &Molecule) -> Vec<f64> {
    let n = mol.atom_count();
    if n == 0 {
        return Vec::new();
    }
    let dist = shortest_path_matrix(mol);
    let intrinsic = intrinsic_states(mol);

    let mut estate = intrinsic.clone();
    for i in 0..n {
        for j in (i + 1)..n {
            if dist[i][j] == usize::MAX {
                continue;
            }
            let p = (dist[i][j] + 1) as f64;
            let delta = (intrinsic[i] - intrinsic[j]) / (p * p);
            estate[i] += delta;
            estate[j] -= delta;
        }
    }
    estate
}

/// Max, min, max |.|, min |.| of the E-state indices (zeros when empty).
pub fn estate_extrema(estate: &[f64]) -> [f64; 4] {
    if estate.is_empty() {
        return [0.0; 4];
    }
    let max = estate.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = estate.iter().copied().fold(f64::INFINITY, f64::min);
    let max_abs = estate.iter().map(|v| v.abs()).fold(0.0, f64::max);
    let min_abs = estate.iter().map(|v| v.abs()).fold(f64::INFINITY, f64::min);
    [max, min, max_abs, min_abs]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn tpsa_reference_values() {
        let cases = [
            ("CCO", 20.23),
            ("CC(=O)Oc1ccccc1C(=O)O", 63.6),
            ("c1ccncc1", 12.89),
            ("c1cc[nH]c1", 15.79),
            ("CC#N", 23.79),
            ("CN", 26.02),
            ("CC", 0.0),
            ("C[N+](=O)[O-]", 3.01 + 17.07 + 23.06),
        ];
        for (smi, expected) in cases {
            let got = tpsa(&parse_smiles(smi).unwrap());
            assert!(close(got, expected, 0.01), "{smi}: {got} vs {expected}");
        }
    }

    #[test]
    fn crippen_benzene_and_ethanol() {
        let (logp, mr) = crippen_logp_mr(&parse_smiles("c1ccccc1").unwrap());
        assert!(close(logp, 1.6866, 1e-3), "benzene logP {logp}");
        assert!(close(mr, 26.442, 1e-2), "benzene MR {mr}");

        let (logp, _) = crippen_logp_mr(&parse_smiles("CCO").unwrap());
        assert!(close(logp, -0.0014, 1e-3), "ethanol logP {logp}");
    }

    #[test]
    fn crippen_orders_lipophilicity() {
        let octane = crippen_logp_mr(&parse_smiles("CCCCCCCC").unwrap()).0;
        let glycerol = crippen_logp_mr(&parse_smiles("OCC(O)CO").unwrap()).0;
        let chlorobenzene = crippen_logp_mr(&parse_smiles("Clc1ccccc1").unwrap()).0;
        assert!(octane > chlorobenzene);
        assert!(chlorobenzene > glycerol);
        assert!(glycerol < 0.0);
    }

    #[test]
    fn estate_of_ethanol() {
        let s = estate_indices(&parse_smiles("CCO").unwrap());
        assert!(close(s[0], 1.6806, 1e-3), "{s:?}");
        assert!(close(s[1], 0.25, 1e-3), "{s:?}");
        assert!(close(s[2], 7.5694, 1e-3), "{s:?}");
        let [max, min, max_abs, min_abs] = estate_extrema(&s);
        assert!(close(max, 7.5694, 1e-3));
        assert!(close(min, 0.25, 1e-3));
        assert!(close(max_abs, max, 1e-12));
        assert!(close(min_abs, 0.25, 1e-3));
    }

    #[test]
    fn estate_isolated_and_disconnected() {
        let methane = estate_indices(&parse_smiles("C").unwrap());
        assert_eq!(methane, vec![0.0]);
        let salt = estate_indices(&parse_smiles("[Na+].[Cl-]").unwrap());
        assert!(salt.iter().all(|&v| v == 0.0));
        assert_eq!(estate_extrema(&[]), [0.0; 4]);
    }

    #[test]
    fn path_matrix() {
        let mol = parse_smiles("CCC.C").unwrap();
        let d = shortest_path_matrix(&mol);
        assert_eq!(d[0][2], 2);
        assert_eq!(d[0][3], usize::MAX);
    }
}
