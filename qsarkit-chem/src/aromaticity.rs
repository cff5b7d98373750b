//! Hückel aromaticity perception for Kekulé input.
//!
//! Each SSSR ring, and each pair of rings fused through a single bond, is
//! aromatic when every atom is sp2-like and the pi electron count is 4n+2.

use std::collections::BTreeSet;

use crate::molecule::{BondOrder, Molecule};
use crate::ring::RingInfo;

/// Mark atoms and bonds of aromatic rings. Hydrogen counts are kept.
pub fn perceive_aromaticity(mol: &mut Molecule) {
    let rings = RingInfo::new(mol);
    if rings.num_rings() == 0 {
        return;
    }

    let mut systems: Vec<(BTreeSet<usize>, BTreeSet<usize>)> = rings
        .rings
        .iter()
        .zip(&rings.ring_bonds)
        .map(|(atoms, bonds)| (atoms.iter().copied().collect(), bonds.iter().copied().collect()))
        .collect();

    let singles = systems.len();
    for i in 0..singles {
        for j in (i + 1)..singles {
            let shared: Vec<usize> = systems[i].1.intersection(&systems[j].1).copied().collect();
            if shared.len() == 1 {
                let atoms = systems[i].0.union(&systems[j].0).copied().collect();
                let bonds = systems[i].1.symmetric_difference(&systems[j].1).copied().collect();
                systems.push((atoms, bonds));
            }
        }
    }

    for (atoms, bonds) in &systems {
        if atoms.iter().all(|&a| mol.atoms[a].is_aromatic) {
            continue;
        }
        let electrons: Option<usize> = atoms
            .iter()
            .map(|&a| pi_electrons(mol, &rings, a, bonds))
            .sum();
        if electrons.is_some_and(|e| e % 4 == 2) {
            for &a in atoms {
                mol.atoms[a].is_aromatic = true;
            }
            for &b in bonds {
                mol.bonds[b].order = BondOrder::Aromatic;
                mol.bonds[b].is_aromatic = true;
            }
        }
    }
}

/// Pi electrons an atom donates to a ring, or `None` if it breaks conjugation.
fn pi_electrons(mol: &Molecule, rings: &RingInfo, atom: usize, ring_bonds: &BTreeSet<usize>) -> Option<usize> {
    let a = &mol.atoms[atom];
    let connections = mol.degree(atom) + a.implicit_hydrogens as usize;

    if a.is_aromatic {
        let donor = match a.atomic_number {
            7 | 15 => connections == 3 && a.formal_charge == 0,
            8 | 16 | 34 => true,
            _ => false,
        };
        return Some(if donor { 2 } else { 1 });
    }

    let mut exocyclic_hetero_double = false;
    for &(nb, bi) in &mol.adjacency[atom] {
        match mol.bonds[bi].order {
            BondOrder::Triple => return None,
            BondOrder::Double | BondOrder::Aromatic => {
                if ring_bonds.contains(&bi) || rings.is_ring_bond(bi) {
                    return Some(1);
                }
                if matches!(mol.atoms[nb].atomic_number, 7 | 8 | 16) {
                    exocyclic_hetero_double = true;
                } else {
                    return None;
                }
            }
            BondOrder::Single => {}
        }
    }
    if exocyclic_hetero_double {
        return Some(0);
    }

    match (a.atomic_number, a.formal_charge) {
        (7 | 15, 0) if connections == 3 => Some(2),
        (8 | 16 | 34, 0) if connections == 2 => Some(2),
        (6, -1) => Some(2),
        (6, 1) | (5, 0) => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::properties::ring_stats;
    use crate::ring::RingInfo;
    use crate::smiles::parse_smiles;

    fn aromatic_rings(smi: &str) -> usize {
        let mol = parse_smiles(smi).unwrap();
        ring_stats(&mol, &RingInfo::new(&mol)).aromatic
    }

    #[test]
    fn kekule_benzene_becomes_aromatic() {
        let mol = parse_smiles("C1=CC=CC=C1").unwrap();
        assert!(mol.atoms.iter().all(|a| a.is_aromatic));
        assert!(mol.atoms.iter().all(|a| a.implicit_hydrogens == 1));
        assert_eq!(aromatic_rings("C1=CC=CC=C1"), 1);
    }

    #[test]
    fn heteroaromatic_kekule_forms() {
        assert_eq!(aromatic_rings("C1=COC=C1"), 1);
        assert_eq!(aromatic_rings("C1=CNC=C1"), 1);
        assert_eq!(aromatic_rings("O=C1C=CC=CN1"), 1);
        assert_eq!(aromatic_rings("C1=CC=C2C=CC=CC2=C1"), 2);
    }

    #[test]
    fn non_aromatic_rings_stay_aliphatic() {
        assert_eq!(aromatic_rings("C1=CCCCC1"), 0);
        assert_eq!(aromatic_rings("C1=CCC=C1"), 0);
        assert_eq!(aromatic_rings("C1=CC=CC=CC=C1"), 0);
        assert_eq!(aromatic_rings("O=C1C=CC(=O)C=C1"), 0);
        let mol = parse_smiles("C1=CCCCC1").unwrap();
        assert!(mol.atoms.iter().all(|a| !a.is_aromatic));
    }

    #[test]
    fn lowercase_input_is_untouched() {
        let mol = parse_smiles("c1ccc2ccccc2c1").unwrap();
        assert_eq!(ring_stats(&mol, &RingInfo::new(&mol)).aromatic, 2);
    }
}
