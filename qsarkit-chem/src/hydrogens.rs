//! Explicit hydrogen completion for 3D work.

use crate::molecule::{Bond, BondOrder, MolAtom, Molecule};

/// Return a copy of `mol` with every implicit hydrogen turned into a graph atom.
///
/// Heavy atoms keep their indices; hydrogens are appended in parent order.
pub fn add_hydrogens(mol: &Molecule) -> Molecule {
    let mut atoms = mol.atoms.clone();
    let mut bonds = mol.bonds.clone();

    for (parent, atom) in mol.atoms.iter().enumerate() {
        for _ in 0..atom.implicit_hydrogens {
            let h = atoms.len();
            atoms.push(MolAtom::new(1));
            bonds.push(Bond::new(parent, h, BondOrder::Single));
        }
    }
    for atom in atoms.iter_mut() {
        atom.implicit_hydrogens = 0;
    }

    Molecule::new(mol.name.clone(), atoms, bonds)
}

/// Return a copy of `mol` with hydrogen atoms folded back into their parents.
///
/// Hydrogens with no heavy neighbor (H2, bare protons) stay explicit.
pub fn remove_hydrogens(mol: &Molecule) -> Molecule {
    let removable: Vec<bool> = (0..mol.atom_count())
        .map(|i| {
            mol.atoms[i].atomic_number == 1
                && mol.atoms[i].isotope.is_none()
                && mol.degree(i) == 1
                && mol.atoms[mol.adjacency[i][0].0].atomic_number != 1
        })
        .collect();

    let mut new_index = vec![usize::MAX; mol.atom_count()];
    let mut atoms = Vec::new();
    for (i, atom) in mol.atoms.iter().enumerate() {
        if !removable[i] {
            new_index[i] = atoms.len();
            atoms.push(atom.clone());
        }
    }
    for i in (0..mol.atom_count()).filter(|&i| removable[i]) {
        let parent = new_index[mol.adjacency[i][0].0];
        atoms[parent].implicit_hydrogens = atoms[parent].implicit_hydrogens.saturating_add(1);
    }
    let bonds = mol
        .bonds
        .iter()
        .filter(|b| !removable[b.atom1] && !removable[b.atom2])
        .map(|b| {
            let mut nb = b.clone();
            nb.atom1 = new_index[b.atom1];
            nb.atom2 = new_index[b.atom2];
            nb
        })
        .collect();

    Molecule::new(mol.name.clone(), atoms, bonds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    #[test]
    fn ethanol_gains_six_hydrogens() {
        let mol = parse_smiles("CCO").unwrap();
        let h = add_hydrogens(&mol);
        assert_eq!(h.atom_count(), 9);
        assert_eq!(h.bond_count(), 8);
        assert_eq!(h.heavy_atom_count(), 3);
        assert!(h.atoms.iter().all(|a| a.implicit_hydrogens == 0));
        assert_eq!(h.degree(0), 4);
        assert_eq!(h.atoms[0].atomic_number, 6);
    }

    #[test]
    fn round_trip_restores_counts() {
        let mol = parse_smiles("c1ccccc1O").unwrap();
        let back = remove_hydrogens(&add_hydrogens(&mol));
        assert_eq!(back.atom_count(), mol.atom_count());
        for (a, b) in back.atoms.iter().zip(&mol.atoms) {
            assert_eq!(a.implicit_hydrogens, b.implicit_hydrogens);
        }
    }
}
