//! Molecular graph representation.

use qsarkit_core::{Annotated, ContentAddressable, Summarizable};
use sha2::{Digest, Sha256};

/// Tetrahedral chirality at a stereocenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Chirality {
    /// No chirality specified.
    #[default]
    None,
    /// Counterclockwise (`@` in SMILES).
    CounterClockwise,
    /// Clockwise (`@@` in SMILES).
    Clockwise,
}

/// Cis-trans stereo bond direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondStereo {
    /// No stereo bond.
    #[default]
    None,
    /// Up bond (`/` in SMILES).
    Up,
    /// Down bond (`\` in SMILES).
    Down,
}

/// Orbital hybridization inferred from the bond pattern around an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hybridization {
    S,
    SP,
    SP2,
    SP3,
}

/// Bond order classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Numeric bond order for valence calculations.
    pub fn as_f64(self) -> f64 {
        match self {
            BondOrder::Single => 1.0,
            BondOrder::Double => 2.0,
            BondOrder::Triple => 3.0,
            BondOrder::Aromatic => 1.5,
        }
    }
}

/// An atom in a molecular graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MolAtom {
    pub atomic_number: u8,
    pub formal_charge: i8,
    pub isotope: Option<u16>,
    pub is_aromatic: bool,
    /// Hydrogens carried on the atom rather than as graph nodes.
    pub implicit_hydrogens: u8,
    /// Unpaired electrons (only set for bracket atoms below their valence).
    pub radical_electrons: u8,
    pub chirality: Chirality,
}

impl MolAtom {
    /// A neutral, non-aromatic atom with no hydrogens.
    pub fn new(atomic_number: u8) -> Self {
        MolAtom {
            atomic_number,
            formal_charge: 0,
            isotope: None,
            is_aromatic: false,
            implicit_hydrogens: 0,
            radical_electrons: 0,
            chirality: Chirality::None,
        }
    }

    pub fn with_hydrogens(mut self, h: u8) -> Self {
        self.implicit_hydrogens = h;
        self
    }

    pub fn aromatic(mut self) -> Self {
        self.is_aromatic = true;
        self
    }
}

/// A bond between two atoms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
    pub order: BondOrder,
    pub is_aromatic: bool,
    pub stereo: BondStereo,
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize, order: BondOrder) -> Self {
        Bond {
            atom1,
            atom2,
            order,
            is_aromatic: order == BondOrder::Aromatic,
            stereo: BondStereo::None,
        }
    }

    /// The atom on the other end of the bond.
    pub fn other(&self, atom: usize) -> usize {
        if self.atom1 == atom { self.atom2 } else { self.atom1 }
    }
}

/// A molecular graph with atoms, bonds, and adjacency information.
#[derive(Debug, Clone)]
pub struct Molecule {
    pub name: String,
    pub atoms: Vec<MolAtom>,
    pub bonds: Vec<Bond>,
    /// adjacency[atom_idx] = Vec<(neighbor_atom_idx, bond_idx)>
    pub adjacency: Vec<Vec<(usize, usize)>>,
}

impl Molecule {
    /// Create a new molecule, building the adjacency list from atoms and bonds.
    pub fn new(name: String, atoms: Vec<MolAtom>, bonds: Vec<Bond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        Molecule { name, atoms, bonds, adjacency }
    }

    /// Number of graph atoms (explicit hydrogens included, implicit not).
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Number of non-hydrogen atoms.
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.atomic_number != 1).count()
    }

    /// Neighbor atom indices for a given atom.
    pub fn neighbors(&self, atom_idx: usize) -> Vec<usize> {
        self.adjacency[atom_idx].iter().map(|&(n, _)| n).collect()
    }

    /// Graph degree of an atom (number of explicit bonds).
    pub fn degree(&self, atom_idx: usize) -> usize {
        self.adjacency[atom_idx].len()
    }

    /// Number of non-hydrogen neighbors.
    pub fn heavy_degree(&self, atom_idx: usize) -> usize {
        self.adjacency[atom_idx]
            .iter()
            .filter(|&&(n, _)| self.atoms[n].atomic_number != 1)
            .count()
    }

    /// Find the bond between two atoms, if any.
    pub fn get_bond(&self, a1: usize, a2: usize) -> Option<&Bond> {
        self.bond_index(a1, a2).map(|bi| &self.bonds[bi])
    }

    /// Index of the bond between two atoms, if any.
    pub fn bond_index(&self, a1: usize, a2: usize) -> Option<usize> {
        self.adjacency[a1]
            .iter()
            .find(|&&(n, _)| n == a2)
            .map(|&(_, bi)| bi)
    }

    /// Hydrogens on an atom: implicit plus explicit H neighbors.
    pub fn total_hydrogens(&self, atom_idx: usize) -> usize {
        let explicit = self.adjacency[atom_idx]
            .iter()
            .filter(|&&(n, _)| self.atoms[n].atomic_number == 1)
            .count();
        self.atoms[atom_idx].implicit_hydrogens as usize + explicit
    }

    /// Sum of bond orders on an atom (aromatic counted as 1.5).
    pub fn bond_order_sum(&self, atom_idx: usize) -> f64 {
        self.adjacency[atom_idx]
            .iter()
            .map(|&(_, bi)| self.bonds[bi].order.as_f64())
            .sum()
    }

    /// Hybridization from pi bonds: aromatic or one double bond gives sp2,
    /// a triple or two doubles sp, otherwise sp3. Hydrogen is s.
    pub fn hybridization(&self, atom_idx: usize) -> Hybridization {
        if self.atoms[atom_idx].atomic_number == 1 {
            return Hybridization::S;
        }
        if self.atoms[atom_idx].is_aromatic {
            return Hybridization::SP2;
        }
        let mut doubles = 0;
        for &(_, bi) in &self.adjacency[atom_idx] {
            match self.bonds[bi].order {
                BondOrder::Triple => return Hybridization::SP,
                BondOrder::Double => doubles += 1,
                BondOrder::Aromatic => return Hybridization::SP2,
                BondOrder::Single => {}
            }
        }
        match doubles {
            0 => Hybridization::SP3,
            1 => Hybridization::SP2,
            _ => Hybridization::SP,
        }
    }

    /// Total hydrogen count (implicit + explicit H atoms).
    pub fn total_hydrogen_count(&self) -> usize {
        let explicit: usize = self.atoms.iter().filter(|a| a.atomic_number == 1).count();
        let implicit: usize = self.atoms.iter().map(|a| a.implicit_hydrogens as usize).sum();
        explicit + implicit
    }
}

impl Annotated for Molecule {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Summarizable for Molecule {
    fn summary(&self) -> String {
        format!(
            "{}: {} heavy atoms, {} bonds",
            if self.name.is_empty() { "Molecule" } else { &self.name },
            self.heavy_atom_count(),
            self.bond_count()
        )
    }
}

impl ContentAddressable for Molecule {
    fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for atom in &self.atoms {
            hasher.update([atom.atomic_number, atom.is_aromatic as u8, atom.implicit_hydrogens]);
            hasher.update(atom.formal_charge.to_le_bytes());
            hasher.update([atom.radical_electrons]);
            if let Some(iso) = atom.isotope {
                hasher.update(iso.to_le_bytes());
            }
        }
        let mut sorted_bonds: Vec<_> = self
            .bonds
            .iter()
            .map(|b| (b.atom1.min(b.atom2), b.atom1.max(b.atom2), b.order as u8))
            .collect();
        sorted_bonds.sort_unstable();
        for (a, b, order) in sorted_bonds {
            hasher.update((a as u64).to_le_bytes());
            hasher.update((b as u64).to_le_bytes());
            hasher.update([order]);
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ethanol() -> Molecule {
        let atoms = vec![
            MolAtom::new(6).with_hydrogens(3),
            MolAtom::new(6).with_hydrogens(2),
            MolAtom::new(8).with_hydrogens(1),
        ];
        let bonds = vec![
            Bond::new(0, 1, BondOrder::Single),
            Bond::new(1, 2, BondOrder::Single),
        ];
        Molecule::new("ethanol".into(), atoms, bonds)
    }

    #[test]
    fn construction_and_adjacency() {
        let mol = make_ethanol();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bond_count(), 2);
        assert_eq!(mol.neighbors(1), vec![0, 2]);
        assert_eq!(mol.degree(1), 2);
        assert_eq!(mol.bond_index(2, 1), Some(1));
        assert!(mol.get_bond(0, 2).is_none());
    }

    #[test]
    fn hydrogen_bookkeeping() {
        let mol = make_ethanol();
        assert_eq!(mol.total_hydrogens(0), 3);
        assert_eq!(mol.total_hydrogen_count(), 6);
        assert_eq!(mol.heavy_atom_count(), 3);
        assert!((mol.bond_order_sum(1) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn hybridization_from_bonds() {
        let atoms = vec![
            MolAtom::new(6).with_hydrogens(2),
            MolAtom::new(6),
            MolAtom::new(6).with_hydrogens(2),
        ];
        let bonds = vec![
            Bond::new(0, 1, BondOrder::Double),
            Bond::new(1, 2, BondOrder::Double),
        ];
        let allene = Molecule::new("allene".into(), atoms, bonds);
        assert_eq!(allene.hybridization(0), Hybridization::SP2);
        assert_eq!(allene.hybridization(1), Hybridization::SP);
        assert_eq!(make_ethanol().hybridization(2), Hybridization::SP3);
    }

    #[test]
    fn bond_other_end() {
        let b = Bond::new(4, 7, BondOrder::Double);
        assert_eq!(b.other(4), 7);
        assert_eq!(b.other(7), 4);
        assert!(!b.is_aromatic);
    }

    #[test]
    fn summary_and_hash_are_stable() {
        let mol = make_ethanol();
        assert!(mol.summary().contains("3 heavy atoms"));
        let hash = mol.content_hash();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, make_ethanol().content_hash());
        assert_eq!(mol.name(), "ethanol");
    }
}
