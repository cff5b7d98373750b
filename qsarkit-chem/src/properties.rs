//! Molecular property calculation: mass, formula, hydrogen-bond counts,
//! rotatable bonds, electron counts, ring classification.

use std::collections::BTreeMap;

use qsarkit_core::Summarizable;
use tracing::debug;

use crate::element::{atomic_weight, element_by_number};
use crate::molecule::{BondOrder, Hybridization, Molecule};
use crate::ring::RingInfo;
use crate::smarts::{parse_smarts, SmartsTarget};

/// Lipinski donor definition: N/O/S carrying hydrogens.
const HBD_SMARTS: &str = "[$([N;!H0;v3]),$([N;!H0;+1;v4]),$([O,S;H1;+0]),$([n;H1;+0])]";

/// Acceptor definition: hydroxyl/thiol not on a carbonyl-like center, ethers,
/// anions, non-amide trivalent N, aromatic n/o/s, fluorine.
const HBA_SMARTS: &str = "[$([O,S;H1;v2]-[!$(*=[O,N,P,S])]),$([O,S;H0;v2]),$([O,S;-]),\
$([N;v3;!$(N-*=!@[O,N,P,S])]),$([nH0,o,s;+0]),$([F])]";

/// Strict rotatable bond: acyclic single bond between non-terminal atoms,
/// excluding triple-bond neighbours, CX3 groups, t-butyl and amide-like C-N.
const ROTATABLE_SMARTS: &str = "[!$(*#*)&!D1&!$(C(F)(F)F)&!$(C(Cl)(Cl)Cl)&!$(C(Br)(Br)Br)\
&!$(C([CH3])([CH3])[CH3])&!$([CD3](=[N,O,S])-!@[#7,O,S!D1])&!$([#7,O,S!D1]-!@[CD3]=[N,O,S])\
&!$([CD3](=[N+])-!@[#7!D1])&!$([#7!D1]-!@[CD3]=[N+])]-,:;!@[!$(*#*)&!D1&!$(C(F)(F)F)\
&!$(C(Cl)(Cl)Cl)&!$(C(Br)(Br)Br)&!$(C([CH3])([CH3])[CH3])]";

/// Computed molecular properties.
#[derive(Debug, Clone)]
pub struct MolecularProperties {
    pub molecular_weight: f64,
    pub formula: String,
    pub heavy_atom_count: usize,
    pub hydrogen_bond_donors: usize,
    pub hydrogen_bond_acceptors: usize,
    pub rotatable_bonds: usize,
    pub rings: RingStats,
    pub fraction_csp3: f64,
    pub radical_electrons: usize,
    pub valence_electrons: usize,
}

impl Summarizable for MolecularProperties {
    fn summary(&self) -> String {
        format!(
            "MW={:.2} Formula={} HBD={} HBA={} RotBonds={} Rings={}",
            self.molecular_weight,
            self.formula,
            self.hydrogen_bond_donors,
            self.hydrogen_bond_acceptors,
            self.rotatable_bonds,
            self.rings.total,
        )
    }
}

/// SSSR ring classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingStats {
    pub total: usize,
    /// Every ring bond aromatic.
    pub aromatic: usize,
    /// Every ring bond single and non-aromatic.
    pub saturated: usize,
    /// At least one non-aromatic ring bond.
    pub aliphatic: usize,
}

/// Compute all molecular properties at once.
pub fn compute_properties(mol: &Molecule) -> MolecularProperties {
    let target = SmartsTarget::new(mol);
    MolecularProperties {
        molecular_weight: molecular_weight(mol),
        formula: molecular_formula(mol),
        heavy_atom_count: mol.heavy_atom_count(),
        hydrogen_bond_donors: count_pattern(&target, HBD_SMARTS),
        hydrogen_bond_acceptors: count_pattern(&target, HBA_SMARTS),
        rotatable_bonds: count_pattern(&target, ROTATABLE_SMARTS),
        rings: ring_stats(mol, &RingInfo::new(mol)),
        fraction_csp3: fraction_csp3(mol),
        radical_electrons: radical_electron_count(mol),
        valence_electrons: valence_electron_count(mol),
    }
}

fn count_pattern(target: &SmartsTarget<'_>, smarts: &str) -> usize {
    match parse_smarts(smarts) {
        Ok(pattern) => target.count_unique(&pattern),
        Err(e) => {
            debug!(smarts, error = %e, "property pattern failed to compile");
            0
        }
    }
}

/// Average molecular weight including implicit and explicit hydrogens.
pub fn molecular_weight(mol: &Molecule) -> f64 {
    let h_weight = atomic_weight(1);
    mol.atoms
        .iter()
        .map(|atom| atomic_weight(atom.atomic_number) + atom.implicit_hydrogens as f64 * h_weight)
        .sum()
}

/// Generate the molecular formula in Hill system order (C first, then H, then alphabetical).
pub fn molecular_formula(mol: &Molecule) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for atom in &mol.atoms {
        if let Some(elem) = element_by_number(atom.atomic_number) {
            *counts.entry(elem.symbol).or_insert(0) += 1;
        }
        if atom.implicit_hydrogens > 0 {
            *counts.entry("H").or_insert(0) += atom.implicit_hydrogens as usize;
        }
    }

    let mut formula = String::new();
    let mut push = |symbol: &str, count: usize| {
        formula.push_str(symbol);
        if count > 1 {
            formula.push_str(&count.to_string());
        }
    };
    if let Some(c) = counts.remove("C") {
        push("C", c);
        if let Some(h) = counts.remove("H") {
            push("H", h);
        }
    }
    for (symbol, count) in counts {
        push(symbol, count);
    }
    formula
}

pub fn hbd_count(mol: &Molecule) -> usize {
    count_pattern(&SmartsTarget::new(mol), HBD_SMARTS)
}

pub fn hba_count(mol: &Molecule) -> usize {
    count_pattern(&SmartsTarget::new(mol), HBA_SMARTS)
}

pub fn rotatable_bond_count(mol: &Molecule) -> usize {
    count_pattern(&SmartsTarget::new(mol), ROTATABLE_SMARTS)
}

/// Classify SSSR rings by the aromaticity and order of their bonds.
pub fn ring_stats(mol: &Molecule, rings: &RingInfo) -> RingStats {
    let mut stats = RingStats { total: rings.num_rings(), ..RingStats::default() };
    for bonds in &rings.ring_bonds {
        let aromatic = |bi: &usize| {
            mol.bonds[*bi].is_aromatic || mol.bonds[*bi].order == BondOrder::Aromatic
        };
        if bonds.iter().all(aromatic) {
            stats.aromatic += 1;
        } else {
            stats.aliphatic += 1;
            if bonds.iter().all(|bi| mol.bonds[*bi].order == BondOrder::Single && !aromatic(bi)) {
                stats.saturated += 1;
            }
        }
    }
    stats
}

/// Fraction of carbons that are sp3 hybridized.
pub fn fraction_csp3(mol: &Molecule) -> f64 {
    let carbons: Vec<usize> = (0..mol.atom_count())
        .filter(|&i| mol.atoms[i].atomic_number == 6)
        .collect();
    if carbons.is_empty() {
        return 0.0;
    }
    let sp3 = carbons
        .iter()
        .filter(|&&i| mol.hybridization(i) == Hybridization::SP3)
        .count();
    sp3 as f64 / carbons.len() as f64
}

pub fn radical_electron_count(mol: &Molecule) -> usize {
    mol.atoms.iter().map(|a| a.radical_electrons as usize).sum()
}

/// Valence electrons: outer-shell electrons minus formal charge per atom,
/// plus one per hydrogen.
pub fn valence_electron_count(mol: &Molecule) -> usize {
    let total: i64 = mol
        .atoms
        .iter()
        .map(|atom| {
            let outer = element_by_number(atom.atomic_number).map_or(0, |e| e.valence_electrons as i64);
            outer - atom.formal_charge as i64 + atom.implicit_hydrogens as i64
        })
        .sum();
    total.max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    #[test]
    fn mw_of_water() {
        let mol = parse_smiles("O").unwrap();
        let mw = molecular_weight(&mol);
        assert!((mw - 18.015).abs() < 0.01, "got {mw}");
    }

    #[test]
    fn formula_of_glucose() {
        let mol = parse_smiles("OC(CO)C(O)C(O)C(O)C=O").unwrap();
        assert_eq!(molecular_formula(&mol), "C6H12O6");
        let salt = parse_smiles("[Na+].[Cl-]").unwrap();
        assert_eq!(molecular_formula(&salt), "ClNa");
    }

    #[test]
    fn donors_and_acceptors() {
        let ethanol = parse_smiles("CCO").unwrap();
        assert_eq!(hbd_count(&ethanol), 1);
        assert_eq!(hba_count(&ethanol), 1);

        // Amide nitrogen is a donor but not an acceptor.
        let acetamide = parse_smiles("CC(N)=O").unwrap();
        assert_eq!(hbd_count(&acetamide), 1);
        assert_eq!(hba_count(&acetamide), 1);

        let pyridine = parse_smiles("c1ccncc1").unwrap();
        assert_eq!(hbd_count(&pyridine), 0);
        assert_eq!(hba_count(&pyridine), 1);
    }

    #[test]
    fn rotatable_bonds() {
        assert_eq!(rotatable_bond_count(&parse_smiles("CCCC").unwrap()), 1);
        assert_eq!(rotatable_bond_count(&parse_smiles("C1CCCCC1").unwrap()), 0);
        // Amide C-N is not rotatable.
        assert_eq!(rotatable_bond_count(&parse_smiles("CC(=O)NC").unwrap()), 0);
        assert_eq!(rotatable_bond_count(&parse_smiles("CCc1ccccc1").unwrap()), 1);
    }

    #[test]
    fn ring_classification() {
        let mol = parse_smiles("c1ccc(cc1)C1CCCCC1").unwrap();
        let stats = ring_stats(&mol, &RingInfo::new(&mol));
        assert_eq!(stats.total, 2);
        assert_eq!(stats.aromatic, 1);
        assert_eq!(stats.aliphatic, 1);
        assert_eq!(stats.saturated, 1);

        let cyclohexene = parse_smiles("C1=CCCCC1").unwrap();
        let stats = ring_stats(&cyclohexene, &RingInfo::new(&cyclohexene));
        assert_eq!((stats.aliphatic, stats.saturated), (1, 0));
    }

    #[test]
    fn electron_counts() {
        let water = parse_smiles("O").unwrap();
        assert_eq!(valence_electron_count(&water), 8);
        let methyl = parse_smiles("[CH3]").unwrap();
        assert_eq!(radical_electron_count(&methyl), 1);
        assert_eq!(valence_electron_count(&methyl), 7);
    }

    #[test]
    fn fsp3() {
        assert!((fraction_csp3(&parse_smiles("CCCC").unwrap()) - 1.0).abs() < 1e-12);
        assert!(fraction_csp3(&parse_smiles("c1ccccc1").unwrap()).abs() < 1e-12);
        assert!((fraction_csp3(&parse_smiles("CC=C").unwrap()) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(fraction_csp3(&parse_smiles("O").unwrap()), 0.0);
    }

    #[test]
    fn properties_of_aspirin() {
        let mol = parse_smiles("CC(=O)Oc1ccccc1C(=O)O").unwrap();
        let props = compute_properties(&mol);
        assert!((props.molecular_weight - 180.16).abs() < 0.1, "MW={}", props.molecular_weight);
        assert_eq!(props.formula, "C9H8O4");
        assert_eq!(props.rings.total, 1);
        assert_eq!(props.rings.aromatic, 1);
        assert_eq!(props.hydrogen_bond_donors, 1);
        assert_eq!(props.hydrogen_bond_acceptors, 3);
        // Ester and acid C-O bonds are excluded; the two ring links remain.
        assert_eq!(props.rotatable_bonds, 2);
        assert!(props.summary().contains("C9H8O4"));
    }
}
