//! SMILES string parser.
//!
//! Supports the organic subset, bracket atoms (isotope, chirality, hydrogen
//! count, charge, atom class), branches, ring closures including `%nn`,
//! aromatic lowercase atoms, explicit bond symbols and `/` `\` bond stereo.
//! Implicit hydrogens are assigned from the lowest allowed valence that fits
//! the explicit bonds; bracket atoms keep the hydrogen count they state and
//! any shortfall against their valence becomes radical electrons; single
//! bonds from a bracket ligand to a transition metal are treated as dative.
//! Lowercase aromatic input that admits no Kekulé structure is a parse
//! error, and Kekulé rings that satisfy Hückel's rule are marked aromatic.
//! The `*` dummy atom is rejected with `InvalidInput`.

use std::collections::BTreeMap;

use qsarkit_core::{QsarError, Result};

use crate::aromaticity::perceive_aromaticity;
use crate::element::{element_by_number, element_by_symbol, MAX_ATOMIC_NUMBER};
use crate::molecule::{Bond, BondOrder, BondStereo, Chirality, MolAtom, Molecule};

/// Parse a SMILES string into a `Molecule`.
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    parse_smiles_named(smiles, "")
}

/// Parse a SMILES string into a `Molecule` with a given name.
pub fn parse_smiles_named(smiles: &str, name: &str) -> Result<Molecule> {
    let trimmed = smiles.trim();
    if trimmed.is_empty() {
        return Err(QsarError::Parse("empty SMILES string".into()));
    }
    let mut parser = SmilesParser::new(trimmed);
    parser.parse()?;
    parser.finish()?;
    parser.demote_acyclic_aromatic_bonds()?;
    parser.assign_hydrogens()?;
    parser.check_kekulizable()?;
    let mut mol = Molecule::new(name.to_string(), parser.atoms, parser.bonds);
    perceive_aromaticity(&mut mol);
    Ok(mol)
}

/// Pending ring-closure bond: opening atom plus the bond symbol written there.
struct RingOpening {
    atom: usize,
    order: Option<BondOrder>,
    stereo: BondStereo,
}

struct SmilesParser<'a> {
    input: &'a [u8],
    pos: usize,
    atoms: Vec<MolAtom>,
    /// Atoms written in brackets keep their stated hydrogen count.
    bracket: Vec<bool>,
    bonds: Vec<Bond>,
    ring_closures: BTreeMap<u16, RingOpening>,
    /// Stack of atom indices for branch handling
    stack: Vec<usize>,
    prev_atom: Option<usize>,
    pending_bond: Option<BondOrder>,
    pending_stereo: BondStereo,
}

impl<'a> SmilesParser<'a> {
    fn new(input: &'a str) -> Self {
        SmilesParser {
            input: input.as_bytes(),
            pos: 0,
            atoms: Vec::new(),
            bracket: Vec::new(),
            bonds: Vec::new(),
            ring_closures: BTreeMap::new(),
            stack: Vec::new(),
            prev_atom: None,
            pending_bond: None,
            pending_stereo: BondStereo::None,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn error(&self, msg: impl std::fmt::Display) -> QsarError {
        QsarError::Parse(format!("{msg} at position {}", self.pos))
    }

    /// `*` is well-formed but has no element to compute descriptors from.
    fn dummy_atom(&self) -> QsarError {
        QsarError::InvalidInput(format!("dummy atom '*' at position {} is not supported", self.pos))
    }

    fn set_pending_bond(&mut self, order: BondOrder) -> Result<()> {
        if self.pending_bond.is_some() {
            return Err(self.error("consecutive bond symbols"));
        }
        self.pending_bond = Some(order);
        Ok(())
    }

    fn parse(&mut self) -> Result<()> {
        while let Some(ch) = self.peek() {
            match ch {
                b'(' => {
                    self.advance();
                    let prev = self
                        .prev_atom
                        .ok_or_else(|| self.error("branch without preceding atom"))?;
                    self.stack.push(prev);
                }
                b')' => {
                    self.advance();
                    if self.pending_bond.is_some() {
                        return Err(self.error("dangling bond before ')'"));
                    }
                    let top = self.stack.pop().ok_or_else(|| self.error("unmatched ')'"))?;
                    self.prev_atom = Some(top);
                }
                b'-' => {
                    self.advance();
                    self.set_pending_bond(BondOrder::Single)?;
                }
                b'=' => {
                    self.advance();
                    self.set_pending_bond(BondOrder::Double)?;
                }
                b'#' => {
                    self.advance();
                    self.set_pending_bond(BondOrder::Triple)?;
                }
                b':' => {
                    self.advance();
                    self.set_pending_bond(BondOrder::Aromatic)?;
                }
                b'/' | b'\\' => {
                    self.advance();
                    self.set_pending_bond(BondOrder::Single)?;
                    self.pending_stereo = if ch == b'/' { BondStereo::Up } else { BondStereo::Down };
                }
                b'%' => {
                    self.advance();
                    let ring_num = self.parse_two_digit_ring()?;
                    self.handle_ring_closure(ring_num)?;
                }
                b'[' => self.parse_bracket_atom()?,
                b'*' => return Err(self.dummy_atom()),
                b'0'..=b'9' => {
                    self.advance();
                    self.handle_ring_closure((ch - b'0') as u16)?;
                }
                b'.' => {
                    self.advance();
                    if self.pending_bond.is_some() {
                        return Err(self.error("bond symbol before '.'"));
                    }
                    self.prev_atom = None;
                }
                c if is_organic_atom_start(c) => self.parse_organic_atom()?,
                other => {
                    return Err(self.error(format!("unexpected character '{}'", other as char)));
                }
            }
        }
        Ok(())
    }

    fn parse_organic_atom(&mut self) -> Result<()> {
        let ch = self.advance().ok_or_else(|| self.error("unexpected end of SMILES"))?;
        let is_aromatic = ch.is_ascii_lowercase();

        let atomic_number = match ch {
            b'B' if self.peek() == Some(b'r') => {
                self.advance();
                35
            }
            b'C' if self.peek() == Some(b'l') => {
                self.advance();
                17
            }
            b'B' | b'b' => 5,
            b'C' | b'c' => 6,
            b'N' | b'n' => 7,
            b'O' | b'o' => 8,
            b'P' | b'p' => 15,
            b'S' | b's' => 16,
            b'F' => 9,
            b'I' => 53,
            _ => return Err(self.error(format!("unknown organic atom '{}'", ch as char))),
        };

        let mut atom = MolAtom::new(atomic_number);
        atom.is_aromatic = is_aromatic;
        self.push_atom(atom, false)
    }

    fn parse_bracket_atom(&mut self) -> Result<()> {
        self.advance(); // '['

        let isotope = self.parse_optional_number();

        let ch = self
            .advance()
            .ok_or_else(|| self.error("unexpected end of SMILES in bracket atom"))?;
        if ch == b'*' {
            return Err(self.dummy_atom());
        }
        if !ch.is_ascii_alphabetic() {
            return Err(self.error(format!("expected element symbol, found '{}'", ch as char)));
        }
        let is_aromatic = ch.is_ascii_lowercase();
        let upper = ch.to_ascii_uppercase() as char;

        // Two-letter symbols take precedence ("Cl", "Na", aromatic "se").
        let symbol = match self.peek() {
            Some(next) if next.is_ascii_lowercase() => {
                let two = format!("{}{}", upper, next as char);
                if element_by_symbol(&two).is_some() {
                    self.advance();
                    two
                } else {
                    upper.to_string()
                }
            }
            _ => upper.to_string(),
        };
        let elem = element_by_symbol(&symbol)
            .ok_or_else(|| self.error(format!("unknown element '{symbol}'")))?;

        let mut chirality = Chirality::None;
        if self.peek() == Some(b'@') {
            self.advance();
            chirality = Chirality::CounterClockwise;
            if self.peek() == Some(b'@') {
                self.advance();
                chirality = Chirality::Clockwise;
            }
        }

        let mut hydrogens = 0u8;
        if self.peek() == Some(b'H') {
            self.advance();
            hydrogens = match self.peek() {
                Some(d) if d.is_ascii_digit() => {
                    self.advance();
                    d - b'0'
                }
                _ => 1,
            };
        }

        let charge = self.parse_charge()?;

        // Atom class (":n") carries no chemistry.
        if self.peek() == Some(b':') {
            self.advance();
            if self.parse_optional_number().is_none() {
                return Err(self.error("expected atom class number after ':'"));
            }
        }

        if self.advance() != Some(b']') {
            return Err(self.error("expected ']' in bracket atom"));
        }

        let mut atom = MolAtom::new(elem.atomic_number);
        atom.formal_charge = charge;
        atom.isotope = isotope.map(|n| n as u16);
        atom.is_aromatic = is_aromatic;
        atom.implicit_hydrogens = hydrogens;
        atom.chirality = chirality;
        self.push_atom(atom, true)
    }

    fn parse_charge(&mut self) -> Result<i8> {
        let sign: i8 = match self.peek() {
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return Ok(0),
        };
        let symbol = self.advance().unwrap_or(b'+');
        if let Some(d) = self.peek().filter(u8::is_ascii_digit) {
            self.advance();
            return Ok(sign * (d - b'0') as i8);
        }
        let mut magnitude = 1i8;
        while self.peek() == Some(symbol) {
            self.advance();
            magnitude = magnitude.saturating_add(1);
        }
        Ok(sign * magnitude)
    }

    fn parse_optional_number(&mut self) -> Option<u32> {
        let mut n: u32 = 0;
        let mut found = false;
        while let Some(ch) = self.peek().filter(u8::is_ascii_digit) {
            self.advance();
            n = n.saturating_mul(10).saturating_add((ch - b'0') as u32);
            found = true;
        }
        found.then_some(n)
    }

    fn parse_two_digit_ring(&mut self) -> Result<u16> {
        let d1 = self.advance().ok_or_else(|| self.error("expected digit after '%'"))?;
        let d2 = self.advance().ok_or_else(|| self.error("expected second digit after '%'"))?;
        if !d1.is_ascii_digit() || !d2.is_ascii_digit() {
            return Err(self.error("invalid ring closure number after '%'"));
        }
        Ok((d1 - b'0') as u16 * 10 + (d2 - b'0') as u16)
    }

    fn push_atom(&mut self, atom: MolAtom, bracket: bool) -> Result<()> {
        let idx = self.atoms.len();
        self.atoms.push(atom);
        self.bracket.push(bracket);
        if let Some(prev) = self.prev_atom {
            let order = self.pending_bond.take();
            self.add_bond(prev, idx, order)?;
        } else if self.pending_bond.is_some() {
            return Err(self.error("bond symbol without preceding atom"));
        }
        self.prev_atom = Some(idx);
        Ok(())
    }

    fn add_bond(&mut self, a1: usize, a2: usize, order: Option<BondOrder>) -> Result<()> {
        if a1 == a2 || self.bonds.iter().any(|b| {
            (b.atom1 == a1 && b.atom2 == a2) || (b.atom1 == a2 && b.atom2 == a1)
        }) {
            return Err(self.error("duplicate bond or self-loop"));
        }
        let both_aromatic = self.atoms[a1].is_aromatic && self.atoms[a2].is_aromatic;
        let order = order.unwrap_or(if both_aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        });
        let mut bond = Bond::new(a1, a2, order);
        bond.stereo = std::mem::take(&mut self.pending_stereo);
        self.bonds.push(bond);
        Ok(())
    }

    fn handle_ring_closure(&mut self, ring_num: u16) -> Result<()> {
        let current = self
            .prev_atom
            .ok_or_else(|| self.error("ring closure without preceding atom"))?;

        if let Some(open) = self.ring_closures.remove(&ring_num) {
            let closing = self.pending_bond.take();
            let order = match (open.order, closing) {
                (Some(a), Some(b)) if a != b => {
                    return Err(self.error(format!("conflicting bond orders on ring closure {ring_num}")));
                }
                (a, b) => b.or(a),
            };
            if self.pending_stereo == BondStereo::None {
                self.pending_stereo = open.stereo;
            }
            self.add_bond(open.atom, current, order)?;
        } else {
            let order = self.pending_bond.take();
            let stereo = std::mem::take(&mut self.pending_stereo);
            self.ring_closures.insert(ring_num, RingOpening { atom: current, order, stereo });
        }
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        if !self.ring_closures.is_empty() {
            let open: Vec<_> = self.ring_closures.keys().collect();
            return Err(QsarError::Parse(format!("unmatched ring closure(s): {open:?}")));
        }
        if !self.stack.is_empty() {
            return Err(QsarError::Parse(format!("{} unmatched '(' in SMILES", self.stack.len())));
        }
        if self.pending_bond.is_some() {
            return Err(QsarError::Parse("SMILES ends with a bond symbol".into()));
        }
        if self.atoms.is_empty() {
            return Err(QsarError::Parse("SMILES contains no atoms".into()));
        }
        Ok(())
    }

    /// Implicit bonds between aromatic atoms outside any ring are single
    /// (biphenyl written as `c1ccccc1c1ccccc1`); aromatic atoms must be cyclic.
    fn demote_acyclic_aromatic_bonds(&mut self) -> Result<()> {
        let n = self.atoms.len();
        let mut adjacency = vec![Vec::new(); n];
        for (bi, b) in self.bonds.iter().enumerate() {
            adjacency[b.atom1].push((b.atom2, bi));
            adjacency[b.atom2].push((b.atom1, bi));
        }

        let mut in_ring = vec![false; n];
        for bi in 0..self.bonds.len() {
            let (a, b) = (self.bonds[bi].atom1, self.bonds[bi].atom2);
            if connected_without(&adjacency, a, b, bi) {
                in_ring[a] = true;
                in_ring[b] = true;
            } else if self.bonds[bi].order == BondOrder::Aromatic {
                self.bonds[bi].order = BondOrder::Single;
                self.bonds[bi].is_aromatic = false;
            }
        }

        if let Some(i) = (0..n).find(|&i| self.atoms[i].is_aromatic && !in_ring[i]) {
            return Err(QsarError::Parse(format!("non-ring atom {i} marked aromatic")));
        }
        Ok(())
    }

    fn assign_hydrogens(&mut self) -> Result<()> {
        for i in 0..self.atoms.len() {
            let atom = &self.atoms[i];
            let valences = allowed_valences(atom.atomic_number, atom.formal_charge);
            let Some(&lowest) = valences.first() else {
                continue;
            };

            let mut aromatic_bonds = 0usize;
            let mut other_orders = 0usize;
            let mut metal_bonds = 0usize;
            for b in self.bonds.iter().filter(|b| b.atom1 == i || b.atom2 == i) {
                match b.order {
                    BondOrder::Aromatic => aromatic_bonds += 1,
                    o => other_orders += o.as_f64() as usize,
                }
                let other = if b.atom1 == i { b.atom2 } else { b.atom1 };
                if b.order == BondOrder::Single && self.is_metal(other) {
                    metal_bonds += 1;
                }
            }

            if self.bracket[i] {
                if atom.is_aromatic {
                    continue;
                }
                let mut used = other_orders + aromatic_bonds + atom.implicit_hydrogens as usize;
                let highest = *valences.last().unwrap_or(&lowest) as usize;
                // Ligand bonds to metals, as in [NH3][Pt], are dative.
                if used > highest {
                    used = used.saturating_sub(metal_bonds);
                }
                if used > highest {
                    return Err(QsarError::Parse(format!(
                        "atom {i} exceeds its allowed valence"
                    )));
                }
                if used < lowest as usize {
                    self.atoms[i].radical_electrons = (lowest as usize - used) as u8;
                }
                continue;
            }

            if atom.is_aromatic {
                // One electron goes to the pi system unless an exocyclic
                // double bond already supplies it.
                let pi = if other_orders >= 2 { 0 } else { 1 };
                let used = aromatic_bonds + other_orders + pi;
                if used < lowest as usize {
                    self.atoms[i].implicit_hydrogens = (lowest as usize - used) as u8;
                }
            } else {
                let used = other_orders;
                match valences.iter().find(|&&v| v as usize >= used) {
                    Some(&v) => self.atoms[i].implicit_hydrogens = (v as usize - used) as u8,
                    None => {
                        return Err(QsarError::Parse(format!(
                            "atom {i} exceeds its allowed valence"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Transition and f-block metals: elements without a default valence.
    fn is_metal(&self, i: usize) -> bool {
        element_by_number(self.atoms[i].atomic_number).is_some_and(|e| e.valences.is_empty())
    }

    /// An aromatic atom with a free valence must take one double bond from
    /// its aromatic bonds (ring carbons, pyridine-type n). Pyrrole-type
    /// `[nH]`, `o`, `s` and atoms with an exocyclic double bond do not.
    fn needs_pi_bond(&self, i: usize) -> bool {
        let atom = &self.atoms[i];
        if !atom.is_aromatic {
            return false;
        }
        let Some(&lowest) = allowed_valences(atom.atomic_number, atom.formal_charge).first() else {
            return false;
        };
        let mut aromatic = 0usize;
        let mut other = 0usize;
        for b in self.bonds.iter().filter(|b| b.atom1 == i || b.atom2 == i) {
            match b.order {
                BondOrder::Aromatic => aromatic += 1,
                BondOrder::Single => other += 1,
                _ => return false,
            }
        }
        let used = aromatic + other + atom.implicit_hydrogens as usize + atom.radical_electrons as usize;
        aromatic > 0 && used < lowest as usize
    }

    /// Lowercase aromatic input must admit a Kekulé structure: the atoms
    /// that need a double bond are perfectly matched over aromatic bonds.
    fn check_kekulizable(&self) -> Result<()> {
        let n = self.atoms.len();
        let needs: Vec<bool> = (0..n).map(|i| self.needs_pi_bond(i)).collect();
        if !needs.iter().any(|&x| x) {
            return Ok(());
        }
        let mut partners = vec![Vec::new(); n];
        for b in self.bonds.iter().filter(|b| b.order == BondOrder::Aromatic) {
            if needs[b.atom1] && needs[b.atom2] {
                partners[b.atom1].push(b.atom2);
                partners[b.atom2].push(b.atom1);
            }
        }
        let mut mate = vec![None; n];
        let mut budget = KEKULE_SEARCH_BUDGET;
        match perfect_matching(&needs, &partners, &mut mate, &mut budget) {
            Some(false) => {
                let atom = (0..n).find(|&i| needs[i] && mate[i].is_none()).unwrap_or(0);
                Err(QsarError::Parse(format!("cannot kekulize aromatic system at atom {atom}")))
            }
            // Matched, or too large to settle; the latter is let through.
            _ => Ok(()),
        }
    }
}

/// Search steps allowed before an aromatic system is accepted unchecked.
const KEKULE_SEARCH_BUDGET: usize = 100_000;

/// Backtracking perfect matching over the atoms flagged in `needs`, always
/// extending the most constrained unmatched atom. `None` when the budget
/// runs out.
fn perfect_matching(
    needs: &[bool],
    partners: &[Vec<usize>],
    mate: &mut [Option<usize>],
    budget: &mut usize,
) -> Option<bool> {
    if *budget == 0 {
        return None;
    }
    *budget -= 1;
    let mut best: Option<(usize, usize)> = None;
    for i in (0..needs.len()).filter(|&i| needs[i] && mate[i].is_none()) {
        let free = partners[i].iter().filter(|&&j| mate[j].is_none()).count();
        if best.map_or(true, |(_, f)| free < f) {
            best = Some((i, free));
        }
    }
    let Some((i, _)) = best else {
        return Some(true);
    };
    for &j in &partners[i] {
        if mate[j].is_some() {
            continue;
        }
        mate[i] = Some(j);
        mate[j] = Some(i);
        match perfect_matching(needs, partners, mate, budget) {
            Some(false) => {
                mate[i] = None;
                mate[j] = None;
            }
            settled => return settled,
        }
    }
    Some(false)
}

/// Valences of an atom after accounting for charge: a charged main-group atom
/// behaves like its isoelectronic neighbor (N+ like C, O- like F).
pub(crate) fn allowed_valences(atomic_number: u8, charge: i8) -> &'static [u8] {
    let Some(elem) = element_by_number(atomic_number) else {
        return &[];
    };
    if charge == 0 || elem.valences.is_empty() {
        return elem.valences;
    }
    let shifted = atomic_number as i16 - charge as i16;
    let same_period = element_by_number(shifted.clamp(1, MAX_ATOMIC_NUMBER as i16) as u8)
        .filter(|e| e.period() == elem.period() && shifted > 0);
    match same_period {
        Some(e) => e.valences,
        None => &[],
    }
}

/// Whether `a` and `b` stay connected after removing bond `skip`.
fn connected_without(adjacency: &[Vec<(usize, usize)>], a: usize, b: usize, skip: usize) -> bool {
    let mut visited = vec![false; adjacency.len()];
    let mut stack = vec![a];
    visited[a] = true;
    while let Some(cur) = stack.pop() {
        if cur == b {
            return true;
        }
        for &(nb, bi) in &adjacency[cur] {
            if bi != skip && !visited[nb] {
                visited[nb] = true;
                stack.push(nb);
            }
        }
    }
    false
}

fn is_organic_atom_start(ch: u8) -> bool {
    matches!(
        ch,
        b'B' | b'C' | b'N' | b'O' | b'P' | b'S' | b'F' | b'I'
            | b'b' | b'c' | b'n' | b'o' | b'p' | b's'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_methane() {
        let mol = parse_smiles("C").unwrap();
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 4);
    }

    #[test]
    fn parse_ethanol() {
        let mol = parse_smiles("CCO").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 3);
        assert_eq!(mol.atoms[1].implicit_hydrogens, 2);
        assert_eq!(mol.atoms[2].implicit_hydrogens, 1);
    }

    #[test]
    fn heavy_elements_and_metal_ligands() {
        let cisplatin = parse_smiles("Cl[Pt](Cl)([NH3])[NH3]").unwrap();
        assert_eq!(cisplatin.atoms[1].atomic_number, 78);
        assert_eq!(cisplatin.atoms[3].implicit_hydrogens, 3);
        assert_eq!(cisplatin.atoms[3].radical_electrons, 0);
        for (smiles, z) in [("[U]", 92), ("C[Hg]C", 80), ("[Pb+2]", 82), ("[Gd+3]", 64), ("[Ba+2]", 56)] {
            let mol = parse_smiles(smiles).unwrap();
            assert!(mol.atoms.iter().any(|a| a.atomic_number == z), "{smiles}");
        }
        // Over-valent without a metal partner is still rejected.
        assert!(parse_smiles("C[NH3]").is_err());
    }

    #[test]
    fn dummy_atoms_are_rejected_explicitly() {
        for smiles in ["*C", "[*]", "C[*:1]"] {
            assert!(matches!(parse_smiles(smiles), Err(QsarError::InvalidInput(_))), "{smiles}");
        }
    }

    #[test]
    fn aromatic_input_must_kekulize() {
        for bad in ["c1cccc1", "c1ccnc1", "c1ccccc1c"] {
            assert!(parse_smiles(bad).is_err(), "{bad}");
        }
        assert!(matches!(parse_smiles("c1cccc1"), Err(QsarError::Parse(_))));
        for good in [
            "c1ccc2ccccc2c1",
            "c1ccc2[nH]ccc2c1",
            "Cn1cccc1",
            "O=c1cccc[nH]1",
            "[cH-]1cccc1",
            "c1cscn1",
            "C[n+]1ccccc1",
        ] {
            assert!(parse_smiles(good).is_ok(), "{good}");
        }
    }

    #[test]
    fn parse_benzene() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(mol.bond_count(), 6);
        for atom in &mol.atoms {
            assert!(atom.is_aromatic);
            assert_eq!(atom.implicit_hydrogens, 1);
        }
        assert!(mol.bonds.iter().all(|b| b.order == BondOrder::Aromatic));
    }

    #[test]
    fn aromatic_heteroatoms() {
        let pyridine = parse_smiles("c1ccncc1").unwrap();
        assert_eq!(pyridine.atoms[3].implicit_hydrogens, 0);
        let pyrrole = parse_smiles("c1cc[nH]c1").unwrap();
        assert_eq!(pyrrole.atoms[3].implicit_hydrogens, 1);
        let thiophene = parse_smiles("c1ccsc1").unwrap();
        assert_eq!(thiophene.atoms[3].implicit_hydrogens, 0);
        let pyridone = parse_smiles("O=c1cccc[nH]1").unwrap();
        assert_eq!(pyridone.atoms[1].implicit_hydrogens, 0);
    }

    #[test]
    fn hypervalent_sulfur_and_phosphorus() {
        let dmso2 = parse_smiles("CS(=O)(=O)C").unwrap();
        assert_eq!(dmso2.atoms[1].implicit_hydrogens, 0);
        let phosphoric = parse_smiles("OP(=O)(O)O").unwrap();
        assert_eq!(phosphoric.atoms[1].implicit_hydrogens, 0);
    }

    #[test]
    fn biphenyl_link_is_single() {
        let mol = parse_smiles("c1ccccc1c1ccccc1").unwrap();
        let link = mol.get_bond(5, 6).unwrap();
        assert_eq!(link.order, BondOrder::Single);
        assert!(!link.is_aromatic);
    }

    #[test]
    fn parse_branching() {
        let mol = parse_smiles("CC(C)C").unwrap();
        assert_eq!(mol.degree(1), 3);
    }

    #[test]
    fn parse_double_bond() {
        let mol = parse_smiles("C=C").unwrap();
        assert_eq!(mol.bonds[0].order, BondOrder::Double);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 2);
    }

    #[test]
    fn bracket_atoms_keep_stated_hydrogens() {
        let ammonium = parse_smiles("[NH4+]").unwrap();
        assert_eq!(ammonium.atoms[0].formal_charge, 1);
        assert_eq!(ammonium.atoms[0].implicit_hydrogens, 4);

        let carbon = parse_smiles("[C]").unwrap();
        assert_eq!(carbon.atoms[0].implicit_hydrogens, 0);
        assert_eq!(carbon.atoms[0].radical_electrons, 4);

        let methyl = parse_smiles("[CH3]").unwrap();
        assert_eq!(methyl.atoms[0].radical_electrons, 1);

        let acetate = parse_smiles("CC(=O)[O-]").unwrap();
        assert_eq!(acetate.atoms[3].formal_charge, -1);
        assert_eq!(acetate.atoms[3].radical_electrons, 0);
    }

    #[test]
    fn chirality_and_bond_stereo() {
        let mol = parse_smiles("N[C@@H](C)C(=O)O").unwrap();
        assert_eq!(mol.atoms[1].chirality, Chirality::Clockwise);
        let mol = parse_smiles("F/C=C/F").unwrap();
        assert_eq!(mol.bonds[0].stereo, BondStereo::Up);
        assert_eq!(mol.bonds[2].stereo, BondStereo::Up);
        assert_eq!(mol.bonds[1].stereo, BondStereo::None);
    }

    #[test]
    fn isotopes_and_classes() {
        let mol = parse_smiles("[13CH4:7]").unwrap();
        assert_eq!(mol.atoms[0].isotope, Some(13));
        assert_eq!(mol.atoms[0].implicit_hydrogens, 4);
    }

    #[test]
    fn charge_forms() {
        let mol = parse_smiles("[Fe+++]").unwrap();
        assert_eq!(mol.atoms[0].formal_charge, 3);
        let mol = parse_smiles("[O-2]").unwrap();
        assert_eq!(mol.atoms[0].formal_charge, -2);
    }

    #[test]
    fn disconnected_salt() {
        let mol = parse_smiles("[Na+].[Cl-]").unwrap();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bond_count(), 0);
    }

    #[test]
    fn two_digit_ring_closure() {
        let mol = parse_smiles("C%10CCCCCCCCC%10").unwrap();
        assert_eq!(mol.bond_count(), 10);
    }

    #[test]
    fn invalid_smiles_errors() {
        for bad in [
            "", "C(", "C1CC", "[", "C)", "C==C", "C=", "c", "CC(C)(C)(C)(C)C", "Xy", "[Zz]",
            "C11", "1C",
        ] {
            assert!(parse_smiles(bad).is_err(), "{bad:?} should fail");
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn simple_smiles() -> impl Strategy<Value = String> {
        let atoms = prop_oneof![Just("C"), Just("N"), Just("O"), Just("S"), Just("Cl")];
        proptest::collection::vec(atoms, 1..=20).prop_map(|parts| parts.join(""))
    }

    proptest! {
        #[test]
        fn parse_smiles_does_not_panic(s in "\\PC{0,100}") {
            let _ = parse_smiles(&s);
        }

        #[test]
        fn chains_parse_with_one_atom_per_symbol(smi in simple_smiles()) {
            let expected = smi.matches(char::is_uppercase).count();
            if let Ok(mol) = parse_smiles(&smi) {
                prop_assert_eq!(mol.atom_count(), expected);
                prop_assert_eq!(mol.bond_count(), expected - 1);
            }
        }
    }
}
