//! SMARTS pattern parsing and substructure matching.
//!
//! SMARTS extends SMILES with atom/bond query primitives and logical operators
//! for flexible substructure searching. Supported atom primitives: `*`, `a`,
//! `A`, element symbols (aliphatic upper case, aromatic lower case), `#n`,
//! `D`, `H`, `h`, `X`, `v`, `R`, `r`, charges and recursive `$(...)`,
//! combined with `!`, `&`, `,` and `;`. Bond primitives: `-`, `=`, `#`, `:`,
//! `~`, `@`, `/`, `\` with the same operators.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use qsarkit_core::{QsarError, Result};

use crate::element::element_by_symbol;
use crate::molecule::{BondOrder, Molecule};
use crate::ring::RingInfo;
use crate::smiles::allowed_valences;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A primitive atom query in SMARTS.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomPrimitive {
    /// Any atom with this atomic number (`#6`).
    AtomicNum(u8),
    /// Aliphatic atom of an element (`C`, `[N]`).
    AliphaticElement(u8),
    /// Aromatic atom of an element (`c`, `[n]`).
    AromaticElement(u8),
    /// Aromatic atoms (`a`).
    Aromatic,
    /// Aliphatic atoms (`A`).
    Aliphatic,
    /// Explicit connections (`D2`).
    Degree(u8),
    /// Total hydrogen count (`H1`).
    TotalHCount(u8),
    /// Implicit hydrogen count (`h1`); `None` means at least one.
    ImplicitHCount(Option<u8>),
    /// Formal charge (`+1`, `-`).
    Charge(i8),
    /// Number of SSSR rings containing the atom (`R2`); `None` means any ring.
    RingCount(Option<u8>),
    /// Smallest ring size (`r5`); `None` means any ring.
    RingSize(Option<u8>),
    /// Total connections including implicit hydrogens (`X3`).
    Connectivity(u8),
    /// Total valence (`v3`).
    Valence(u8),
    /// Matches any atom (`*`).
    Wildcard,
    /// Recursive environment test (`$(...)`).
    Recursive(RecursivePattern),
}

/// A recursive SMARTS with an identity used for memoised evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecursivePattern {
    id: usize,
    pub pattern: Box<SmartsPattern>,
}

static NEXT_RECURSIVE_ID: AtomicUsize = AtomicUsize::new(0);

/// A logical atom expression in SMARTS.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomExpr {
    Prim(AtomPrimitive),
    /// AND (juxtaposition, `&` or low-precedence `;`).
    And(Vec<AtomExpr>),
    /// OR (`,`).
    Or(Vec<AtomExpr>),
    /// Negation (`!`).
    Not(Box<AtomExpr>),
}

/// A bond expression in SMARTS.
#[derive(Debug, Clone, PartialEq)]
pub enum BondExpr {
    Single,
    Double,
    Triple,
    Aromatic,
    Ring,
    Any,
    /// Implicit bond between atoms: single or aromatic.
    SingleOrAromatic,
    Not(Box<BondExpr>),
    And(Vec<BondExpr>),
    Or(Vec<BondExpr>),
}

/// A single atom in a SMARTS pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartsAtom {
    pub expr: AtomExpr,
}

/// A bond between two atoms in a SMARTS pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartsBond {
    pub atom1: usize,
    pub atom2: usize,
    pub expr: BondExpr,
}

/// A parsed SMARTS pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartsPattern {
    pub atoms: Vec<SmartsAtom>,
    pub bonds: Vec<SmartsBond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl SmartsPattern {
    fn new(atoms: Vec<SmartsAtom>, bonds: Vec<SmartsBond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        SmartsPattern { atoms, bonds, adjacency }
    }
}

/// A mapping from pattern atoms to target atoms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstructureMatch {
    /// (pattern_atom_idx, target_atom_idx) pairs in pattern order.
    pub atom_mapping: Vec<(usize, usize)>,
}

impl SubstructureMatch {
    /// Matched target atoms, sorted.
    pub fn atom_set(&self) -> Vec<usize> {
        let mut atoms: Vec<usize> = self.atom_mapping.iter().map(|&(_, t)| t).collect();
        atoms.sort_unstable();
        atoms
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct SmartsParser<'a> {
    input: &'a [u8],
    pos: usize,
    atoms: Vec<SmartsAtom>,
    bonds: Vec<SmartsBond>,
    stack: Vec<usize>,
    prev_atom: Option<usize>,
    pending_bond: Option<BondExpr>,
    ring_closures: std::collections::BTreeMap<u16, (usize, Option<BondExpr>)>,
}

impl<'a> SmartsParser<'a> {
    fn new(input: &'a str) -> Self {
        SmartsParser {
            input: input.as_bytes(),
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            stack: Vec::new(),
            prev_atom: None,
            pending_bond: None,
            ring_closures: std::collections::BTreeMap::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn error(&self, msg: impl std::fmt::Display) -> QsarError {
        QsarError::Parse(format!("{msg} at position {} in SMARTS", self.pos))
    }

    fn parse(&mut self) -> Result<()> {
        while let Some(ch) = self.peek() {
            match ch {
                b'(' => {
                    self.advance();
                    let prev = self.prev_atom.ok_or_else(|| self.error("branch without atom"))?;
                    self.stack.push(prev);
                }
                b')' => {
                    self.advance();
                    self.prev_atom = Some(self.stack.pop().ok_or_else(|| self.error("unmatched ')'"))?);
                    self.pending_bond = None;
                }
                b'-' | b'=' | b'#' | b':' | b'~' | b'@' | b'!' | b'/' | b'\\' => {
                    let expr = self.parse_bond_or()?;
                    self.pending_bond = Some(expr);
                }
                b'%' => {
                    self.advance();
                    let ring_num = self.parse_two_digit_ring()?;
                    self.handle_ring_closure(ring_num)?;
                }
                b'0'..=b'9' => {
                    self.advance();
                    self.handle_ring_closure((ch - b'0') as u16)?;
                }
                b'[' => {
                    self.advance();
                    let expr = self.parse_atom_low_and()?;
                    if self.advance() != Some(b']') {
                        return Err(self.error("expected ']'"));
                    }
                    self.push_atom(expr);
                }
                b'*' => {
                    self.advance();
                    self.push_atom(AtomExpr::Prim(AtomPrimitive::Wildcard));
                }
                b'.' => {
                    self.advance();
                    self.prev_atom = None;
                    self.pending_bond = None;
                }
                c if is_organic_smarts(c) => {
                    let prim = self.parse_organic_atom()?;
                    self.push_atom(AtomExpr::Prim(prim));
                }
                other => {
                    return Err(self.error(format!("unexpected character '{}'", other as char)));
                }
            }
        }
        if !self.ring_closures.is_empty() {
            let open: Vec<_> = self.ring_closures.keys().collect();
            return Err(QsarError::Parse(format!("unmatched ring closure(s) in SMARTS: {open:?}")));
        }
        if !self.stack.is_empty() {
            return Err(QsarError::Parse("unmatched '(' in SMARTS".into()));
        }
        Ok(())
    }

    fn push_atom(&mut self, expr: AtomExpr) {
        let idx = self.atoms.len();
        self.atoms.push(SmartsAtom { expr });
        if let Some(prev) = self.prev_atom {
            let expr = self.pending_bond.take().unwrap_or(BondExpr::SingleOrAromatic);
            self.bonds.push(SmartsBond { atom1: prev, atom2: idx, expr });
        }
        self.pending_bond = None;
        self.prev_atom = Some(idx);
    }

    fn parse_organic_atom(&mut self) -> Result<AtomPrimitive> {
        let ch = self.advance().ok_or_else(|| self.error("unexpected end"))?;
        let z = match ch {
            b'C' if self.peek() == Some(b'l') => {
                self.advance();
                return Ok(AtomPrimitive::AliphaticElement(17));
            }
            b'B' if self.peek() == Some(b'r') => {
                self.advance();
                return Ok(AtomPrimitive::AliphaticElement(35));
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
        Ok(if ch.is_ascii_lowercase() {
            AtomPrimitive::AromaticElement(z)
        } else {
            AtomPrimitive::AliphaticElement(z)
        })
    }

    // Atom expression grammar, lowest precedence first:
    //   low_and  = or_expr (';' or_expr)*
    //   or_expr  = and_expr (',' and_expr)*
    //   and_expr = not_expr (('&' | juxtaposition) not_expr)*
    //   not_expr = '!'* primitive

    fn parse_atom_low_and(&mut self) -> Result<AtomExpr> {
        let mut terms = vec![self.parse_atom_or()?];
        while self.peek() == Some(b';') {
            self.advance();
            terms.push(self.parse_atom_or()?);
        }
        Ok(collapse(terms, AtomExpr::And))
    }

    fn parse_atom_or(&mut self) -> Result<AtomExpr> {
        let mut terms = vec![self.parse_atom_and()?];
        while self.peek() == Some(b',') {
            self.advance();
            terms.push(self.parse_atom_and()?);
        }
        Ok(collapse(terms, AtomExpr::Or))
    }

    fn parse_atom_and(&mut self) -> Result<AtomExpr> {
        let mut terms = vec![self.parse_atom_not()?];
        loop {
            match self.peek() {
                Some(b'&') => {
                    self.advance();
                    terms.push(self.parse_atom_not()?);
                }
                Some(ch) if !matches!(ch, b']' | b',' | b';' | b')') => {
                    terms.push(self.parse_atom_not()?);
                }
                _ => break,
            }
        }
        Ok(collapse(terms, AtomExpr::And))
    }

    fn parse_atom_not(&mut self) -> Result<AtomExpr> {
        if self.peek() == Some(b'!') {
            self.advance();
            Ok(AtomExpr::Not(Box::new(self.parse_atom_not()?)))
        } else {
            Ok(AtomExpr::Prim(self.parse_atom_primitive()?))
        }
    }

    fn parse_atom_primitive(&mut self) -> Result<AtomPrimitive> {
        let ch = self.peek().ok_or_else(|| self.error("unexpected end of atom expression"))?;
        match ch {
            b'$' => self.parse_recursive(),
            b'#' => {
                self.advance();
                let n = self.parse_number().ok_or_else(|| self.error("expected atomic number"))?;
                Ok(AtomPrimitive::AtomicNum(n.min(255) as u8))
            }
            b'*' => {
                self.advance();
                Ok(AtomPrimitive::Wildcard)
            }
            b'@' => {
                // Chirality is not checked.
                while self.peek() == Some(b'@') {
                    self.advance();
                }
                Ok(AtomPrimitive::Wildcard)
            }
            b'+' | b'-' => {
                self.advance();
                let sign: i8 = if ch == b'+' { 1 } else { -1 };
                if let Some(n) = self.parse_number() {
                    return Ok(AtomPrimitive::Charge(sign * n.min(127) as i8));
                }
                let mut magnitude = 1i8;
                while self.peek() == Some(ch) {
                    self.advance();
                    magnitude = magnitude.saturating_add(1);
                }
                Ok(AtomPrimitive::Charge(sign * magnitude))
            }
            b'H' => {
                self.advance();
                // A bare `[H]` (optionally charged) is the hydrogen atom itself.
                if self.pos >= 2 && self.input[self.pos - 2] == b'[' {
                    if matches!(self.peek(), Some(b']') | Some(b'+') | Some(b'-')) {
                        return Ok(AtomPrimitive::AtomicNum(1));
                    }
                }
                Ok(AtomPrimitive::TotalHCount(self.parse_number().unwrap_or(1).min(255) as u8))
            }
            b'h' => {
                self.advance();
                Ok(AtomPrimitive::ImplicitHCount(self.parse_number().map(|n| n.min(255) as u8)))
            }
            b'D' => {
                self.advance();
                Ok(AtomPrimitive::Degree(self.parse_number().unwrap_or(1).min(255) as u8))
            }
            b'X' => {
                self.advance();
                Ok(AtomPrimitive::Connectivity(self.parse_number().unwrap_or(1).min(255) as u8))
            }
            b'v' => {
                self.advance();
                Ok(AtomPrimitive::Valence(self.parse_number().unwrap_or(1).min(255) as u8))
            }
            b'R' if !self.two_letter_element_ahead() => {
                self.advance();
                Ok(AtomPrimitive::RingCount(self.parse_number().map(|n| n.min(255) as u8)))
            }
            b'r' => {
                self.advance();
                Ok(AtomPrimitive::RingSize(self.parse_number().map(|n| n.min(255) as u8)))
            }
            b'a' if !self.two_letter_element_ahead() => {
                self.advance();
                Ok(AtomPrimitive::Aromatic)
            }
            b'A' if !self.two_letter_element_ahead() => {
                self.advance();
                Ok(AtomPrimitive::Aliphatic)
            }
            c if c.is_ascii_alphabetic() => self.parse_element_symbol(),
            other => Err(self.error(format!("unexpected '{}' in atom expression", other as char))),
        }
    }

    /// Whether the next two characters spell an element symbol (`Al`, `Ag`,
    /// `As`, `Rb`, `Ru`, `Rh`), which wins over one-letter primitives.
    fn two_letter_element_ahead(&self) -> bool {
        match (self.peek(), self.peek_at(1)) {
            (Some(a), Some(b)) if b.is_ascii_lowercase() => {
                let sym = format!("{}{}", a.to_ascii_uppercase() as char, b as char);
                a.is_ascii_uppercase() && element_by_symbol(&sym).is_some()
            }
            _ => false,
        }
    }

    fn parse_element_symbol(&mut self) -> Result<AtomPrimitive> {
        let ch = self.advance().ok_or_else(|| self.error("unexpected end"))?;
        let aromatic = ch.is_ascii_lowercase();
        let first = ch.to_ascii_uppercase() as char;

        if let Some(next) = self.peek().filter(u8::is_ascii_lowercase) {
            let two = format!("{first}{}", next as char);
            // Aromatic two-letter forms are limited to se/as/te.
            let allowed = !aromatic || matches!(two.as_str(), "Se" | "As" | "Te");
            if allowed {
                if let Some(e) = element_by_symbol(&two) {
                    self.advance();
                    return Ok(element_primitive(e.atomic_number, aromatic));
                }
            }
        }
        let e = element_by_symbol(&first.to_string())
            .ok_or_else(|| self.error(format!("unknown element '{first}'")))?;
        Ok(element_primitive(e.atomic_number, aromatic))
    }

    fn parse_recursive(&mut self) -> Result<AtomPrimitive> {
        self.advance(); // '$'
        if self.advance() != Some(b'(') {
            return Err(self.error("expected '(' after '$'"));
        }
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.peek() {
            match c {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        if depth != 0 {
            return Err(self.error("unmatched '(' in recursive SMARTS"));
        }
        let inner = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("invalid UTF-8 in recursive SMARTS"))?;
        self.pos += 1; // ')'
        let pattern = parse_smarts(inner)?;
        Ok(AtomPrimitive::Recursive(RecursivePattern {
            id: NEXT_RECURSIVE_ID.fetch_add(1, Ordering::Relaxed),
            pattern: Box::new(pattern),
        }))
    }

    // Bond expressions share the atom operator precedence.

    fn parse_bond_or(&mut self) -> Result<BondExpr> {
        let mut low = vec![self.parse_bond_comma()?];
        while self.peek() == Some(b';') {
            self.advance();
            low.push(self.parse_bond_comma()?);
        }
        Ok(collapse(low, BondExpr::And))
    }

    fn parse_bond_comma(&mut self) -> Result<BondExpr> {
        let mut terms = vec![self.parse_bond_and()?];
        while self.peek() == Some(b',') {
            self.advance();
            terms.push(self.parse_bond_and()?);
        }
        Ok(collapse(terms, BondExpr::Or))
    }

    fn parse_bond_and(&mut self) -> Result<BondExpr> {
        let mut terms = vec![self.parse_bond_not()?];
        loop {
            match self.peek() {
                Some(b'&') => {
                    self.advance();
                    terms.push(self.parse_bond_not()?);
                }
                Some(c) if is_bond_primitive(c) || c == b'!' => terms.push(self.parse_bond_not()?),
                _ => break,
            }
        }
        Ok(collapse(terms, BondExpr::And))
    }

    fn parse_bond_not(&mut self) -> Result<BondExpr> {
        if self.peek() == Some(b'!') {
            self.advance();
            return Ok(BondExpr::Not(Box::new(self.parse_bond_not()?)));
        }
        let ch = self.advance().ok_or_else(|| self.error("expected bond primitive"))?;
        Ok(match ch {
            b'-' | b'/' | b'\\' => BondExpr::Single,
            b'=' => BondExpr::Double,
            b'#' => BondExpr::Triple,
            b':' => BondExpr::Aromatic,
            b'~' => BondExpr::Any,
            b'@' => BondExpr::Ring,
            other => return Err(self.error(format!("unexpected '{}' in bond", other as char))),
        })
    }

    fn parse_number(&mut self) -> Option<u32> {
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
            return Err(self.error("invalid ring closure after '%'"));
        }
        Ok((d1 - b'0') as u16 * 10 + (d2 - b'0') as u16)
    }

    fn handle_ring_closure(&mut self, ring_num: u16) -> Result<()> {
        let current = self
            .prev_atom
            .ok_or_else(|| self.error("ring closure without preceding atom"))?;

        if let Some((open_atom, open_bond)) = self.ring_closures.remove(&ring_num) {
            let expr = self
                .pending_bond
                .take()
                .or(open_bond)
                .unwrap_or(BondExpr::SingleOrAromatic);
            self.bonds.push(SmartsBond { atom1: open_atom, atom2: current, expr });
        } else {
            self.ring_closures.insert(ring_num, (current, self.pending_bond.take()));
        }
        Ok(())
    }
}

fn collapse<T>(mut terms: Vec<T>, join: fn(Vec<T>) -> T) -> T {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        join(terms)
    }
}

fn element_primitive(z: u8, aromatic: bool) -> AtomPrimitive {
    if aromatic {
        AtomPrimitive::AromaticElement(z)
    } else {
        AtomPrimitive::AliphaticElement(z)
    }
}

fn is_organic_smarts(ch: u8) -> bool {
    matches!(
        ch,
        b'B' | b'C' | b'N' | b'O' | b'P' | b'S' | b'F' | b'I'
            | b'b' | b'c' | b'n' | b'o' | b'p' | b's'
    )
}

fn is_bond_primitive(ch: u8) -> bool {
    matches!(ch, b'-' | b'=' | b'#' | b':' | b'~' | b'@' | b'/' | b'\\')
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a SMARTS string into a `SmartsPattern`.
pub fn parse_smarts(smarts: &str) -> Result<SmartsPattern> {
    if smarts.is_empty() {
        return Err(QsarError::Parse("empty SMARTS string".into()));
    }
    let mut parser = SmartsParser::new(smarts);
    parser.parse()?;
    if parser.atoms.is_empty() {
        return Err(QsarError::Parse("SMARTS contains no atoms".into()));
    }
    Ok(SmartsPattern::new(parser.atoms, parser.bonds))
}

/// Check if any substructure of `target` matches the SMARTS `pattern`.
pub fn smarts_match(target: &Molecule, pattern: &SmartsPattern) -> bool {
    SmartsTarget::new(target).matches(pattern)
}

/// Find all substructure matches of SMARTS `pattern` in `target`.
pub fn smarts_find_all(target: &Molecule, pattern: &SmartsPattern) -> Vec<SubstructureMatch> {
    SmartsTarget::new(target).find_all(pattern)
}

/// Number of matches with distinct atom sets.
pub fn smarts_count_unique(target: &Molecule, pattern: &SmartsPattern) -> usize {
    SmartsTarget::new(target).count_unique(pattern)
}

/// A molecule prepared for repeated SMARTS queries.
///
/// Ring perception runs once; recursive sub-patterns are memoised per atom.
pub struct SmartsTarget<'m> {
    mol: &'m Molecule,
    rings: RingInfo,
    recursive_cache: RefCell<HashMap<(usize, usize), bool>>,
}

impl<'m> SmartsTarget<'m> {
    pub fn new(mol: &'m Molecule) -> Self {
        SmartsTarget {
            mol,
            rings: RingInfo::new(mol),
            recursive_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn molecule(&self) -> &Molecule {
        self.mol
    }

    pub fn matches(&self, pattern: &SmartsPattern) -> bool {
        let mut state = Vf2State::new(self, pattern, true);
        state.search(None);
        !state.matches.is_empty()
    }

    pub fn find_all(&self, pattern: &SmartsPattern) -> Vec<SubstructureMatch> {
        let mut state = Vf2State::new(self, pattern, false);
        state.search(None);
        state.matches
    }

    /// Count matches after collapsing those that cover the same atoms.
    pub fn count_unique(&self, pattern: &SmartsPattern) -> usize {
        self.find_all(pattern)
            .iter()
            .map(SubstructureMatch::atom_set)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Whether `pattern` matches with its first atom pinned to `atom`.
    fn matches_anchored(&self, pattern: &SmartsPattern, atom: usize) -> bool {
        let mut state = Vf2State::new(self, pattern, true);
        state.search(Some(atom));
        !state.matches.is_empty()
    }

    fn eval_atom(&self, expr: &AtomExpr, atom: usize) -> bool {
        match expr {
            AtomExpr::Prim(prim) => self.eval_primitive(prim, atom),
            AtomExpr::And(terms) => terms.iter().all(|t| self.eval_atom(t, atom)),
            AtomExpr::Or(terms) => terms.iter().any(|t| self.eval_atom(t, atom)),
            AtomExpr::Not(inner) => !self.eval_atom(inner, atom),
        }
    }

    fn eval_primitive(&self, prim: &AtomPrimitive, idx: usize) -> bool {
        let mol = self.mol;
        let atom = &mol.atoms[idx];
        match prim {
            AtomPrimitive::AtomicNum(n) => atom.atomic_number == *n,
            AtomPrimitive::AliphaticElement(n) => atom.atomic_number == *n && !atom.is_aromatic,
            AtomPrimitive::AromaticElement(n) => atom.atomic_number == *n && atom.is_aromatic,
            AtomPrimitive::Aromatic => atom.is_aromatic,
            AtomPrimitive::Aliphatic => !atom.is_aromatic,
            AtomPrimitive::Degree(d) => mol.degree(idx) == *d as usize,
            AtomPrimitive::TotalHCount(h) => mol.total_hydrogens(idx) == *h as usize,
            AtomPrimitive::ImplicitHCount(None) => atom.implicit_hydrogens > 0,
            AtomPrimitive::ImplicitHCount(Some(h)) => atom.implicit_hydrogens == *h,
            AtomPrimitive::Charge(c) => atom.formal_charge == *c,
            AtomPrimitive::RingCount(None) => self.rings.is_ring_atom(idx),
            AtomPrimitive::RingCount(Some(n)) => self.rings.atom_ring_count(idx) == *n as usize,
            AtomPrimitive::RingSize(None) => self.rings.is_ring_atom(idx),
            AtomPrimitive::RingSize(Some(s)) => self.rings.smallest_ring_size(idx) == Some(*s as usize),
            AtomPrimitive::Connectivity(x) => {
                mol.degree(idx) + atom.implicit_hydrogens as usize == *x as usize
            }
            AtomPrimitive::Valence(v) => total_valence(mol, idx) == *v as usize,
            AtomPrimitive::Wildcard => true,
            AtomPrimitive::Recursive(rec) => {
                if let Some(&hit) = self.recursive_cache.borrow().get(&(rec.id, idx)) {
                    return hit;
                }
                let hit = self.matches_anchored(&rec.pattern, idx);
                self.recursive_cache.borrow_mut().insert((rec.id, idx), hit);
                hit
            }
        }
    }

    fn eval_bond(&self, expr: &BondExpr, bond_idx: usize) -> bool {
        let bond = &self.mol.bonds[bond_idx];
        let aromatic = bond.is_aromatic || bond.order == BondOrder::Aromatic;
        match expr {
            BondExpr::Single => bond.order == BondOrder::Single && !aromatic,
            BondExpr::Double => bond.order == BondOrder::Double && !aromatic,
            BondExpr::Triple => bond.order == BondOrder::Triple,
            BondExpr::Aromatic => aromatic,
            BondExpr::SingleOrAromatic => aromatic || bond.order == BondOrder::Single,
            BondExpr::Ring => self.rings.is_ring_bond(bond_idx),
            BondExpr::Any => true,
            BondExpr::Not(inner) => !self.eval_bond(inner, bond_idx),
            BondExpr::And(terms) => terms.iter().all(|t| self.eval_bond(t, bond_idx)),
            BondExpr::Or(terms) => terms.iter().any(|t| self.eval_bond(t, bond_idx)),
        }
    }
}

/// Total valence: bond orders plus hydrogens. Aromatic bonds count one each,
/// with one extra pi electron when the atom would otherwise fall short of its
/// default valence (benzene carbon is v4, pyrrole nitrogen v3).
fn total_valence(mol: &Molecule, idx: usize) -> usize {
    let mut aromatic = 0usize;
    let mut other = 0usize;
    for &(_, bi) in &mol.adjacency[idx] {
        match mol.bonds[bi].order {
            BondOrder::Aromatic => aromatic += 1,
            o => other += o.as_f64() as usize,
        }
    }
    let used = aromatic + other + mol.atoms[idx].implicit_hydrogens as usize;
    if aromatic == 0 {
        return used;
    }
    let atom = &mol.atoms[idx];
    let lowest = allowed_valences(atom.atomic_number, atom.formal_charge)
        .first()
        .map_or(used, |&v| v as usize);
    if used < lowest { used + 1 } else { used }
}

// ---------------------------------------------------------------------------
// VF2 subgraph isomorphism for SMARTS
// ---------------------------------------------------------------------------

struct Vf2State<'a, 'm> {
    target: &'a SmartsTarget<'m>,
    pattern: &'a SmartsPattern,
    early_exit: bool,
    core_target: Vec<Option<usize>>,
    core_pattern: Vec<Option<usize>>,
    matches: Vec<SubstructureMatch>,
}

impl<'a, 'm> Vf2State<'a, 'm> {
    fn new(target: &'a SmartsTarget<'m>, pattern: &'a SmartsPattern, early_exit: bool) -> Self {
        Vf2State {
            target,
            pattern,
            early_exit,
            core_target: vec![None; target.mol.atom_count()],
            core_pattern: vec![None; pattern.atoms.len()],
            matches: Vec::new(),
        }
    }

    fn search(&mut self, anchor: Option<usize>) {
        if self.pattern.atoms.is_empty() || self.pattern.atoms.len() > self.target.mol.atom_count() {
            return;
        }
        match anchor {
            Some(t) => {
                if self.is_feasible(0, t) {
                    self.core_pattern[0] = Some(t);
                    self.core_target[t] = Some(0);
                    self.match_recursive(1);
                }
            }
            None => self.match_recursive(0),
        }
    }

    fn done(&self) -> bool {
        self.early_exit && !self.matches.is_empty()
    }

    fn match_recursive(&mut self, depth: usize) {
        if self.done() {
            return;
        }
        if depth == self.pattern.atoms.len() {
            let mapping = self
                .core_pattern
                .iter()
                .enumerate()
                .filter_map(|(p, t)| t.map(|t| (p, t)))
                .collect();
            self.matches.push(SubstructureMatch { atom_mapping: mapping });
            return;
        }

        for target_atom in self.find_candidates(depth) {
            if self.core_target[target_atom].is_some() || !self.is_feasible(depth, target_atom) {
                continue;
            }
            self.core_pattern[depth] = Some(target_atom);
            self.core_target[target_atom] = Some(depth);
            self.match_recursive(depth + 1);
            self.core_pattern[depth] = None;
            self.core_target[target_atom] = None;
            if self.done() {
                return;
            }
        }
    }

    fn find_candidates(&self, pattern_atom: usize) -> Vec<usize> {
        let mol = self.target.mol;
        let anchor = self.pattern.adjacency[pattern_atom]
            .iter()
            .find_map(|&(p_neighbor, _)| self.core_pattern[p_neighbor]);
        match anchor {
            Some(t_mapped) => mol.adjacency[t_mapped]
                .iter()
                .map(|&(n, _)| n)
                .filter(|&n| self.core_target[n].is_none())
                .collect(),
            None => (0..mol.atom_count())
                .filter(|&i| self.core_target[i].is_none())
                .collect(),
        }
    }

    fn is_feasible(&self, pattern_atom: usize, target_atom: usize) -> bool {
        for &(p_neighbor, p_bond_idx) in &self.pattern.adjacency[pattern_atom] {
            if let Some(t_mapped) = self.core_pattern[p_neighbor] {
                match self.target.mol.bond_index(target_atom, t_mapped) {
                    Some(tbi) if self.target.eval_bond(&self.pattern.bonds[p_bond_idx].expr, tbi) => {}
                    _ => return false,
                }
            }
        }
        self.target.eval_atom(&self.pattern.atoms[pattern_atom].expr, target_atom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn hits(smarts: &str, smiles: &str) -> bool {
        smarts_match(&parse_smiles(smiles).unwrap(), &parse_smarts(smarts).unwrap())
    }

    fn count(smarts: &str, smiles: &str) -> usize {
        smarts_count_unique(&parse_smiles(smiles).unwrap(), &parse_smarts(smarts).unwrap())
    }

    #[test]
    fn atomic_num_and_negation() {
        assert!(hits("[#6]", "C"));
        assert!(!hits("[#6]", "N"));
        assert!(hits("[!#6]", "N"));
        assert!(!hits("[!#6]", "C"));
    }

    #[test]
    fn aromatic_vs_aliphatic_symbols() {
        assert!(hits("c", "c1ccccc1"));
        assert!(!hits("C", "c1ccccc1"));
        assert!(hits("[cH]", "c1ccccc1"));
        assert!(!hits("[cH]", "CC"));
        assert!(hits("[a]", "c1ccccc1"));
        assert!(!hits("[a]", "CC"));
    }

    #[test]
    fn hydrogen_counts() {
        assert!(hits("[OH]", "CCO"));
        assert!(!hits("[OH]", "COC"));
        assert!(hits("[CH3]", "CC"));
        assert!(hits("[NH2]", "CN"));
        assert!(hits("[H]", "[H]C([H])([H])[H]"));
    }

    #[test]
    fn degree_connectivity_valence() {
        assert!(hits("[D3]", "CC(C)C"));
        assert!(hits("[CX4]", "CC"));
        assert!(hits("[CX3]=O", "CC=O"));
        assert!(hits("[N;v3]", "CN"));
        assert!(hits("[c;v4]", "c1ccccc1"));
        assert!(hits("[n;v3]", "c1cc[nH]c1"));
    }

    #[test]
    fn ring_primitives() {
        assert!(hits("[R]", "c1ccccc1"));
        assert!(!hits("[R]", "CC"));
        assert!(hits("[R0]", "CC"));
        assert!(hits("[r6]", "c1ccccc1"));
        assert!(!hits("[r6]", "C1CCCC1"));
        assert!(hits("[R2]", "c1ccc2ccccc2c1"));
        assert!(hits("C@C", "C1CCCCC1"));
        assert!(!hits("C!@C", "C1CCCCC1"));
        assert!(hits("C-!@C", "CC1CCCCC1"));
    }

    #[test]
    fn charges() {
        assert!(hits("[N+](=O)[O-]", "C[N+](=O)[O-]"));
        assert!(hits("[O;H1,-1]", "CC(=O)[O-]"));
        assert!(hits("[NX4+]", "C[N+](C)(C)C"));
    }

    #[test]
    fn recursive_smarts() {
        assert!(hits("[$([OH])]", "Oc1ccccc1"));
        assert!(hits("[C!$(C=O)]-[OH]", "CCO"));
        assert!(!hits("[C!$(C=O)]-[OH]", "CC(=O)O"));
        assert!(hits("[$(C=O)]", "CC=O"));
    }

    #[test]
    fn implicit_bond_is_single_or_aromatic() {
        assert!(hits("CC", "CC"));
        assert!(!hits("CC", "C=C"));
        assert!(hits("cc", "c1ccccc1"));
        assert!(hits("C~C", "C=C"));
    }

    #[test]
    fn unique_counts_collapse_symmetry() {
        assert_eq!(count("c1ccccc1", "c1ccccc1"), 1);
        assert_eq!(count("[#6]", "CCO"), 2);
        assert_eq!(count("[OX2H]", "OCCO"), 2);
        let all = smarts_find_all(&parse_smiles("c1ccccc1").unwrap(), &parse_smarts("c1ccccc1").unwrap());
        assert_eq!(all.len(), 12);
    }

    #[test]
    fn halogens_and_two_letter_elements() {
        assert!(hits("[Cl]", "CCl"));
        assert!(hits("Br", "CBr"));
        assert!(hits("[#9,#17,#35,#53]", "CI"));
        assert!(hits("[Na]", "[Na+].[Cl-]"));
    }

    #[test]
    fn invalid_smarts_error() {
        assert!(parse_smarts("").is_err());
        assert!(parse_smarts("[").is_err());
        assert!(parse_smarts("C1CC").is_err());
        assert!(parse_smarts("[$(C]").is_err());
        assert!(parse_smarts("C)").is_err());
    }

    #[test]
    fn target_reuse_matches_free_functions() {
        let mol = parse_smiles("OCC(=O)O").unwrap();
        let target = SmartsTarget::new(&mol);
        let p = parse_smarts("[CX3](=O)[OX2H1]").unwrap();
        assert!(target.matches(&p));
        assert_eq!(target.count_unique(&p), smarts_count_unique(&mol, &p));
        assert_eq!(target.molecule().atom_count(), 5);
    }
}
