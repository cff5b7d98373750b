//! Hashed bit-vector fingerprints and similarity.
//!
//! Morgan (circular), atom-pair, topological-torsion, linear-path and
//! SMARTS-pattern fingerprints, all folded into a fixed-width bit vector
//! with FNV-1a hashing.

use qsarkit_core::{ContentAddressable, QsarError, Result};
use sha2::{Digest, Sha256};

use crate::descriptors::shortest_path_matrix;
use crate::molecule::{BondOrder, Molecule};
use crate::ring::RingInfo;
use crate::smarts::{parse_smarts, SmartsTarget};

/// Default width of the hashed fingerprints.
pub const DEFAULT_FP_BITS: usize = 2048;

/// A fixed-size bit vector fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    bits: Vec<u64>,
    nbits: usize,
}

impl Fingerprint {
    /// Create a new fingerprint of the given size (storage rounded up to 64).
    pub fn new(nbits: usize) -> Self {
        Fingerprint {
            bits: vec![0u64; nbits.div_ceil(64)],
            nbits,
        }
    }

    /// Set a bit at the given position (taken modulo the width).
    pub fn set_bit(&mut self, pos: usize) {
        if self.nbits == 0 {
            return;
        }
        let pos = pos % self.nbits;
        self.bits[pos / 64] |= 1u64 << (pos % 64);
    }

    pub fn get_bit(&self, pos: usize) -> bool {
        if self.nbits == 0 {
            return false;
        }
        let pos = pos % self.nbits;
        (self.bits[pos / 64] >> (pos % 64)) & 1 == 1
    }

    /// Count the number of set bits.
    pub fn count_ones(&self) -> u32 {
        self.bits.iter().map(|w| w.count_ones()).sum()
    }

    pub fn nbits(&self) -> usize {
        self.nbits
    }

    fn set_hash(&mut self, hash: u64) {
        if self.nbits > 0 {
            self.set_bit(fold_hash(hash, self.nbits));
        }
    }
}

impl ContentAddressable for Fingerprint {
    fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for word in &self.bits {
            hasher.update(word.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Tanimoto similarity coefficient between two fingerprints of equal width.
///
/// Returns 1.0 for identical fingerprints (including two empty ones).
pub fn tanimoto_similarity(fp1: &Fingerprint, fp2: &Fingerprint) -> Result<f64> {
    if fp1.nbits != fp2.nbits {
        return Err(QsarError::InvalidInput(format!(
            "fingerprint widths differ: {} vs {}",
            fp1.nbits, fp2.nbits
        )));
    }
    let (mut and_count, mut or_count) = (0u32, 0u32);
    for (w1, w2) in fp1.bits.iter().zip(&fp2.bits) {
        and_count += (w1 & w2).count_ones();
        or_count += (w1 | w2).count_ones();
    }
    if or_count == 0 {
        return Ok(1.0);
    }
    Ok(and_count as f64 / or_count as f64)
}

// ---------------------------------------------------------------------------
// Morgan
// ---------------------------------------------------------------------------

/// Compute a Morgan (ECFP-like) fingerprint.
///
/// `radius` controls the neighborhood size (2 = ECFP4, 3 = ECFP6).
pub fn morgan_fingerprint(mol: &Molecule, radius: usize, nbits: usize) -> Fingerprint {
    let n = mol.atom_count();
    let mut fp = Fingerprint::new(nbits);
    if n == 0 {
        return fp;
    }
    let rings = RingInfo::new(mol);

    let mut identifiers: Vec<u64> = mol
        .atoms
        .iter()
        .enumerate()
        .map(|(i, atom)| {
            hash_values(&[
                atom.atomic_number as u64,
                mol.heavy_degree(i) as u64,
                mol.total_hydrogens(i) as u64,
                atom.formal_charge as u64,
                rings.is_ring_atom(i) as u64,
                atom.is_aromatic as u64,
            ])
        })
        .collect();
    for &id in &identifiers {
        fp.set_hash(id);
    }

    for round in 0..radius {
        let next: Vec<u64> = (0..n)
            .map(|i| {
                let mut neighbor_ids: Vec<(u64, u8)> = mol.adjacency[i]
                    .iter()
                    .map(|&(nb, bi)| (identifiers[nb], mol.bonds[bi].order as u8))
                    .collect();
                neighbor_ids.sort_unstable();
                let mut h = fnv1a_update(fnv1a_update(FNV_OFFSET, round as u64), identifiers[i]);
                for (nid, order) in neighbor_ids {
                    h = fnv1a_update(fnv1a_update(h, order as u64), nid);
                }
                h
            })
            .collect();
        for &id in &next {
            fp.set_hash(id);
        }
        identifiers = next;
    }
    fp
}

// ---------------------------------------------------------------------------
// Atom pairs and torsions
// ---------------------------------------------------------------------------

const MAX_PAIR_DISTANCE: usize = 30;

/// Pi electrons on an atom: one per aromatic atom, otherwise the bond order
/// excess over single bonds.
fn pi_electrons(mol: &Molecule, idx: usize) -> u64 {
    if mol.atoms[idx].is_aromatic {
        return 1;
    }
    mol.adjacency[idx]
        .iter()
        .map(|&(_, bi)| match mol.bonds[bi].order {
            BondOrder::Double => 1,
            BondOrder::Triple => 2,
            _ => 0,
        })
        .sum()
}

/// Atom code: element, heavy neighbours less `branch_offset`, pi electrons.
fn atom_code(mol: &Molecule, idx: usize, branch_offset: usize) -> u64 {
    let z = mol.atoms[idx].atomic_number as u64;
    let branches = mol.heavy_degree(idx).saturating_sub(branch_offset).min(7) as u64;
    let pi = pi_electrons(mol, idx).min(3);
    (z << 5) | (branches << 2) | pi
}

/// Hashed atom-pair fingerprint over topological distances 1..=30.
pub fn atom_pair_fingerprint(mol: &Molecule, nbits: usize) -> Fingerprint {
    let mut fp = Fingerprint::new(nbits);
    let n = mol.atom_count();
    let dist = shortest_path_matrix(mol);
    let codes: Vec<u64> = (0..n).map(|i| atom_code(mol, i, 0)).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            let d = dist[i][j];
            if d == 0 || d > MAX_PAIR_DISTANCE {
                continue;
            }
            let (a, b) = if codes[i] <= codes[j] { (codes[i], codes[j]) } else { (codes[j], codes[i]) };
            fp.set_hash(hash_values(&[a, d as u64, b]));
        }
    }
    fp
}

/// Hashed topological-torsion fingerprint over linear four-atom paths.
pub fn torsion_fingerprint(mol: &Molecule, nbits: usize) -> Fingerprint {
    let mut fp = Fingerprint::new(nbits);
    for path in linear_paths(mol, 3) {
        let last = path.len() - 1;
        let codes: Vec<u64> = path
            .iter()
            .enumerate()
            .map(|(k, &a)| atom_code(mol, a, if k == 0 || k == last { 1 } else { 2 }))
            .collect();
        let reversed: Vec<u64> = codes.iter().rev().copied().collect();
        fp.set_hash(hash_values(codes.min(reversed).as_slice()));
    }
    fp
}

// ---------------------------------------------------------------------------
// Linear paths
// ---------------------------------------------------------------------------

/// All simple paths with exactly `bonds` bonds, each reported once.
fn linear_paths(mol: &Molecule, bonds: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut visited = vec![false; mol.atom_count()];
    let mut path = Vec::with_capacity(bonds + 1);
    for start in 0..mol.atom_count() {
        path.push(start);
        visited[start] = true;
        extend_path(mol, bonds, &mut path, &mut visited, &mut out);
        visited[start] = false;
        path.pop();
    }
    out
}

fn extend_path(mol: &Molecule, bonds: usize, path: &mut Vec<usize>, visited: &mut [bool], out: &mut Vec<Vec<usize>>) {
    if path.len() == bonds + 1 {
        // Keep one orientation of each path.
        if path[0] < path[bonds] || bonds == 0 {
            out.push(path.clone());
        }
        return;
    }
    let Some(&tail) = path.last() else {
        return;
    };
    for &(nb, _) in &mol.adjacency[tail] {
        if !visited[nb] {
            visited[nb] = true;
            path.push(nb);
            extend_path(mol, bonds, path, visited, out);
            path.pop();
            visited[nb] = false;
        }
    }
}

/// Path fingerprint over linear paths of `min_path..=max_path` bonds; each
/// path sets two bits.
pub fn path_fingerprint(mol: &Molecule, min_path: usize, max_path: usize, nbits: usize) -> Fingerprint {
    let mut fp = Fingerprint::new(nbits);
    for len in min_path.max(1)..=max_path {
        for path in linear_paths(mol, len) {
            let forward = path_key(mol, &path);
            let rev_path: Vec<usize> = path.iter().rev().copied().collect();
            let backward = path_key(mol, &rev_path);
            let h = hash_values(forward.min(backward).as_slice());
            fp.set_hash(h);
            fp.set_hash(fnv1a_update(h, 0x5bd1e995));
        }
    }
    fp
}

fn path_key(mol: &Molecule, path: &[usize]) -> Vec<u64> {
    let mut key = Vec::with_capacity(path.len() * 2);
    for (k, &a) in path.iter().enumerate() {
        let atom = &mol.atoms[a];
        key.push(((atom.atomic_number as u64) << 1) | atom.is_aromatic as u64);
        if let Some(&next) = path.get(k + 1) {
            let order = mol.get_bond(a, next).map_or(0, |b| b.order as u64 + 1);
            key.push(order);
        }
    }
    key
}

// ---------------------------------------------------------------------------
// Pattern fingerprint
// ---------------------------------------------------------------------------

/// Generic topology queries; each match is hashed with the elements and
/// bond orders it covers.
const PATTERN_QUERIES: [&str; 12] = [
    "[*]~[*]",
    "[*]~[*]~[*]",
    "[R]~1~[R]~[R]~1",
    "[*]~[*]~[*]~[*]",
    "[*]~[*](~[*])~[*]",
    "[*]~[R]~1[R]~[R]~1",
    "[R]~1[R]~[R]~[R]~1",
    "[*]~[*]~[*]~[*]~[*]",
    "[*]~[*]~[*](~[*])~[*]",
    "[*]~[R]~1[R]~[R]~[R]~1",
    "[R]~1~[R]~[R]~[R]~[R]~1",
    "[R]~1~[R]~[R]~[R]~[R]~[R]~1",
];

/// Substructure-screening fingerprint built from generic SMARTS queries.
pub fn pattern_fingerprint(mol: &Molecule, nbits: usize) -> Fingerprint {
    let mut fp = Fingerprint::new(nbits);
    let target = SmartsTarget::new(mol);
    for (qi, smarts) in PATTERN_QUERIES.iter().enumerate() {
        let Ok(query) = parse_smarts(smarts) else {
            continue;
        };
        for m in target.find_all(&query) {
            let mut values = vec![qi as u64];
            values.extend(m.atom_mapping.iter().map(|&(_, t)| mol.atoms[t].atomic_number as u64));
            for bond in &query.bonds {
                let (a, b) = (m.atom_mapping[bond.atom1].1, m.atom_mapping[bond.atom2].1);
                values.push(mol.get_bond(a, b).map_or(0, |b| b.order as u64 + 1));
            }
            fp.set_hash(hash_values(&values));
        }
    }
    fp
}

// ---------------------------------------------------------------------------
// FNV-1a hashing
// ---------------------------------------------------------------------------

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a_update(hash: u64, value: u64) -> u64 {
    let mut h = hash;
    for b in value.to_le_bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

fn hash_values(values: &[u64]) -> u64 {
    values.iter().fold(FNV_OFFSET, |h, &v| fnv1a_update(h, v))
}

fn fold_hash(hash: u64, nbits: usize) -> usize {
    (hash % nbits as u64) as usize
}
