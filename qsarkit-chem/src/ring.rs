//! Ring perception: smallest set of smallest rings (SSSR) and ring membership.

use std::collections::VecDeque;

use crate::molecule::Molecule;

/// Find the smallest set of smallest rings (SSSR) in a molecule.
///
/// Candidate cycles are the shortest cycle through each ring bond; they are
/// accepted smallest-first while they stay linearly independent (over GF(2)
/// on bond sets) until the cyclomatic number is reached.
pub fn find_sssr(mol: &Molecule) -> Vec<Vec<usize>> {
    let n = mol.atom_count();
    if n == 0 || mol.bond_count() == 0 {
        return Vec::new();
    }

    let expected = mol.bond_count() as isize - n as isize + count_components(mol) as isize;
    if expected <= 0 {
        return Vec::new();
    }

    let ring_atoms = find_ring_atoms(mol);
    let mut candidates: Vec<Vec<usize>> = Vec::new();
    for (bond_idx, bond) in mol.bonds.iter().enumerate() {
        if !ring_atoms[bond.atom1] || !ring_atoms[bond.atom2] {
            continue;
        }
        if let Some(mut ring) = bfs_shortest_path(mol, bond.atom1, bond.atom2, bond_idx, &ring_atoms) {
            normalize_ring(&mut ring);
            if !candidates.contains(&ring) {
                candidates.push(ring);
            }
        }
    }
    candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    let words = mol.bond_count().div_ceil(64);
    let mut basis: Vec<Vec<u64>> = Vec::new();
    let mut rings = Vec::new();
    for ring in candidates {
        if rings.len() as isize >= expected {
            break;
        }
        let mut vector = vec![0u64; words];
        for bi in ring_bond_indices(mol, &ring) {
            vector[bi / 64] |= 1 << (bi % 64);
        }
        if reduce_against(&mut vector, &basis) {
            basis.push(vector);
            rings.push(ring);
        }
    }
    rings
}

/// Gaussian elimination step: reduces `v` by the basis (kept in echelon form
/// by leading bit) and returns whether anything independent remains.
fn reduce_against(v: &mut [u64], basis: &[Vec<u64>]) -> bool {
    for row in basis {
        if let Some(lead) = leading_bit(row) {
            if v[lead / 64] & (1 << (lead % 64)) != 0 {
                for (a, b) in v.iter_mut().zip(row) {
                    *a ^= *b;
                }
            }
        }
    }
    v.iter().any(|&w| w != 0)
}

fn leading_bit(v: &[u64]) -> Option<usize> {
    v.iter()
        .enumerate()
        .find(|(_, &w)| w != 0)
        .map(|(i, &w)| i * 64 + w.trailing_zeros() as usize)
}

/// Bond indices along a ring given as an ordered atom cycle.
pub fn ring_bond_indices(mol: &Molecule, ring: &[usize]) -> Vec<usize> {
    (0..ring.len())
        .filter_map(|i| mol.bond_index(ring[i], ring[(i + 1) % ring.len()]))
        .collect()
}

/// Ring membership lookups shared by descriptor and pattern code.
#[derive(Debug, Clone)]
pub struct RingInfo {
    pub rings: Vec<Vec<usize>>,
    /// Bond indices of each ring, parallel to `rings`.
    pub ring_bonds: Vec<Vec<usize>>,
    atom_rings: Vec<Vec<usize>>,
    cyclic_bond: Vec<bool>,
}

impl RingInfo {
    pub fn new(mol: &Molecule) -> Self {
        let rings = find_sssr(mol);
        let ring_bonds: Vec<Vec<usize>> = rings.iter().map(|r| ring_bond_indices(mol, r)).collect();
        let mut atom_rings = vec![Vec::new(); mol.atom_count()];
        let mut bond_rings = vec![Vec::new(); mol.bond_count()];
        for (ri, ring) in rings.iter().enumerate() {
            for &a in ring {
                atom_rings[a].push(ri);
            }
            for &b in &ring_bonds[ri] {
                bond_rings[b].push(ri);
            }
        }
        // A bond is cyclic when its endpoints stay connected without it; this
        // also catches bonds of envelope rings not in the SSSR.
        let ring_atoms = find_ring_atoms(mol);
        let cyclic_bond = mol
            .bonds
            .iter()
            .enumerate()
            .map(|(bi, b)| {
                !bond_rings[bi].is_empty()
                    || (ring_atoms[b.atom1]
                        && ring_atoms[b.atom2]
                        && bfs_shortest_path(mol, b.atom1, b.atom2, bi, &ring_atoms).is_some())
            })
            .collect();
        RingInfo { rings, ring_bonds, atom_rings, cyclic_bond }
    }

    pub fn num_rings(&self) -> usize {
        self.rings.len()
    }

    /// Number of SSSR rings containing the atom.
    pub fn atom_ring_count(&self, atom: usize) -> usize {
        self.atom_rings[atom].len()
    }

    pub fn is_ring_atom(&self, atom: usize) -> bool {
        !self.atom_rings[atom].is_empty()
    }

    pub fn is_ring_bond(&self, bond: usize) -> bool {
        self.cyclic_bond[bond]
    }

    /// Sizes of the SSSR rings containing the atom.
    pub fn atom_ring_sizes(&self, atom: usize) -> impl Iterator<Item = usize> + '_ {
        self.atom_rings[atom].iter().map(|&ri| self.rings[ri].len())
    }

    /// Whether the atom is in an SSSR ring of exactly `size` atoms.
    pub fn atom_in_ring_of_size(&self, atom: usize, size: usize) -> bool {
        self.atom_ring_sizes(atom).any(|s| s == size)
    }

    /// Smallest SSSR ring containing the atom.
    pub fn smallest_ring_size(&self, atom: usize) -> Option<usize> {
        self.atom_ring_sizes(atom).min()
    }
}

/// Count connected components.
pub(crate) fn count_components(mol: &Molecule) -> usize {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut components = 0;

    for start in 0..n {
        if visited[start] {
            continue;
        }
        components += 1;
        let mut queue = VecDeque::from([start]);
        visited[start] = true;
        while let Some(curr) = queue.pop_front() {
            for &(neighbor, _) in &mol.adjacency[curr] {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
    }

    components
}

/// Identify ring atoms by iteratively removing terminal (degree ≤ 1) atoms.
fn find_ring_atoms(mol: &Molecule) -> Vec<bool> {
    let n = mol.atom_count();
    let mut degree: Vec<usize> = mol.adjacency.iter().map(Vec::len).collect();
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| degree[i] <= 1).collect();

    let mut removed = vec![false; n];
    while let Some(atom) = queue.pop_front() {
        if removed[atom] {
            continue;
        }
        removed[atom] = true;
        for &(neighbor, _) in &mol.adjacency[atom] {
            if !removed[neighbor] {
                degree[neighbor] -= 1;
                if degree[neighbor] <= 1 {
                    queue.push_back(neighbor);
                }
            }
        }
    }

    removed.iter().map(|&r| !r).collect()
}

/// BFS from `start` to `end` avoiding a specific bond, restricted to ring atoms.
fn bfs_shortest_path(
    mol: &Molecule,
    start: usize,
    end: usize,
    excluded_bond: usize,
    ring_atoms: &[bool],
) -> Option<Vec<usize>> {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut parent = vec![usize::MAX; n];
    let mut queue = VecDeque::from([start]);
    visited[start] = true;

    while let Some(curr) = queue.pop_front() {
        if curr == end {
            let mut path = vec![end];
            let mut node = end;
            while node != start {
                node = parent[node];
                path.push(node);
            }
            path.reverse();
            return Some(path);
        }

        for &(neighbor, bond_idx) in &mol.adjacency[curr] {
            if bond_idx != excluded_bond && !visited[neighbor] && ring_atoms[neighbor] {
                visited[neighbor] = true;
                parent[neighbor] = curr;
                queue.push_back(neighbor);
            }
        }
    }

    None
}

/// Rotate a ring to start at its smallest index and walk toward the smaller
/// neighbor, so equal cycles compare equal.
fn normalize_ring(ring: &mut [usize]) {
    let Some(min_pos) = ring.iter().enumerate().min_by_key(|&(_, &v)| v).map(|(i, _)| i) else {
        return;
    };
    ring.rotate_left(min_pos);
    let n = ring.len();
    if n > 2 && ring[n - 1] < ring[1] {
        ring[1..].reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    #[test]
    fn benzene_one_ring() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        let rings = find_sssr(&mol);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 6);
    }

    #[test]
    fn naphthalene_two_rings() {
        let mol = parse_smiles("c1ccc2ccccc2c1").unwrap();
        let info = RingInfo::new(&mol);
        assert_eq!(info.num_rings(), 2);
        assert!(info.rings.iter().all(|r| r.len() == 6));
        // Fusion atoms sit in both rings.
        assert_eq!((0..mol.atom_count()).filter(|&a| info.atom_ring_count(a) == 2).count(), 2);
    }

    #[test]
    fn spiro_and_bicyclic() {
        let spiro = parse_smiles("C1CCC2(CC1)CCC2").unwrap();
        let info = RingInfo::new(&spiro);
        assert_eq!(info.num_rings(), 2);
        assert!(info.atom_in_ring_of_size(3, 4));
        assert!(info.atom_in_ring_of_size(3, 6));

        let norbornane = parse_smiles("C1CC2CCC1C2").unwrap();
        let rings = find_sssr(&norbornane);
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|r| r.len() == 5));
    }

    #[test]
    fn ring_bonds_and_chains() {
        let mol = parse_smiles("CCc1ccccc1").unwrap();
        let info = RingInfo::new(&mol);
        assert!(!info.is_ring_bond(0));
        assert!(!info.is_ring_bond(1));
        assert!(info.is_ring_bond(2));
        assert!(!info.is_ring_atom(0));
        assert_eq!(info.smallest_ring_size(2), Some(6));
        assert_eq!(info.ring_bonds[0].len(), 6);
    }

    #[test]
    fn acyclic_no_rings() {
        let mol = parse_smiles("CCCC").unwrap();
        assert!(find_sssr(&mol).is_empty());
        assert_eq!(count_components(&mol), 1);
    }
}
