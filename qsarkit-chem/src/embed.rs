//! 3D coordinate embedding via distance geometry.
//!
//! 1. Bounds matrix from covalent radii, hybridization angles and vdW radii
//! 2. Triangle-inequality smoothing (Floyd-Warshall)
//! 3. Random distances within bounds → centroid metric matrix → top-3 eigenvectors
//! 4. Refinement against the bound violations
//! 5. Optional force-field clean-up: MMFF94, then UFF, then none

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conformer::Conformer;
use crate::forcefield::{ForceField, MinimizeConfig};
use crate::linalg::symmetric_eigen;
use crate::molecule::{BondOrder, Hybridization, Molecule};
use crate::ring::RingInfo;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for 3D embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    /// Random seed for reproducibility.
    pub random_seed: u64,
    /// Embedding attempts before giving up.
    pub max_attempts: usize,
    /// Largest molecule that will be embedded, counted after explicit
    /// hydrogens are added. The default of 400 admits roughly 180 heavy
    /// atoms of drug-like composition; larger input fails to embed.
    pub max_atoms: usize,
    /// Iterations of bound-violation refinement.
    pub refine_steps: usize,
    /// Run the force-field clean-up after embedding.
    pub optimize: bool,
    pub minimize: MinimizeConfig,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        EmbedConfig {
            random_seed: 42,
            max_attempts: 10,
            max_atoms: 400,
            refine_steps: 400,
            optimize: true,
            minimize: MinimizeConfig::default(),
        }
    }
}

/// Which force field produced the final coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceFieldUsed {
    Mmff94,
    Uff,
    /// Both force fields failed (or optimisation was off).
    None,
}

/// An embedded conformer with the force field that optimised it.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub conformer: Conformer,
    pub force_field: ForceFieldUsed,
}

// ---------------------------------------------------------------------------
// Radii (Å)
// ---------------------------------------------------------------------------

fn covalent_radius(atomic_number: u8) -> f64 {
    match atomic_number {
        1 => 0.31,
        3 => 1.28,
        5 => 0.84,
        6 => 0.76,
        7 => 0.71,
        8 => 0.66,
        9 => 0.57,
        11 => 1.66,
        12 => 1.41,
        13 => 1.21,
        14 => 1.11,
        15 => 1.07,
        16 => 1.05,
        17 => 1.02,
        19 => 2.03,
        20 => 1.76,
        30 => 1.22,
        32 => 1.20,
        33 => 1.19,
        34 => 1.20,
        35 => 1.20,
        50 => 1.39,
        53 => 1.39,
        _ => 1.50,
    }
}

fn vdw_radius(atomic_number: u8) -> f64 {
    match atomic_number {
        1 => 1.20,
        6 => 1.70,
        7 => 1.55,
        8 => 1.52,
        9 => 1.47,
        15 => 1.80,
        16 => 1.80,
        17 => 1.75,
        35 => 1.85,
        53 => 1.98,
        _ => 2.00,
    }
}

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

const UNBOUNDED: f64 = 1000.0;
const BOND_TOLERANCE: f64 = 0.5;

/// Embed, then optimise with MMFF94, falling back to UFF, falling back to
/// the unoptimised coordinates.
pub fn generate_conformer(mol: &Molecule, config: &EmbedConfig) -> Result<Embedding> {
    let conformer = embed_molecule(mol, config)?;
    if !config.optimize {
        return Ok(Embedding { conformer, force_field: ForceFieldUsed::None });
    }

    match ForceField::mmff94(mol).and_then(|ff| ff.minimize(&conformer, &config.minimize)) {
        Ok(result) => {
            return Ok(Embedding { conformer: result.conformer, force_field: ForceFieldUsed::Mmff94 });
        }
        Err(e) => warn!(molecule = %mol.name, error = %e, "MMFF94 optimisation failed, trying UFF"),
    }
    match ForceField::uff(mol).and_then(|ff| ff.minimize(&conformer, &config.minimize)) {
        Ok(result) => Ok(Embedding { conformer: result.conformer, force_field: ForceFieldUsed::Uff }),
        Err(e) => {
            warn!(molecule = %mol.name, error = %e, "UFF optimisation failed, keeping unoptimised coordinates");
            Ok(Embedding { conformer, force_field: ForceFieldUsed::None })
        }
    }
}

/// Embed a single 3D conformer using distance geometry.
///
/// Fails when the molecule is empty, larger than `max_atoms`, or no attempt
/// produces coordinates that respect the bond-length bounds.
pub fn embed_molecule(mol: &Molecule, config: &EmbedConfig) -> Result<Conformer> {
    let n = mol.atom_count();
    if n == 0 {
        return Err(QsarError::InvalidInput("cannot embed an empty molecule".into()));
    }
    if n > config.max_atoms {
        return Err(QsarError::Unsupported(format!(
            "{n} atoms exceeds the embedding limit of {}",
            config.max_atoms
        )));
    }
    if n == 1 {
        return Ok(Conformer::new(vec![[0.0, 0.0, 0.0]]));
    }

    let (lower, upper) = build_bounds_matrix(mol);
    let (lower, upper) = smooth_bounds(lower, upper, n);

    let mut rng = SimpleRng::new(config.random_seed);
    for attempt in 0..config.max_attempts.max(1) {
        let Some(mut coords) = embed_from_bounds(&lower, &upper, n, &mut rng) else {
            debug!(attempt, "metric matrix had no positive eigenvalues");
            continue;
        };
        refine(&mut coords, &lower, &upper, config.refine_steps);
        let conf = Conformer::new(coords);
        if conf.is_finite() && bonds_within_tolerance(mol, &conf, &lower, &upper) {
            return Ok(conf);
        }
        debug!(attempt, "embedding attempt rejected");
    }
    Err(QsarError::Other(format!(
        "distance-geometry embedding failed after {} attempts",
        config.max_attempts.max(1)
    )))
}

fn bonds_within_tolerance(mol: &Molecule, conf: &Conformer, lower: &[Vec<f64>], upper: &[Vec<f64>]) -> bool {
    mol.bonds.iter().all(|b| {
        let d = conf.distance(b.atom1, b.atom2);
        d >= lower[b.atom1][b.atom2] - BOND_TOLERANCE && d <= upper[b.atom1][b.atom2] + BOND_TOLERANCE
    })
}

// ---------------------------------------------------------------------------
// Bounds matrix construction
// ---------------------------------------------------------------------------

fn ideal_angle(mol: &Molecule, rings: &RingInfo, i: usize, center: usize, k: usize) -> f64 {
    // Three- to five-membered rings force their interior angle.
    let small_ring = rings
        .rings
        .iter()
        .filter(|r| r.len() < 6 && r.contains(&i) && r.contains(&center) && r.contains(&k))
        .map(Vec::len)
        .min();
    if let Some(size) = small_ring {
        return std::f64::consts::PI * (size as f64 - 2.0) / size as f64;
    }
    match mol.hybridization(center) {
        Hybridization::SP => 180.0_f64.to_radians(),
        Hybridization::SP2 => 120.0_f64.to_radians(),
        _ => 109.5_f64.to_radians(),
    }
}

fn build_bounds_matrix(mol: &Molecule) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let n = mol.atom_count();
    let rings = RingInfo::new(mol);
    let mut lower = vec![vec![0.0_f64; n]; n];
    let mut upper = vec![vec![UNBOUNDED; n]; n];
    for i in 0..n {
        upper[i][i] = 0.0;
    }

    // 1-2
    for bond in &mol.bonds {
        let (a1, a2) = (bond.atom1, bond.atom2);
        let bo_adj = match bond.order {
            BondOrder::Single => 0.0,
            BondOrder::Aromatic => -0.10,
            BondOrder::Double => -0.20,
            BondOrder::Triple => -0.34,
        };
        let d = covalent_radius(mol.atoms[a1].atomic_number) + covalent_radius(mol.atoms[a2].atomic_number) + bo_adj;
        set_bounds(&mut lower, &mut upper, a1, a2, d - 0.03, d + 0.03);
    }

    // 1-3 via the law of cosines at the shared atom
    for j in 0..n {
        let neighbors = &mol.adjacency[j];
        if neighbors.len() < 2 {
            continue;
        }
        for a in 0..neighbors.len() {
            for b in (a + 1)..neighbors.len() {
                let (i, k) = (neighbors[a].0, neighbors[b].0);
                let angle = ideal_angle(mol, &rings, i, j, k);
                let d_ij = (lower[i][j] + upper[i][j]) / 2.0;
                let d_jk = (lower[j][k] + upper[j][k]) / 2.0;
                let d13 = (d_ij * d_ij + d_jk * d_jk - 2.0 * d_ij * d_jk * angle.cos()).max(0.0).sqrt();
                if mol.get_bond(i, k).is_some() {
                    continue;
                }
                set_bounds(&mut lower, &mut upper, i, k, d13 - 0.08, d13 + 0.08);
            }
        }
    }

    // Non-bonded repulsion
    for i in 0..n {
        for j in (i + 1)..n {
            if upper[i][j] >= UNBOUNDED {
                let vdw = vdw_radius(mol.atoms[i].atomic_number) + vdw_radius(mol.atoms[j].atomic_number);
                lower[i][j] = vdw * 0.6;
                lower[j][i] = lower[i][j];
            }
        }
    }

    (lower, upper)
}

fn set_bounds(lower: &mut [Vec<f64>], upper: &mut [Vec<f64>], i: usize, j: usize, lo: f64, hi: f64) {
    lower[i][j] = lo;
    lower[j][i] = lo;
    upper[i][j] = hi;
    upper[j][i] = hi;
}

/// Floyd-Warshall triangle inequality smoothing.
fn smooth_bounds(mut lower: Vec<Vec<f64>>, mut upper: Vec<Vec<f64>>, n: usize) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    for k in 0..n {
        for i in 0..n {
            for j in (i + 1)..n {
                if i == k || j == k {
                    continue;
                }
                let u = upper[i][k] + upper[k][j];
                if u < upper[i][j] {
                    upper[i][j] = u;
                    upper[j][i] = u;
                }
                let l = (lower[i][k] - upper[k][j]).max(lower[j][k] - upper[k][i]);
                if l > lower[i][j] {
                    lower[i][j] = l;
                    lower[j][i] = l;
                }
            }
        }
    }

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            // Pairs in different fragments stay unbounded; keep them near contact.
            if upper[i][j] >= UNBOUNDED / 2.0 {
                upper[i][j] = lower[i][j] + 3.0;
            }
            if lower[i][j] > upper[i][j] {
                let avg = (lower[i][j] + upper[i][j]) / 2.0;
                lower[i][j] = avg;
                upper[i][j] = avg;
            }
            lower[i][j] = lower[i][j].max(0.0);
        }
    }
    (lower, upper)
}

/// Sample distances within bounds and recover coordinates from the
/// centroid-referenced metric matrix.
fn embed_from_bounds(lower: &[Vec<f64>], upper: &[Vec<f64>], n: usize, rng: &mut SimpleRng) -> Option<Vec<[f64; 3]>> {
    let mut d2 = vec![0.0_f64; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let lo = lower[i][j];
            let hi = upper[i][j].max(lo);
            let d = lo + rng.next_f64() * (hi - lo);
            d2[i * n + j] = d * d;
            d2[j * n + i] = d * d;
        }
    }

    let nf = n as f64;
    let total: f64 = (0..n).flat_map(|i| ((i + 1)..n).map(move |j| (i, j))).map(|(i, j)| d2[i * n + j]).sum();
    let d0: Vec<f64> = (0..n)
        .map(|i| (0..n).map(|j| d2[i * n + j]).sum::<f64>() / nf - total / (nf * nf))
        .collect();

    let mut metric = vec![0.0_f64; n * n];
    for i in 0..n {
        for j in 0..n {
            metric[i * n + j] = 0.5 * (d0[i] + d0[j] - d2[i * n + j]);
        }
    }

    let eig = symmetric_eigen(&metric, n);
    if eig.values.first().map_or(true, |&v| v <= 0.0) {
        return None;
    }
    let mut coords = vec![[0.0_f64; 3]; n];
    for dim in 0..n.min(3) {
        let scale = eig.values[dim].max(0.0).sqrt();
        for (i, c) in coords.iter_mut().enumerate() {
            // A little noise keeps degenerate axes from collapsing.
            c[dim] = eig.vectors[dim][i] * scale + (rng.next_f64() - 0.5) * 0.1;
        }
    }
    Some(coords)
}

// ---------------------------------------------------------------------------
// Refinement against the bounds
// ---------------------------------------------------------------------------

fn bound_error(coords: &[[f64; 3]], lower: &[Vec<f64>], upper: &[Vec<f64>], mut grad: Option<&mut [[f64; 3]]>) -> f64 {
    let n = coords.len();
    let mut energy = 0.0;
    if let Some(g) = grad.as_deref_mut() {
        g.iter_mut().for_each(|v| *v = [0.0; 3]);
    }
    for i in 0..n {
        for j in (i + 1)..n {
            let diff = [
                coords[i][0] - coords[j][0],
                coords[i][1] - coords[j][1],
                coords[i][2] - coords[j][2],
            ];
            let d2 = diff[0] * diff[0] + diff[1] * diff[1] + diff[2] * diff[2];
            let (u2, l2) = (upper[i][j] * upper[i][j], lower[i][j] * lower[i][j]);
            // dE/d(d²)
            let de = if d2 > u2 && u2 > 0.0 {
                let t = d2 / u2 - 1.0;
                energy += t * t;
                2.0 * t / u2
            } else if d2 < l2 {
                let t = 2.0 * l2 / (l2 + d2) - 1.0;
                energy += t * t;
                -4.0 * t * l2 / ((l2 + d2) * (l2 + d2))
            } else {
                continue;
            };
            if let Some(g) = grad.as_deref_mut() {
                for d in 0..3 {
                    g[i][d] += 2.0 * de * diff[d];
                    g[j][d] -= 2.0 * de * diff[d];
                }
            }
        }
    }
    energy
}

fn refine(coords: &mut [[f64; 3]], lower: &[Vec<f64>], upper: &[Vec<f64>], steps: usize) {
    let n = coords.len();
    let mut grad = vec![[0.0_f64; 3]; n];
    let mut energy = bound_error(coords, lower, upper, Some(&mut grad));
    let mut step = 0.1;
    let mut trial = coords.to_vec();

    for _ in 0..steps {
        if energy < 1e-8 {
            break;
        }
        let gnorm = grad.iter().flatten().map(|g| g * g).sum::<f64>().sqrt();
        if gnorm < 1e-10 {
            break;
        }
        for (t, (c, g)) in trial.iter_mut().zip(coords.iter().zip(&grad)) {
            for d in 0..3 {
                t[d] = c[d] - step * g[d] / gnorm;
            }
        }
        let e = bound_error(&trial, lower, upper, None);
        if e < energy {
            coords.copy_from_slice(&trial);
            energy = bound_error(coords, lower, upper, Some(&mut grad));
            step = (step * 1.2).min(1.0);
        } else {
            step *= 0.5;
            if step < 1e-6 {
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Simple RNG (xorshift64)
// ---------------------------------------------------------------------------

struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        SimpleRng { state: if seed == 0 { 1 } else { seed } }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrogens::add_hydrogens;
    use crate::smiles::parse_smiles;

    fn no_opt() -> EmbedConfig {
        EmbedConfig { optimize: false, ..EmbedConfig::default() }
    }

    #[test]
    fn ethane_bond_length() {
        let mol = parse_smiles("CC").unwrap();
        let conf = embed_molecule(&mol, &no_opt()).unwrap();
        assert_eq!(conf.len(), 2);
        let d = conf.distance(0, 1);
        assert!((d - 1.52).abs() < 0.2, "C-C distance = {d}");
    }

    #[test]
    fn single_atom_and_empty() {
        let mol = parse_smiles("C").unwrap();
        assert_eq!(embed_molecule(&mol, &no_opt()).unwrap().len(), 1);
        let empty = Molecule::new(String::new(), vec![], vec![]);
        assert!(embed_molecule(&empty, &no_opt()).is_err());
    }

    #[test]
    fn too_large_is_rejected() {
        let mol = add_hydrogens(&parse_smiles("CCCCCC").unwrap());
        let config = EmbedConfig { max_atoms: 5, ..no_opt() };
        assert!(matches!(embed_molecule(&mol, &config), Err(QsarError::Unsupported(_))));
    }

    #[test]
    fn hydrogenated_ethanol_is_sane() {
        let mol = add_hydrogens(&parse_smiles("CCO").unwrap());
        let conf = embed_molecule(&mol, &no_opt()).unwrap();
        assert_eq!(conf.len(), mol.atom_count());
        for bond in &mol.bonds {
            let d = conf.distance(bond.atom1, bond.atom2);
            assert!(d > 0.7 && d < 2.0, "bond {}-{} = {d}", bond.atom1, bond.atom2);
        }
    }

    #[test]
    fn benzene_is_roughly_flat() {
        let mol = add_hydrogens(&parse_smiles("c1ccccc1").unwrap());
        let conf = generate_conformer(&mol, &EmbedConfig::default()).unwrap().conformer;
        let centered = conf.centered();
        let svd = crate::linalg::svd_n3(&centered);
        assert!(svd.singular_values[2] < 0.6 * svd.singular_values[1], "{:?}", svd.singular_values);
    }

    #[test]
    fn deterministic_for_seed() {
        let mol = add_hydrogens(&parse_smiles("CC(=O)O").unwrap());
        let c1 = embed_molecule(&mol, &no_opt()).unwrap();
        let c2 = embed_molecule(&mol, &no_opt()).unwrap();
        assert!(c1.rmsd(&c2).unwrap() < 1e-12);
    }

    #[test]
    fn optimisation_chain_reports_force_field() {
        let mol = add_hydrogens(&parse_smiles("CCO").unwrap());
        let emb = generate_conformer(&mol, &EmbedConfig::default()).unwrap();
        assert_eq!(emb.force_field, ForceFieldUsed::Mmff94);

        // Selenium has no MMFF94 parameters here.
        let mol = add_hydrogens(&parse_smiles("C[Se]C").unwrap());
        let emb = generate_conformer(&mol, &EmbedConfig::default()).unwrap();
        assert_eq!(emb.force_field, ForceFieldUsed::Uff);

        // Neither table covers tellurium.
        let mol = add_hydrogens(&parse_smiles("C[Te]C").unwrap());
        let emb = generate_conformer(&mol, &EmbedConfig::default()).unwrap();
        assert_eq!(emb.force_field, ForceFieldUsed::None);
        assert!(emb.conformer.is_finite());
    }

    #[test]
    fn salts_embed() {
        let mol = parse_smiles("[Na+].[Cl-]").unwrap();
        let conf = embed_molecule(&mol, &no_opt()).unwrap();
        assert!(conf.distance(0, 1) > 1.0);
    }

    #[test]
    fn bounds_are_consistent() {
        let mol = parse_smiles("CCC").unwrap();
        let (lower, upper) = build_bounds_matrix(&mol);
        let (lower, upper) = smooth_bounds(lower, upper, 3);
        for i in 0..3 {
            for j in 0..3 {
                assert!(lower[i][j] <= upper[i][j] + 1e-12);
            }
        }
        assert!(upper[0][2] < 2.7 && lower[0][2] > 2.3);
    }

    #[test]
    fn rng_range() {
        let mut rng = SimpleRng::new(12345);
        for _ in 0..100 {
            let f = rng.next_f64();
            assert!((0.0..1.0).contains(&f));
        }
    }
}
