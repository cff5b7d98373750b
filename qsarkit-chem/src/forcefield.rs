//! Force field energy and minimisation for conformer clean-up.
//!
//! Two parameterisations share one term representation:
//! - **MMFF94-style**: cubic/quartic bond stretch, cubic angle bend, three-fold
//!   Fourier torsions, out-of-plane bending, buffered 14-7 van der Waals with
//!   MMFF combination rules, and Gasteiger-charge electrostatics.
//! - **UFF**: harmonic stretch with Rappé natural bond lengths, Fourier angle
//!   bend, UFF torsions and inversions, Lennard-Jones 12-6 van der Waals.
//!
//! Building a [`ForceField`] fails with `QsarError::Unsupported` when an atom
//! has no parameters, which is what drives the MMFF94 → UFF fallback.

use std::collections::HashSet;

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};

use crate::conformer::Conformer;
use crate::gasteiger::gasteiger_charges;
use crate::linalg::{cross3, dot3, norm3, sub3};
use crate::molecule::{BondOrder, Hybridization, Molecule};
use crate::ring::RingInfo;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Energy contributions from each force field term (kcal/mol).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyComponents {
    pub bond_stretch: f64,
    pub angle_bend: f64,
    pub torsion: f64,
    pub van_der_waals: f64,
    pub electrostatic: f64,
    pub out_of_plane: f64,
    pub total: f64,
}

/// Result of energy minimisation.
#[derive(Debug, Clone)]
pub struct MinimizeResult {
    pub conformer: Conformer,
    pub initial_energy: f64,
    pub final_energy: f64,
    pub n_steps: usize,
    pub converged: bool,
}

/// Minimisation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinimizeMethod {
    SteepestDescent,
    ConjugateGradient,
}

/// Minimisation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinimizeConfig {
    pub max_steps: usize,
    /// Convergence threshold on the RMS gradient (kcal/mol/Å).
    pub gradient_threshold: f64,
    pub method: MinimizeMethod,
}

impl Default for MinimizeConfig {
    fn default() -> Self {
        MinimizeConfig {
            max_steps: 200,
            gradient_threshold: 0.05,
            method: MinimizeMethod::ConjugateGradient,
        }
    }
}

/// Which parameterisation a force field was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceFieldKind {
    Mmff94,
    Uff,
}

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

/// E = k·dr²·(1 + cs·dr + 7/12·cs²·dr²)
#[derive(Debug, Clone)]
struct BondTerm {
    i: usize,
    j: usize,
    r0: f64,
    k: f64,
    cs: f64,
}

#[derive(Debug, Clone)]
enum AngleForm {
    /// MMFF: k·dθ²·(1 + cb·dθ), dθ in degrees.
    Cubic { k: f64, cb: f64 },
    /// UFF: k·(c0 + c1·cosθ + c2·cos2θ).
    Fourier { k: f64, c0: f64, c1: f64, c2: f64 },
    /// UFF linear: k·(1 + cosθ).
    Linear { k: f64 },
}

#[derive(Debug, Clone)]
struct AngleTerm {
    i: usize,
    j: usize,
    k: usize,
    theta0: f64,
    form: AngleForm,
}

/// E = ½·[V1(1+cosφ) + V2(1−cos2φ) + V3(1+cos3φ)] + ½·V6(1−cos6φ)
#[derive(Debug, Clone)]
struct TorsionTerm {
    atoms: [usize; 4],
    v: [f64; 4],
}

/// Wilson-angle term for atom `l` out of the plane of `i`-`center`-`k`.
#[derive(Debug, Clone)]
struct OopTerm {
    center: usize,
    i: usize,
    k: usize,
    l: usize,
    k_oop: f64,
    /// UFF uses k·(1 − cosχ); MMFF uses k·χ² in degrees.
    cosine: bool,
}

#[derive(Debug, Clone)]
struct PairTerm {
    i: usize,
    j: usize,
    r_star: f64,
    eps: f64,
    /// Pre-multiplied Coulomb factor (kcal·Å/mol), zero for UFF.
    qq: f64,
}

/// A force field with every term precomputed for one molecule.
#[derive(Debug, Clone)]
pub struct ForceField {
    kind: ForceFieldKind,
    n_atoms: usize,
    bonds: Vec<BondTerm>,
    angles: Vec<AngleTerm>,
    torsions: Vec<TorsionTerm>,
    oop: Vec<OopTerm>,
    pairs: Vec<PairTerm>,
}

const COULOMB: f64 = 332.0716;
const MDYNE_TO_KCAL: f64 = 143.9325;
const DEG: f64 = 180.0 / std::f64::consts::PI;

// ---------------------------------------------------------------------------
// MMFF94 typing and parameters
// ---------------------------------------------------------------------------

/// MMFF94 symbolic atom types covered by this parameterisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mmff94AtomType {
    CR,
    CEqC,
    CEqO,
    CSP,
    CB,
    HC,
    HOR,
    HNR,
    HS,
    OR,
    OEqC,
    OFUR,
    NR,
    NEqC,
    NSP,
    NPYD,
    NPYL,
    F,
    Cl,
    Br,
    I,
    S,
    SEqC,
    STHI,
    P,
    Si,
}

/// (alpha, N, A, G, donor/acceptor) from the MMFF vdW table.
struct MmffVdw {
    alpha: f64,
    n_eff: f64,
    a: f64,
    g: f64,
    donor: bool,
    acceptor: bool,
}

const fn vdw(alpha: f64, n_eff: f64, a: f64, g: f64, donor: bool, acceptor: bool) -> MmffVdw {
    MmffVdw { alpha, n_eff, a, g, donor, acceptor }
}

impl Mmff94AtomType {
    fn vdw(self) -> MmffVdw {
        use Mmff94AtomType::*;
        match self {
            CR => vdw(1.050, 2.490, 3.890, 1.282, false, false),
            CEqC | CB => vdw(1.350, 2.490, 3.890, 1.282, false, false),
            CEqO => vdw(1.100, 2.490, 3.890, 1.282, false, false),
            CSP => vdw(1.300, 2.490, 3.890, 1.282, false, false),
            HC | HS => vdw(0.250, 0.800, 4.200, 1.209, false, false),
            HOR | HNR => vdw(0.150, 0.800, 4.200, 1.209, true, false),
            OR => vdw(0.700, 3.150, 3.890, 1.282, false, true),
            OEqC => vdw(0.650, 3.150, 3.890, 1.282, false, true),
            OFUR => vdw(0.650, 3.150, 3.890, 1.282, false, false),
            NR => vdw(1.150, 2.820, 3.890, 1.282, false, true),
            NEqC => vdw(0.900, 2.820, 3.890, 1.282, false, true),
            NSP => vdw(1.000, 2.820, 3.890, 1.282, false, true),
            NPYD => vdw(0.850, 2.820, 3.890, 1.282, false, true),
            NPYL => vdw(1.100, 2.820, 3.890, 1.282, false, false),
            F => vdw(0.350, 3.480, 3.890, 1.282, false, true),
            Cl => vdw(2.300, 5.100, 3.320, 1.345, false, true),
            Br => vdw(3.400, 6.000, 3.190, 1.359, false, true),
            I => vdw(5.500, 6.950, 3.080, 1.404, false, true),
            S | SEqC | STHI => vdw(3.000, 4.800, 3.320, 1.345, false, false),
            P => vdw(1.600, 4.500, 3.320, 1.345, false, false),
            Si => vdw(4.500, 4.200, 3.320, 1.345, false, false),
        }
    }

    /// Covalent radius (Å) for reference bond lengths.
    fn radius(self) -> f64 {
        use Mmff94AtomType::*;
        match self {
            HC | HOR | HNR | HS => 0.33,
            CR => 0.77,
            CEqC | CEqO | CB => 0.74,
            CSP => 0.70,
            OR | OFUR => 0.66,
            OEqC => 0.62,
            NR | NPYL => 0.70,
            NEqC | NPYD => 0.66,
            NSP => 0.62,
            F => 0.64,
            Cl => 0.99,
            Br => 1.14,
            I => 1.33,
            S | STHI => 1.04,
            SEqC => 0.98,
            P => 1.10,
            Si => 1.17,
        }
    }

    /// Reference angle (degrees) at an atom of this type.
    fn theta0(self) -> f64 {
        use Mmff94AtomType::*;
        match self {
            CR | Si => 109.47,
            CEqC | CEqO | CB => 120.0,
            CSP | NSP => 180.0,
            OR => 106.5,
            OFUR => 106.0,
            NR => 107.5,
            NEqC | NPYD => 117.0,
            NPYL => 126.0,
            S | STHI => 96.0,
            SEqC => 120.0,
            P => 100.0,
            _ => 109.47,
        }
    }

    fn is_hydrogen(self) -> bool {
        matches!(self, Mmff94AtomType::HC | Mmff94AtomType::HOR | Mmff94AtomType::HNR | Mmff94AtomType::HS)
    }
}

fn has_double_to(mol: &Molecule, idx: usize, element: u8) -> bool {
    mol.adjacency[idx]
        .iter()
        .any(|&(nb, bi)| mol.bonds[bi].order == BondOrder::Double && mol.atoms[nb].atomic_number == element)
}

/// Assign MMFF94 symbolic types. Elements outside the table are unsupported.
pub fn assign_mmff94_types(mol: &Molecule) -> Result<Vec<Mmff94AtomType>> {
    use Mmff94AtomType::*;
    (0..mol.atom_count())
        .map(|i| {
            let atom = &mol.atoms[i];
            let hyb = mol.hybridization(i);
            let connections = mol.degree(i) + atom.implicit_hydrogens as usize;
            Ok(match atom.atomic_number {
                1 => match mol.adjacency[i].first().map(|&(nb, _)| mol.atoms[nb].atomic_number) {
                    Some(8) => HOR,
                    Some(7) => HNR,
                    Some(16) => HS,
                    _ => HC,
                },
                6 if atom.is_aromatic => CB,
                6 if hyb == Hybridization::SP => CSP,
                6 if has_double_to(mol, i, 8) || has_double_to(mol, i, 16) => CEqO,
                6 if hyb == Hybridization::SP2 => CEqC,
                6 => CR,
                7 if atom.is_aromatic => {
                    if connections == 3 {
                        NPYL
                    } else {
                        NPYD
                    }
                }
                7 if hyb == Hybridization::SP => NSP,
                7 if hyb == Hybridization::SP2 => NEqC,
                7 => NR,
                8 if atom.is_aromatic => OFUR,
                8 if hyb == Hybridization::SP2 => OEqC,
                8 => OR,
                16 if atom.is_aromatic => STHI,
                16 if mol.degree(i) == 1 && hyb == Hybridization::SP2 => SEqC,
                16 => S,
                9 => F,
                17 => Cl,
                35 => Br,
                53 => I,
                15 => P,
                14 => Si,
                z => {
                    return Err(QsarError::Unsupported(format!(
                        "no MMFF94 parameters for element {z} (atom {i})"
                    )))
                }
            })
        })
        .collect()
}

fn mmff_bond_k(order: BondOrder, t1: Mmff94AtomType, t2: Mmff94AtomType) -> f64 {
    if t1.is_hydrogen() || t2.is_hydrogen() {
        let polar = matches!(t1, Mmff94AtomType::HOR | Mmff94AtomType::HNR)
            || matches!(t2, Mmff94AtomType::HOR | Mmff94AtomType::HNR);
        return if polar { 7.0 } else { 4.7 };
    }
    match order {
        BondOrder::Single => 4.5,
        BondOrder::Aromatic => 6.5,
        BondOrder::Double => 9.5,
        BondOrder::Triple => 15.5,
    }
}

fn mmff_bond_r0(order: BondOrder, t1: Mmff94AtomType, t2: Mmff94AtomType) -> f64 {
    let shortening = match order {
        BondOrder::Single => 0.0,
        BondOrder::Aromatic => 0.08,
        BondOrder::Double => 0.14,
        BondOrder::Triple => 0.24,
    };
    t1.radius() + t2.radius() - shortening + if order == BondOrder::Single { 0.0 } else { 0.1 }
}

/// Mean MMFF torsion constants (V1, V2, V3) for a central bond.
fn mmff_torsion_v(mol: &Molecule, j: usize, k: usize, order: BondOrder, ring_bond: bool) -> [f64; 3] {
    let hj = mol.hybridization(j);
    let hk = mol.hybridization(k);
    if hj == Hybridization::SP || hk == Hybridization::SP {
        return [0.0; 3];
    }
    match order {
        BondOrder::Double => [0.0, 12.0, 0.0],
        BondOrder::Aromatic => [0.0, if ring_bond { 6.0 } else { 3.0 }, 0.0],
        BondOrder::Triple => [0.0; 3],
        BondOrder::Single => match (hj == Hybridization::SP2, hk == Hybridization::SP2) {
            (true, true) => [0.0, 1.5, 0.0],
            (false, false) => [0.0, 0.0, 0.3],
            _ => [0.0, 0.0, 0.1],
        },
    }
}

// ---------------------------------------------------------------------------
// UFF typing and parameters
// ---------------------------------------------------------------------------

/// UFF atom type determined by element and hybridization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UffAtomType {
    H,
    C3,
    C2,
    CR,
    C1,
    N3,
    N2,
    NR,
    N1,
    O3,
    O2,
    OR,
    F,
    S3,
    S2,
    SR,
    P3,
    Cl,
    Br,
    I,
    Si3,
    Se3,
    B3,
    B2,
    Ge3,
    As3,
    Sn3,
    Li,
    Na,
    K,
    Mg3,
    Ca6,
    Al3,
    Zn3,
}

/// Rappé et al. 1992 parameters.
struct UffParams {
    /// Bonded radius (Å)
    r: f64,
    /// Natural angle (degrees)
    theta0: f64,
    /// vdW distance (Å)
    x: f64,
    /// vdW well depth (kcal/mol)
    d: f64,
    /// Effective charge
    z: f64,
    /// GMP electronegativity
    chi: f64,
    /// sp3 torsional barrier
    v_sp3: f64,
    /// sp2 torsional barrier
    u_sp2: f64,
}

#[rustfmt::skip]
fn uff_params(at: UffAtomType) -> UffParams {
    use UffAtomType::*;
    let p = |r, theta0, x, d, z, chi, v_sp3, u_sp2| UffParams { r, theta0, x, d, z, chi, v_sp3, u_sp2 };
    match at {
        H   => p(0.354, 180.0,  2.886, 0.044, 0.712, 4.528, 0.0,   0.0),
        C3  => p(0.757, 109.47, 3.851, 0.105, 1.912, 5.343, 2.119, 2.0),
        C2  => p(0.732, 120.0,  3.851, 0.105, 1.912, 5.343, 2.119, 2.0),
        CR  => p(0.729, 120.0,  3.851, 0.105, 1.912, 5.343, 2.119, 2.0),
        C1  => p(0.706, 180.0,  3.851, 0.105, 1.912, 5.343, 2.119, 2.0),
        N3  => p(0.700, 106.7,  3.660, 0.069, 2.544, 6.899, 0.450, 2.0),
        N2  => p(0.685, 111.2,  3.660, 0.069, 2.544, 6.899, 0.450, 2.0),
        NR  => p(0.699, 120.0,  3.660, 0.069, 2.544, 6.899, 0.450, 2.0),
        N1  => p(0.656, 180.0,  3.660, 0.069, 2.544, 6.899, 0.450, 2.0),
        O3  => p(0.658, 104.51, 3.500, 0.060, 2.300, 8.741, 0.018, 2.0),
        O2  => p(0.634, 120.0,  3.500, 0.060, 2.300, 8.741, 0.018, 2.0),
        OR  => p(0.680, 110.0,  3.500, 0.060, 2.300, 8.741, 0.018, 2.0),
        F   => p(0.668, 180.0,  3.364, 0.050, 1.735, 10.874, 0.0,  2.0),
        S3  => p(1.064, 92.1,   4.035, 0.274, 2.703, 6.928, 0.484, 1.25),
        S2  => p(0.854, 120.0,  4.035, 0.274, 2.703, 6.928, 0.484, 1.25),
        SR  => p(1.077, 92.2,   4.035, 0.274, 2.703, 6.928, 0.484, 1.25),
        P3  => p(1.101, 93.8,   4.147, 0.305, 2.863, 5.463, 2.400, 1.25),
        Cl  => p(1.044, 180.0,  3.947, 0.227, 2.348, 8.564, 0.0,   1.25),
        Br  => p(1.192, 180.0,  4.189, 0.251, 2.519, 7.790, 0.0,   0.7),
        I   => p(1.382, 180.0,  4.500, 0.339, 2.650, 6.822, 0.0,   0.2),
        Si3 => p(1.117, 109.47, 4.295, 0.402, 2.323, 4.168, 1.225, 1.25),
        Se3 => p(1.190, 90.6,   4.205, 0.291, 2.764, 6.428, 0.335, 0.7),
        B3  => p(0.838, 109.47, 4.083, 0.180, 1.755, 4.750, 0.0,   2.0),
        B2  => p(0.828, 120.0,  4.083, 0.180, 1.755, 4.750, 0.0,   2.0),
        Ge3 => p(1.197, 109.47, 4.280, 0.379, 2.442, 4.051, 0.701, 0.7),
        As3 => p(1.211, 92.1,   4.230, 0.309, 2.817, 5.188, 1.500, 0.7),
        Sn3 => p(1.398, 109.47, 4.392, 0.567, 2.961, 3.987, 0.199, 0.2),
        Li  => p(1.336, 180.0,  2.451, 0.025, 1.026, 3.006, 0.0,   2.0),
        Na  => p(1.539, 180.0,  2.983, 0.030, 1.081, 2.843, 0.0,   1.25),
        K   => p(1.953, 180.0,  3.812, 0.035, 1.165, 2.421, 0.0,   0.7),
        Mg3 => p(1.421, 109.47, 3.021, 0.111, 1.787, 3.951, 0.0,   1.25),
        Ca6 => p(1.761, 90.0,   3.399, 0.238, 2.141, 3.231, 0.0,   0.7),
        Al3 => p(1.244, 109.47, 4.499, 0.505, 1.792, 3.041, 0.0,   1.25),
        Zn3 => p(1.193, 109.47, 2.763, 0.124, 1.308, 5.106, 0.0,   0.7),
    }
}

/// Assign UFF atom types. Elements outside the table are unsupported.
pub fn assign_uff_types(mol: &Molecule) -> Result<Vec<UffAtomType>> {
    use UffAtomType::*;
    (0..mol.atom_count())
        .map(|i| {
            let atom = &mol.atoms[i];
            let hyb = mol.hybridization(i);
            Ok(match atom.atomic_number {
                1 => H,
                6 if atom.is_aromatic => CR,
                6 => match hyb {
                    Hybridization::SP => C1,
                    Hybridization::SP2 => C2,
                    _ => C3,
                },
                7 if atom.is_aromatic => NR,
                7 => match hyb {
                    Hybridization::SP => N1,
                    Hybridization::SP2 => N2,
                    _ => N3,
                },
                8 if atom.is_aromatic => OR,
                8 if hyb == Hybridization::SP2 => O2,
                8 => O3,
                16 if atom.is_aromatic => SR,
                16 if mol.degree(i) == 1 && hyb == Hybridization::SP2 => S2,
                16 => S3,
                5 if mol.degree(i) + atom.implicit_hydrogens as usize == 3 => B2,
                5 => B3,
                9 => F,
                17 => Cl,
                35 => Br,
                53 => I,
                15 => P3,
                14 => Si3,
                34 => Se3,
                32 => Ge3,
                33 => As3,
                50 => Sn3,
                3 => Li,
                11 => Na,
                19 => K,
                12 => Mg3,
                20 => Ca6,
                13 => Al3,
                30 => Zn3,
                z => {
                    return Err(QsarError::Unsupported(format!(
                        "no UFF parameters for element {z} (atom {i})"
                    )))
                }
            })
        })
        .collect()
}

fn uff_is_sp2(at: UffAtomType) -> bool {
    use UffAtomType::*;
    matches!(at, C2 | CR | N2 | NR | O2 | OR | S2 | SR | B2)
}

fn uff_is_sp3(at: UffAtomType) -> bool {
    use UffAtomType::*;
    matches!(at, C3 | N3 | O3 | S3 | P3 | Si3 | Se3 | Ge3 | As3 | Sn3)
}

/// Natural bond length r_ij = r_i + r_j + r_BO − r_EN.
fn uff_bond_length(a: &UffParams, b: &UffParams, order: f64) -> f64 {
    let r_bo = -0.1332 * (a.r + b.r) * order.ln();
    let r_en = a.r * b.r * (a.chi.sqrt() - b.chi.sqrt()).powi(2) / (a.chi * a.r + b.chi * b.r);
    a.r + b.r + r_bo - r_en
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl ForceField {
    /// Build the MMFF94-style force field for a hydrogen-complete molecule.
    pub fn mmff94(mol: &Molecule) -> Result<Self> {
        let types = assign_mmff94_types(mol)?;
        let rings = RingInfo::new(mol);
        let charges = gasteiger_charges(mol).unwrap_or_else(|_| vec![0.0; mol.atom_count()]);

        let bonds = mol
            .bonds
            .iter()
            .map(|b| {
                let (t1, t2) = (types[b.atom1], types[b.atom2]);
                BondTerm {
                    i: b.atom1,
                    j: b.atom2,
                    r0: mmff_bond_r0(b.order, t1, t2),
                    k: 0.5 * MDYNE_TO_KCAL * mmff_bond_k(b.order, t1, t2),
                    cs: -2.0,
                }
            })
            .collect();

        let angles = angle_triples(mol)
            .into_iter()
            .map(|(i, j, k)| {
                let theta0 = ring_angle(&rings, i, j, k).unwrap_or_else(|| types[j].theta0());
                let ka = if types[i].is_hydrogen() || types[k].is_hydrogen() { 0.5 } else { 0.75 };
                AngleTerm {
                    i,
                    j,
                    k,
                    theta0: theta0.to_radians(),
                    form: AngleForm::Cubic { k: 0.043844 / 2.0 * ka, cb: -0.007 },
                }
            })
            .collect();

        let mut torsions = Vec::new();
        for (bi, bond) in mol.bonds.iter().enumerate() {
            let v = mmff_torsion_v(mol, bond.atom1, bond.atom2, bond.order, rings.is_ring_bond(bi));
            if v.iter().all(|x| x.abs() < 1e-12) {
                continue;
            }
            for quad in torsion_quads(mol, bond.atom1, bond.atom2) {
                torsions.push(TorsionTerm { atoms: quad, v: [v[0], v[1], v[2], 0.0] });
            }
        }

        let mut oop = Vec::new();
        for j in 0..mol.atom_count() {
            let trigonal = mol.hybridization(j) == Hybridization::SP2 || types[j] == Mmff94AtomType::NPYL;
            if trigonal && mol.degree(j) == 3 {
                let nb: Vec<usize> = mol.adjacency[j].iter().map(|&(n, _)| n).collect();
                for (i, k, l) in [(nb[0], nb[1], nb[2]), (nb[1], nb[2], nb[0]), (nb[2], nb[0], nb[1])] {
                    oop.push(OopTerm { center: j, i, k, l, k_oop: 0.043844 / 2.0 * 0.05, cosine: false });
                }
            }
        }

        let vdw_params: Vec<MmffVdw> = types.iter().map(|t| t.vdw()).collect();
        let r_ii: Vec<f64> = vdw_params.iter().map(|p| p.a * p.alpha.powf(0.25)).collect();
        let (excluded, one_four) = neighbor_sets(mol);
        let mut pairs = Vec::new();
        for i in 0..mol.atom_count() {
            for j in (i + 1)..mol.atom_count() {
                if excluded.contains(&(i, j)) {
                    continue;
                }
                let (pi, pj) = (&vdw_params[i], &vdw_params[j]);
                let gamma = (r_ii[i] - r_ii[j]) / (r_ii[i] + r_ii[j]);
                let both_h = types[i].is_hydrogen() && types[j].is_hydrogen();
                let beta = if both_h { 0.0 } else { 0.2 };
                let mut r_star = 0.5 * (r_ii[i] + r_ii[j]) * (1.0 + beta * (1.0 - (-12.0 * gamma * gamma).exp()));
                let mut eps = 181.16 * pi.g * pj.g * pi.alpha * pj.alpha
                    / ((pi.alpha / pi.n_eff).sqrt() + (pj.alpha / pj.n_eff).sqrt())
                    / r_star.powi(6);
                if (pi.donor && pj.acceptor) || (pi.acceptor && pj.donor) {
                    r_star *= 0.8;
                    eps *= 0.5;
                }
                let scale = if one_four.contains(&(i, j)) { 0.75 } else { 1.0 };
                pairs.push(PairTerm { i, j, r_star, eps, qq: COULOMB * charges[i] * charges[j] * scale });
            }
        }

        Ok(ForceField {
            kind: ForceFieldKind::Mmff94,
            n_atoms: mol.atom_count(),
            bonds,
            angles,
            torsions,
            oop,
            pairs,
        })
    }

    /// Build the UFF force field for a hydrogen-complete molecule.
    pub fn uff(mol: &Molecule) -> Result<Self> {
        let types = assign_uff_types(mol)?;
        let params: Vec<UffParams> = types.iter().map(|&t| uff_params(t)).collect();
        let rings = RingInfo::new(mol);

        let bond_length = |a: usize, b: usize| -> f64 {
            let order = mol.get_bond(a, b).map_or(1.0, |bond| bond.order.as_f64());
            uff_bond_length(&params[a], &params[b], order)
        };

        let bonds = mol
            .bonds
            .iter()
            .map(|b| {
                let (pa, pb) = (&params[b.atom1], &params[b.atom2]);
                let r0 = bond_length(b.atom1, b.atom2);
                BondTerm { i: b.atom1, j: b.atom2, r0, k: 0.5 * 664.12 * pa.z * pb.z / r0.powi(3), cs: 0.0 }
            })
            .collect();

        let angles = angle_triples(mol)
            .into_iter()
            .map(|(i, j, k)| {
                let theta0_deg = ring_angle(&rings, i, j, k).unwrap_or(params[j].theta0);
                let theta0 = theta0_deg.to_radians();
                let (r_ij, r_jk) = (bond_length(i, j), bond_length(j, k));
                let cos0 = theta0.cos();
                let r_ik = (r_ij * r_ij + r_jk * r_jk - 2.0 * r_ij * r_jk * cos0).sqrt();
                let ka = 664.12 * params[i].z * params[k].z / r_ik.powi(5)
                    * (3.0 * r_ij * r_jk * (1.0 - cos0 * cos0) - r_ik * r_ik * cos0);
                let form = if theta0_deg > 179.0 {
                    AngleForm::Linear { k: ka }
                } else {
                    let sin2 = (1.0 - cos0 * cos0).max(1e-8);
                    let c2 = 1.0 / (4.0 * sin2);
                    AngleForm::Fourier { k: ka, c0: c2 * (2.0 * cos0 * cos0 + 1.0), c1: -4.0 * c2 * cos0, c2 }
                };
                AngleTerm { i, j, k, theta0, form }
            })
            .collect();

        let mut torsions = Vec::new();
        for bond in &mol.bonds {
            let (j, k) = (bond.atom1, bond.atom2);
            let (tj, tk) = (types[j], types[k]);
            let quads = torsion_quads(mol, j, k);
            if quads.is_empty() {
                continue;
            }
            let v = if uff_is_sp3(tj) && uff_is_sp3(tk) {
                // n = 3, φ0 = 180°
                let v = (params[j].v_sp3 * params[k].v_sp3).sqrt();
                [0.0, 0.0, v, 0.0]
            } else if uff_is_sp2(tj) && uff_is_sp2(tk) {
                // n = 2, φ0 = 180°
                let v = 5.0 * (params[j].u_sp2 * params[k].u_sp2).sqrt() * (1.0 + 4.18 * bond.order.as_f64().ln());
                [0.0, v, 0.0, 0.0]
            } else if (uff_is_sp2(tj) && uff_is_sp3(tk)) || (uff_is_sp3(tj) && uff_is_sp2(tk)) {
                // n = 6, φ0 = 0°
                [0.0, 0.0, 0.0, 1.0]
            } else {
                continue;
            };
            let per = quads.len() as f64;
            for quad in quads {
                torsions.push(TorsionTerm { atoms: quad, v: v.map(|x| x / per) });
            }
        }

        let mut oop = Vec::new();
        for j in 0..mol.atom_count() {
            if !matches!(types[j], UffAtomType::C2 | UffAtomType::CR | UffAtomType::N2 | UffAtomType::NR)
                || mol.degree(j) != 3
            {
                continue;
            }
            let nb: Vec<usize> = mol.adjacency[j].iter().map(|&(n, _)| n).collect();
            let to_carbonyl_o = nb.iter().any(|&n| types[n] == UffAtomType::O2);
            let k = if types[j] == UffAtomType::C2 && to_carbonyl_o { 50.0 } else { 6.0 } / 3.0;
            for (i, kk, l) in [(nb[0], nb[1], nb[2]), (nb[1], nb[2], nb[0]), (nb[2], nb[0], nb[1])] {
                oop.push(OopTerm { center: j, i, k: kk, l, k_oop: k, cosine: true });
            }
        }

        let (excluded, _) = neighbor_sets(mol);
        let mut pairs = Vec::new();
        for i in 0..mol.atom_count() {
            for j in (i + 1)..mol.atom_count() {
                if excluded.contains(&(i, j)) {
                    continue;
                }
                pairs.push(PairTerm {
                    i,
                    j,
                    r_star: (params[i].x * params[j].x).sqrt(),
                    eps: (params[i].d * params[j].d).sqrt(),
                    qq: 0.0,
                });
            }
        }

        Ok(ForceField {
            kind: ForceFieldKind::Uff,
            n_atoms: mol.atom_count(),
            bonds,
            angles,
            torsions,
            oop,
            pairs,
        })
    }

    pub fn kind(&self) -> ForceFieldKind {
        self.kind
    }
}

fn angle_triples(mol: &Molecule) -> Vec<(usize, usize, usize)> {
    let mut out = Vec::new();
    for j in 0..mol.atom_count() {
        let nb = &mol.adjacency[j];
        for a in 0..nb.len() {
            for b in (a + 1)..nb.len() {
                out.push((nb[a].0, j, nb[b].0));
            }
        }
    }
    out
}

fn torsion_quads(mol: &Molecule, j: usize, k: usize) -> Vec<[usize; 4]> {
    let mut out = Vec::new();
    for &(i, _) in &mol.adjacency[j] {
        if i == k {
            continue;
        }
        for &(l, _) in &mol.adjacency[k] {
            if l == j || l == i {
                continue;
            }
            out.push([i, j, k, l]);
        }
    }
    out
}

/// Interior angle (degrees) when i-j-k lies in a ring of three to five atoms.
fn ring_angle(rings: &RingInfo, i: usize, j: usize, k: usize) -> Option<f64> {
    rings
        .rings
        .iter()
        .filter(|r| r.len() < 6 && r.contains(&i) && r.contains(&j) && r.contains(&k))
        .map(|r| 180.0 * (r.len() as f64 - 2.0) / r.len() as f64)
        .reduce(f64::min)
}

/// 1-2 and 1-3 pairs (excluded from non-bonded terms) and 1-4 pairs.
fn neighbor_sets(mol: &Molecule) -> (HashSet<(usize, usize)>, HashSet<(usize, usize)>) {
    let ordered = |a: usize, b: usize| if a < b { (a, b) } else { (b, a) };
    let mut excluded = HashSet::new();
    for bond in &mol.bonds {
        excluded.insert(ordered(bond.atom1, bond.atom2));
    }
    for (i, _, k) in angle_triples(mol) {
        excluded.insert(ordered(i, k));
    }
    let mut one_four = HashSet::new();
    for bond in &mol.bonds {
        for [i, _, _, l] in torsion_quads(mol, bond.atom1, bond.atom2) {
            let pair = ordered(i, l);
            if !excluded.contains(&pair) {
                one_four.insert(pair);
            }
        }
    }
    (excluded, one_four)
}

// ---------------------------------------------------------------------------
// Energy
// ---------------------------------------------------------------------------

fn angle_at(c: &[[f64; 3]], i: usize, j: usize, k: usize) -> f64 {
    let v1 = sub3(c[i], c[j]);
    let v2 = sub3(c[k], c[j]);
    let (n1, n2) = (norm3(v1), norm3(v2));
    if n1 < 1e-12 || n2 < 1e-12 {
        return 0.0;
    }
    (dot3(v1, v2) / (n1 * n2)).clamp(-1.0, 1.0).acos()
}

fn dihedral_at(c: &[[f64; 3]], [i, j, k, l]: [usize; 4]) -> f64 {
    let b1 = sub3(c[j], c[i]);
    let b2 = sub3(c[k], c[j]);
    let b3 = sub3(c[l], c[k]);
    let n1 = cross3(b1, b2);
    let n2 = cross3(b2, b3);
    let b2n = norm3(b2);
    if b2n < 1e-12 {
        return 0.0;
    }
    let m1 = cross3(n1, [b2[0] / b2n, b2[1] / b2n, b2[2] / b2n]);
    dot3(m1, n2).atan2(dot3(n1, n2))
}

/// Angle between the center→l bond and the plane through i, center, k.
fn wilson_angle(c: &[[f64; 3]], center: usize, i: usize, k: usize, l: usize) -> f64 {
    let n = cross3(sub3(c[i], c[center]), sub3(c[k], c[center]));
    let vl = sub3(c[l], c[center]);
    let (nn, nl) = (norm3(n), norm3(vl));
    if nn < 1e-12 || nl < 1e-12 {
        return 0.0;
    }
    (dot3(n, vl) / (nn * nl)).clamp(-1.0, 1.0).asin()
}

impl BondTerm {
    fn energy(&self, c: &[[f64; 3]]) -> f64 {
        let dr = norm3(sub3(c[self.i], c[self.j])) - self.r0;
        self.k * dr * dr * (1.0 + self.cs * dr + 7.0 / 12.0 * self.cs * self.cs * dr * dr)
    }
}

impl AngleTerm {
    fn energy(&self, c: &[[f64; 3]]) -> f64 {
        let theta = angle_at(c, self.i, self.j, self.k);
        match self.form {
            AngleForm::Cubic { k, cb } => {
                let d = (theta - self.theta0) * DEG;
                k * d * d * (1.0 + cb * d)
            }
            AngleForm::Fourier { k, c0, c1, c2 } => k * (c0 + c1 * theta.cos() + c2 * (2.0 * theta).cos()),
            AngleForm::Linear { k } => k * (1.0 + theta.cos()),
        }
    }
}

impl TorsionTerm {
    fn energy(&self, c: &[[f64; 3]]) -> f64 {
        let phi = dihedral_at(c, self.atoms);
        let [v1, v2, v3, v6] = self.v;
        0.5 * (v1 * (1.0 + phi.cos()) + v2 * (1.0 - (2.0 * phi).cos()) + v3 * (1.0 + (3.0 * phi).cos()))
            + 0.5 * v6 * (1.0 - (6.0 * phi).cos())
    }
}

impl OopTerm {
    fn energy(&self, c: &[[f64; 3]]) -> f64 {
        let chi = wilson_angle(c, self.center, self.i, self.k, self.l);
        if self.cosine {
            self.k_oop * (1.0 - chi.cos())
        } else {
            let d = chi * DEG;
            self.k_oop * d * d
        }
    }
}

impl PairTerm {
    /// Energy and dE/dr for the van der Waals and electrostatic parts.
    fn energy_and_slope(&self, r: f64, kind: ForceFieldKind) -> (f64, f64, f64, f64) {
        let r = r.max(0.5);
        let (e_vdw, de_vdw) = match kind {
            ForceFieldKind::Mmff94 => {
                // Buffered 14-7
                let rs = self.r_star;
                let a = 1.07 * rs / (r + 0.07 * rs);
                let a7 = a.powi(7);
                let denom = r.powi(7) + 0.12 * rs.powi(7);
                let b = 1.12 * rs.powi(7) / denom - 2.0;
                let da = -a / (r + 0.07 * rs);
                let db = -1.12 * rs.powi(7) * 7.0 * r.powi(6) / (denom * denom);
                (self.eps * a7 * b, self.eps * (7.0 * a.powi(6) * da * b + a7 * db))
            }
            ForceFieldKind::Uff => {
                let q = self.r_star / r;
                let q6 = q.powi(6);
                let q12 = q6 * q6;
                (self.eps * (q12 - 2.0 * q6), self.eps * (-12.0 * q12 + 12.0 * q6) / r)
            }
        };
        let (e_el, de_el) = if self.qq != 0.0 {
            let rb = r + 0.05;
            (self.qq / rb, -self.qq / (rb * rb))
        } else {
            (0.0, 0.0)
        };
        (e_vdw, de_vdw, e_el, de_el)
    }
}

impl ForceField {
    fn check(&self, coords: &[[f64; 3]]) -> Result<()> {
        if coords.len() != self.n_atoms {
            return Err(QsarError::InvalidInput(format!(
                "conformer has {} atoms, force field expects {}",
                coords.len(),
                self.n_atoms
            )));
        }
        Ok(())
    }

    /// Energy decomposition for a conformer.
    pub fn energy(&self, conf: &Conformer) -> Result<EnergyComponents> {
        self.check(&conf.coords)?;
        Ok(self.components(&conf.coords))
    }

    fn components(&self, c: &[[f64; 3]]) -> EnergyComponents {
        let mut e = EnergyComponents {
            bond_stretch: self.bonds.iter().map(|t| t.energy(c)).sum(),
            angle_bend: self.angles.iter().map(|t| t.energy(c)).sum(),
            torsion: self.torsions.iter().map(|t| t.energy(c)).sum(),
            out_of_plane: self.oop.iter().map(|t| t.energy(c)).sum(),
            ..EnergyComponents::default()
        };
        for p in &self.pairs {
            let (ev, _, ee, _) = p.energy_and_slope(norm3(sub3(c[p.i], c[p.j])), self.kind);
            e.van_der_waals += ev;
            e.electrostatic += ee;
        }
        e.total = e.bond_stretch + e.angle_bend + e.torsion + e.out_of_plane + e.van_der_waals + e.electrostatic;
        e
    }

    fn total(&self, c: &[[f64; 3]]) -> f64 {
        self.components(c).total
    }

    /// Gradient: analytic for pair terms, per-term central differences for
    /// the bonded terms (each touches at most four atoms).
    fn gradient(&self, c: &[[f64; 3]], grad: &mut [[f64; 3]]) {
        grad.iter_mut().for_each(|g| *g = [0.0; 3]);
        let mut work = c.to_vec();

        for t in &self.bonds {
            numeric_term_gradient(&mut work, &[t.i, t.j], grad, |w| t.energy(w));
        }
        for t in &self.angles {
            numeric_term_gradient(&mut work, &[t.i, t.j, t.k], grad, |w| t.energy(w));
        }
        for t in &self.torsions {
            numeric_term_gradient(&mut work, &t.atoms, grad, |w| t.energy(w));
        }
        for t in &self.oop {
            numeric_term_gradient(&mut work, &[t.center, t.i, t.k, t.l], grad, |w| t.energy(w));
        }
        for p in &self.pairs {
            let d = sub3(c[p.i], c[p.j]);
            let r = norm3(d);
            if r < 1e-9 {
                continue;
            }
            let (_, dv, _, de) = p.energy_and_slope(r, self.kind);
            let s = (dv + de) / r;
            for k in 0..3 {
                grad[p.i][k] += s * d[k];
                grad[p.j][k] -= s * d[k];
            }
        }
    }

    /// Minimise the energy starting from `conformer`.
    pub fn minimize(&self, conformer: &Conformer, config: &MinimizeConfig) -> Result<MinimizeResult> {
        self.check(&conformer.coords)?;
        let n = self.n_atoms;
        let mut x = conformer.coords.clone();
        let initial_energy = self.total(&x);
        if !initial_energy.is_finite() {
            return Err(QsarError::Other("force field energy is not finite".into()));
        }

        let mut energy = initial_energy;
        let mut grad = vec![[0.0_f64; 3]; n];
        self.gradient(&x, &mut grad);
        let mut direction: Vec<[f64; 3]> = grad.iter().map(|g| g.map(|v| -v)).collect();
        let mut step = 0.05;
        let mut converged = false;
        let mut n_steps = 0;

        for iter in 0..config.max_steps {
            n_steps = iter + 1;
            let g2: f64 = grad.iter().flatten().map(|v| v * v).sum();
            if (g2 / (3 * n.max(1)) as f64).sqrt() < config.gradient_threshold {
                converged = true;
                break;
            }

            let mut slope: f64 = grad.iter().zip(&direction).map(|(g, d)| dot3(*g, *d)).sum();
            if slope >= 0.0 {
                direction = grad.iter().map(|g| g.map(|v| -v)).collect();
                slope = -g2;
            }
            let dnorm = direction.iter().flatten().map(|v| v * v).sum::<f64>().sqrt();
            if dnorm < 1e-12 {
                converged = true;
                break;
            }

            // Backtracking (Armijo) line search with a capped displacement.
            let mut alpha = step / dnorm;
            let mut accepted = None;
            for _ in 0..30 {
                let trial: Vec<[f64; 3]> = x
                    .iter()
                    .zip(&direction)
                    .map(|(p, d)| [p[0] + alpha * d[0], p[1] + alpha * d[1], p[2] + alpha * d[2]])
                    .collect();
                let e = self.total(&trial);
                if e.is_finite() && e <= energy + 1e-4 * alpha * slope {
                    accepted = Some((trial, e));
                    break;
                }
                alpha *= 0.5;
            }
            let Some((trial, e)) = accepted else {
                break;
            };
            x = trial;
            let improvement = energy - e;
            energy = e;
            step = (alpha * dnorm * 1.5).clamp(1e-4, 0.3);

            let old = std::mem::replace(&mut grad, vec![[0.0; 3]; n]);
            self.gradient(&x, &mut grad);
            match config.method {
                MinimizeMethod::SteepestDescent => {
                    direction = grad.iter().map(|g| g.map(|v| -v)).collect();
                }
                MinimizeMethod::ConjugateGradient => {
                    // Polak-Ribière with automatic restart.
                    let num: f64 = grad.iter().zip(&old).map(|(g, o)| dot3(*g, sub3(*g, *o))).sum();
                    let den: f64 = old.iter().flatten().map(|v| v * v).sum();
                    let beta = if den > 1e-30 { (num / den).max(0.0) } else { 0.0 };
                    for (d, g) in direction.iter_mut().zip(&grad) {
                        for k in 0..3 {
                            d[k] = -g[k] + beta * d[k];
                        }
                    }
                }
            }
            if improvement.abs() < 1e-8 {
                converged = true;
                break;
            }
        }

        let conformer = Conformer::new(x);
        if !conformer.is_finite() {
            return Err(QsarError::Other("minimisation produced non-finite coordinates".into()));
        }
        Ok(MinimizeResult { conformer, initial_energy, final_energy: energy, n_steps, converged })
    }
}

fn numeric_term_gradient<F>(work: &mut [[f64; 3]], atoms: &[usize], grad: &mut [[f64; 3]], energy: F)
where
    F: Fn(&[[f64; 3]]) -> f64,
{
    const H: f64 = 1e-5;
    for &a in atoms {
        for k in 0..3 {
            let orig = work[a][k];
            work[a][k] = orig + H;
            let ep = energy(work);
            work[a][k] = orig - H;
            let em = energy(work);
            work[a][k] = orig;
            grad[a][k] += (ep - em) / (2.0 * H);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{embed_molecule, EmbedConfig};
    use crate::hydrogens::add_hydrogens;
    use crate::smiles::parse_smiles;

    fn embedded(smi: &str) -> (Molecule, Conformer) {
        let mol = add_hydrogens(&parse_smiles(smi).unwrap());
        let config = EmbedConfig { optimize: false, ..EmbedConfig::default() };
        let conf = embed_molecule(&mol, &config).unwrap();
        (mol, conf)
    }

    #[test]
    fn typing_covers_common_elements() {
        let mol = add_hydrogens(&parse_smiles("CC(=O)Oc1ccccc1C(=O)O").unwrap());
        let types = assign_mmff94_types(&mol).unwrap();
        assert_eq!(types[0], Mmff94AtomType::CR);
        assert_eq!(types[1], Mmff94AtomType::CEqO);
        assert_eq!(types[2], Mmff94AtomType::OEqC);
        assert_eq!(types[4], Mmff94AtomType::CB);
        assert!(assign_uff_types(&mol).is_ok());
    }

    #[test]
    fn unknown_elements_are_unsupported() {
        let mol = add_hydrogens(&parse_smiles("C[Se]C").unwrap());
        assert!(matches!(ForceField::mmff94(&mol), Err(QsarError::Unsupported(_))));
        assert!(ForceField::uff(&mol).is_ok());
        let mol = add_hydrogens(&parse_smiles("C[Te]C").unwrap());
        assert!(matches!(ForceField::uff(&mol), Err(QsarError::Unsupported(_))));
    }

    #[test]
    fn stretched_bond_costs_energy() {
        let mol = parse_smiles("CC").unwrap();
        let ff = ForceField::uff(&mol).unwrap();
        let near = ff.energy(&Conformer::new(vec![[0.0; 3], [1.52, 0.0, 0.0]])).unwrap();
        let far = ff.energy(&Conformer::new(vec![[0.0; 3], [2.2, 0.0, 0.0]])).unwrap();
        assert!(far.bond_stretch > near.bond_stretch);
        assert!(near.bond_stretch < 0.5, "{near:?}");
    }

    #[test]
    fn minimisation_lowers_energy() {
        for smi in ["CCO", "c1ccccc1", "CC(=O)N"] {
            let (mol, conf) = embedded(smi);
            for ff in [ForceField::mmff94(&mol).unwrap(), ForceField::uff(&mol).unwrap()] {
                let result = ff.minimize(&conf, &MinimizeConfig::default()).unwrap();
                assert!(
                    result.final_energy <= result.initial_energy + 1e-9,
                    "{smi} {:?}: {} -> {}",
                    ff.kind(),
                    result.initial_energy,
                    result.final_energy
                );
                assert!(result.conformer.is_finite());
            }
        }
    }

    #[test]
    fn minimised_bond_lengths_are_chemical() {
        let (mol, conf) = embedded("CCO");
        let ff = ForceField::mmff94(&mol).unwrap();
        let result = ff.minimize(&conf, &MinimizeConfig { max_steps: 500, ..MinimizeConfig::default() }).unwrap();
        let c = &result.conformer;
        let cc = c.distance(0, 1);
        assert!((cc - 1.5).abs() < 0.1, "C-C = {cc}");
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let (mol, conf) = embedded("CC=O");
        let ff = ForceField::mmff94(&mol).unwrap();
        let mut grad = vec![[0.0; 3]; mol.atom_count()];
        ff.gradient(&conf.coords, &mut grad);
        let h = 1e-5;
        for atom in [0, 2] {
            for k in 0..3 {
                let mut plus = conf.coords.clone();
                let mut minus = conf.coords.clone();
                plus[atom][k] += h;
                minus[atom][k] -= h;
                let fd = (ff.total(&plus) - ff.total(&minus)) / (2.0 * h);
                assert!((fd - grad[atom][k]).abs() < 1e-3 * fd.abs().max(1.0), "atom {atom} dim {k}: {fd} vs {}", grad[atom][k]);
            }
        }
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let mol = parse_smiles("CC").unwrap();
        let ff = ForceField::uff(&mol).unwrap();
        assert!(ff.energy(&Conformer::new(vec![[0.0; 3]])).is_err());
    }
}
