//! Descriptor engine: SMILES in, flat name → value table out.
//!
//! Groups are computed in a fixed order (2D, 3D, fingerprints, fragments,
//! EState_VSA). Parsing failures abort the call; the 3D group and each of its
//! WHIM/GETAWAY/MoRSE sub-groups are dropped independently on failure.

use qsarkit_core::{QsarError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::descriptors::{crippen_logp_mr, estate_extrema, estate_indices, tpsa};
use crate::druglikeness::qed;
use crate::element::atomic_weight;
use crate::embed::{generate_conformer, EmbedConfig};
use crate::fingerprint::{
    atom_pair_fingerprint, morgan_fingerprint, path_fingerprint, pattern_fingerprint, torsion_fingerprint,
    DEFAULT_FP_BITS,
};
use crate::fragments::{fragment_counts, fragment_names, FRAGMENTS};
use crate::gasteiger::gasteiger_charges;
use crate::hydrogens::{add_hydrogens, remove_hydrogens};
use crate::maccs::maccs_fingerprint;
use crate::molecule::Molecule;
use crate::properties::compute_properties;
use crate::shape::{plane_of_best_fit, principal_moments};
use crate::smiles::parse_smiles;
use crate::spatial::{getaway, morse, whim, GETAWAY_COUNT, MORSE_COUNT, WHIM_COUNT};
use crate::surface::{estate_vsa, labute_asa, ESTATE_VSA_COUNT};
use crate::table::DescriptorTable;

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// The 2D group, always present for a parsed structure.
pub const DESCRIPTORS_2D: [&str; 25] = [
    "MolWt",
    "LogP",
    "NumHDonors",
    "NumHAcceptors",
    "TPSA",
    "NumRotatableBonds",
    "NumAromaticRings",
    "NumSaturatedRings",
    "FractionCsp3",
    "HeavyAtomCount",
    "RingCount",
    "AromaticRings",
    "SaturatedRings",
    "AliphaticRings",
    "NumRadicalElectrons",
    "NumValenceElectrons",
    "MaxPartialCharge",
    "MinPartialCharge",
    "MaxEStateIndex",
    "MinEStateIndex",
    "MaxAbsEStateIndex",
    "MinAbsEStateIndex",
    "qed",
    "MolMR",
    "LabuteASA",
];

pub const FINGERPRINT_DESCRIPTORS: [&str; 8] = [
    "Morgan_FP",
    "AtomPair_FP",
    "Torsion_FP",
    "MACCS_FP",
    "RDKit_FP",
    "Pattern_FP",
    "Morgan2_FP",
    "Morgan3_FP",
];

const SHAPE_DESCRIPTORS: [&str; 7] = ["PMI1", "PMI2", "PMI3", "PMI1_norm", "PMI2_norm", "PMI3_norm", "PlaneOfBestFit"];

/// Every 3D name the engine can emit, in output order.
pub fn descriptor_names_3d() -> Vec<String> {
    let mut names: Vec<String> = SHAPE_DESCRIPTORS.iter().map(|s| s.to_string()).collect();
    names.extend((1..=WHIM_COUNT).map(|i| format!("WHIM{i}")));
    names.extend((1..=GETAWAY_COUNT).map(|i| format!("GETAWAY{i}")));
    names.extend((1..=MORSE_COUNT).map(|i| format!("3DMoRSE{i}")));
    names
}

fn estate_vsa_names() -> impl Iterator<Item = String> {
    (1..=ESTATE_VSA_COUNT).map(|i| format!("EState_VSA{i}"))
}

/// The full naming scheme in output order.
pub fn descriptor_names(include_3d: bool) -> Vec<String> {
    let mut names: Vec<String> = DESCRIPTORS_2D.iter().map(|s| s.to_string()).collect();
    if include_3d {
        names.extend(descriptor_names_3d());
    }
    names.extend(FINGERPRINT_DESCRIPTORS.iter().map(|s| s.to_string()));
    names.extend(fragment_names().map(String::from));
    names.extend(estate_vsa_names());
    names
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

/// One descriptor group with a description of each key.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorGroupInfo {
    pub group: &'static str,
    pub descriptors: Vec<(String, String)>,
}

fn describe_2d(name: &str) -> &'static str {
    match name {
        "MolWt" => "Average molecular weight",
        "LogP" => "Wildman-Crippen octanol-water partition coefficient",
        "NumHDonors" => "Number of hydrogen bond donors",
        "NumHAcceptors" => "Number of hydrogen bond acceptors",
        "TPSA" => "Topological polar surface area (N and O contributions)",
        "NumRotatableBonds" => "Number of rotatable bonds (strict definition)",
        "NumAromaticRings" | "AromaticRings" => "Number of aromatic rings",
        "NumSaturatedRings" | "SaturatedRings" => "Number of saturated rings",
        "FractionCsp3" => "Fraction of sp3 hybridized carbons",
        "HeavyAtomCount" => "Number of non-hydrogen atoms",
        "RingCount" => "Number of rings in the smallest set of smallest rings",
        "AliphaticRings" => "Number of rings with at least one non-aromatic bond",
        "NumRadicalElectrons" => "Number of radical electrons",
        "NumValenceElectrons" => "Number of valence electrons",
        "MaxPartialCharge" => "Largest Gasteiger partial charge",
        "MinPartialCharge" => "Smallest Gasteiger partial charge",
        "MaxEStateIndex" => "Largest electrotopological state index",
        "MinEStateIndex" => "Smallest electrotopological state index",
        "MaxAbsEStateIndex" => "Largest absolute E-state index",
        "MinAbsEStateIndex" => "Smallest absolute E-state index",
        "qed" => "Quantitative estimate of drug-likeness",
        "MolMR" => "Wildman-Crippen molar refractivity",
        "LabuteASA" => "Labute approximate surface area",
        _ => "",
    }
}

fn describe_3d(name: &str) -> String {
    match name {
        "PMI1" | "PMI2" | "PMI3" => format!("Principal moment of inertia {}", &name[3..]),
        "PMI1_norm" | "PMI2_norm" | "PMI3_norm" => {
            format!("Principal moment of inertia {} divided by the sum of moments", &name[3..4])
        }
        "PlaneOfBestFit" => "Mean atomic distance from the best-fit plane".into(),
        n if n.starts_with("WHIM") => {
            let what = ["λ1", "λ2", "λ3", "T (size)", "A", "K (anisotropy)", "V"];
            let i: usize = n[4..].parse().unwrap_or(1);
            format!("Mass-weighted WHIM {}", what.get(i.saturating_sub(1)).copied().unwrap_or(""))
        }
        n if n.starts_with("GETAWAY") => {
            let what = ["ITH", "ISH", "HGM", "HATS0", "RARS"];
            let i: usize = n[7..].parse().unwrap_or(1);
            format!("GETAWAY {}", what.get(i.saturating_sub(1)).copied().unwrap_or(""))
        }
        n if n.starts_with("3DMoRSE") => {
            let i: usize = n[7..].parse().unwrap_or(1);
            format!("Unweighted 3D-MoRSE signal at s = {} 1/Å", i.saturating_sub(1))
        }
        _ => String::new(),
    }
}

fn describe_fingerprint(name: &str) -> &'static str {
    match name {
        "Morgan_FP" => "Set bits of the Morgan circular fingerprint (radius 2)",
        "Morgan2_FP" => "Set bits of the Morgan circular fingerprint (radius 3)",
        "Morgan3_FP" => "Set bits of the Morgan circular fingerprint (radius 4)",
        "AtomPair_FP" => "Set bits of the atom-pair fingerprint",
        "Torsion_FP" => "Set bits of the topological-torsion fingerprint",
        "MACCS_FP" => "Set MACCS structural keys",
        "RDKit_FP" => "Set bits of the linear path fingerprint (1-7 bonds)",
        "Pattern_FP" => "Set bits of the SMARTS pattern fingerprint",
        _ => "",
    }
}

/// Catalogue of every group and key the engine can emit.
pub fn descriptor_info() -> Vec<DescriptorGroupInfo> {
    vec![
        DescriptorGroupInfo {
            group: "2D Descriptors",
            descriptors: DESCRIPTORS_2D.iter().map(|n| (n.to_string(), describe_2d(n).to_string())).collect(),
        },
        DescriptorGroupInfo {
            group: "3D Descriptors",
            descriptors: descriptor_names_3d()
                .into_iter()
                .map(|n| {
                    let d = describe_3d(&n);
                    (n, d)
                })
                .collect(),
        },
        DescriptorGroupInfo {
            group: "Fingerprints",
            descriptors: FINGERPRINT_DESCRIPTORS
                .iter()
                .map(|n| (n.to_string(), describe_fingerprint(n).to_string()))
                .collect(),
        },
        DescriptorGroupInfo {
            group: "Fragment Descriptors",
            descriptors: FRAGMENTS.iter().map(|f| (f.name.to_string(), f.description.to_string())).collect(),
        },
        DescriptorGroupInfo {
            group: "E-state VSA Descriptors",
            descriptors: estate_vsa_names()
                .enumerate()
                .map(|(i, n)| (n, format!("Surface area of atoms in E-state bin {}", i + 1)))
                .collect(),
        },
    ]
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Descriptor engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorConfig {
    /// Attempt the 3D group.
    pub include_3d: bool,
    /// Width of the hashed fingerprints before bit counting.
    pub fingerprint_bits: usize,
    /// Embedding settings. `embed.max_atoms` counts hydrogens too; a
    /// molecule over the limit keeps its other groups and loses the 3D
    /// keys with a warning.
    pub embed: EmbedConfig,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        DescriptorConfig { include_3d: true, fingerprint_bits: DEFAULT_FP_BITS, embed: EmbedConfig::default() }
    }
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// The 25 2D descriptors of a hydrogen-suppressed molecule.
pub fn descriptors_2d(mol: &Molecule) -> Vec<(&'static str, f64)> {
    let props = compute_properties(mol);
    let (logp, mr) = crippen_logp_mr(mol);
    let (max_q, min_q) = match gasteiger_charges(mol) {
        Ok(q) if !q.is_empty() => (
            q.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            q.iter().copied().fold(f64::INFINITY, f64::min),
        ),
        Ok(_) => (f64::NAN, f64::NAN),
        Err(e) => {
            debug!(molecule = %mol.name, error = %e, "partial charges unavailable");
            (f64::NAN, f64::NAN)
        }
    };
    let [es_max, es_min, es_max_abs, es_min_abs] = estate_extrema(&estate_indices(mol));
    let rings = props.rings;

    vec![
        ("MolWt", props.molecular_weight),
        ("LogP", logp),
        ("NumHDonors", props.hydrogen_bond_donors as f64),
        ("NumHAcceptors", props.hydrogen_bond_acceptors as f64),
        ("TPSA", tpsa(mol)),
        ("NumRotatableBonds", props.rotatable_bonds as f64),
        ("NumAromaticRings", rings.aromatic as f64),
        ("NumSaturatedRings", rings.saturated as f64),
        ("FractionCsp3", props.fraction_csp3),
        ("HeavyAtomCount", props.heavy_atom_count as f64),
        ("RingCount", rings.total as f64),
        ("AromaticRings", rings.aromatic as f64),
        ("SaturatedRings", rings.saturated as f64),
        ("AliphaticRings", rings.aliphatic as f64),
        ("NumRadicalElectrons", props.radical_electrons as f64),
        ("NumValenceElectrons", props.valence_electrons as f64),
        ("MaxPartialCharge", max_q),
        ("MinPartialCharge", min_q),
        ("MaxEStateIndex", es_max),
        ("MinEStateIndex", es_min),
        ("MaxAbsEStateIndex", es_max_abs),
        ("MinAbsEStateIndex", es_min_abs),
        ("qed", qed(mol).score),
        ("MolMR", mr),
        ("LabuteASA", labute_asa(mol)),
    ]
}

/// The 3D group for a hydrogen-suppressed molecule. Hydrogens are added
/// before embedding. Embedding failure is an error; WHIM, GETAWAY and MoRSE
/// failures only drop their own keys.
pub fn descriptors_3d(mol: &Molecule, config: &EmbedConfig) -> Result<Vec<(String, f64)>> {
    let full = add_hydrogens(mol);
    let embedding = generate_conformer(&full, config)?;
    let conf = &embedding.conformer;
    debug!(molecule = %mol.name, force_field = ?embedding.force_field, "conformer ready");

    let mut out = Vec::with_capacity(24);
    let pm = principal_moments(conf);
    for (i, v) in pm.pmi.iter().enumerate() {
        out.push((format!("PMI{}", i + 1), *v));
    }
    if let Some(norm) = pm.normalized {
        for (i, v) in norm.iter().enumerate() {
            out.push((format!("PMI{}_norm", i + 1), *v));
        }
    }
    out.push(("PlaneOfBestFit".to_string(), plane_of_best_fit(conf)));

    let masses: Vec<f64> = full.atoms.iter().map(|a| atomic_weight(a.atomic_number).max(1.0)).collect();
    push_group(&mut out, "WHIM", whim(conf, &masses), &mol.name);
    push_group(&mut out, "GETAWAY", getaway(conf), &mol.name);
    push_group(&mut out, "3DMoRSE", morse(conf), &mol.name);
    Ok(out)
}

fn push_group<const N: usize>(out: &mut Vec<(String, f64)>, prefix: &str, values: Result<[f64; N]>, name: &str) {
    match values {
        Ok(values) if values.iter().all(|v| v.is_finite()) => {
            out.extend(values.iter().enumerate().map(|(i, v)| (format!("{prefix}{}", i + 1), *v)));
        }
        Ok(_) => warn!(molecule = %name, group = prefix, "non-finite values, group omitted"),
        Err(e) => warn!(molecule = %name, group = prefix, error = %e, "group omitted"),
    }
}

/// Set-bit counts of the eight fingerprints.
pub fn fingerprint_counts(mol: &Molecule, nbits: usize) -> Vec<(&'static str, f64)> {
    let count = |fp: crate::fingerprint::Fingerprint| fp.count_ones() as f64;
    vec![
        ("Morgan_FP", count(morgan_fingerprint(mol, 2, nbits))),
        ("AtomPair_FP", count(atom_pair_fingerprint(mol, nbits))),
        ("Torsion_FP", count(torsion_fingerprint(mol, nbits))),
        ("MACCS_FP", count(maccs_fingerprint(mol))),
        ("RDKit_FP", count(path_fingerprint(mol, 1, 7, nbits))),
        ("Pattern_FP", count(pattern_fingerprint(mol, nbits))),
        ("Morgan2_FP", count(morgan_fingerprint(mol, 3, nbits))),
        ("Morgan3_FP", count(morgan_fingerprint(mol, 4, nbits))),
    ]
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Descriptor engine with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct DescriptorCalculator {
    config: DescriptorConfig,
}

impl DescriptorCalculator {
    pub fn new(config: DescriptorConfig) -> Self {
        DescriptorCalculator { config }
    }

    pub fn config(&self) -> &DescriptorConfig {
        &self.config
    }

    /// Compute the descriptor table for one SMILES string.
    ///
    /// Malformed SMILES yields `QsarError::Parse`; any other failure is
    /// reported as `QsarError::Descriptor` carrying the cause.
    pub fn calculate(&self, smiles: &str) -> Result<DescriptorTable> {
        self.calculate_inner(smiles).map_err(QsarError::descriptor)
    }

    fn calculate_inner(&self, smiles: &str) -> Result<DescriptorTable> {
        let parsed = parse_smiles(smiles)?;
        if parsed.atom_count() == 0 {
            return Err(QsarError::InvalidInput("SMILES contains no atoms".into()));
        }
        let mol = remove_hydrogens(&parsed);

        let mut table = DescriptorTable::new();
        table.extend(descriptors_2d(&mol));

        if self.config.include_3d {
            match descriptors_3d(&mol, &self.config.embed) {
                Ok(values) => table.extend(values),
                Err(e) => warn!(smiles, error = %e, "3D descriptors omitted"),
            }
        }

        table.extend(fingerprint_counts(&mol, self.config.fingerprint_bits));
        table.extend(fragment_counts(&mol, FRAGMENTS));
        table.extend(estate_vsa_names().zip(estate_vsa(&mol)));
        Ok(table)
    }

    /// Compute tables for many structures; each entry succeeds or fails on
    /// its own.
    pub fn calculate_batch(&self, smiles: &[&str]) -> Vec<Result<DescriptorTable>> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            smiles.par_iter().map(|s| self.calculate(s)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            smiles.iter().map(|s| self.calculate(s)).collect()
        }
    }
}

/// Compute descriptors for one SMILES string with the default configuration.
///
/// # Example
///
/// ```
/// use qsarkit_chem::calculate_descriptors;
///
/// let table = calculate_descriptors("CCO", false).unwrap();
/// assert!(table.contains_key("MolWt"));
/// assert!(!table.contains_key("PMI1"));
/// assert_eq!(table.get("HeavyAtomCount"), Some(3.0));
/// ```
pub fn calculate_descriptors(smiles: &str, include_3d: bool) -> Result<DescriptorTable> {
    DescriptorCalculator::new(DescriptorConfig { include_3d, ..DescriptorConfig::default() }).calculate(smiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASPIRIN: &str = "CC(=O)Oc1ccccc1C(=O)O";

    #[test]
    fn full_table_has_every_group() {
        let table = calculate_descriptors(ASPIRIN, true).unwrap();
        for name in DESCRIPTORS_2D {
            assert!(table.contains_key(name), "missing {name}");
        }
        for name in FINGERPRINT_DESCRIPTORS {
            assert!(table.contains_key(name), "missing {name}");
        }
        assert_eq!(table.names().filter(|n| n.starts_with("fr_")).count(), 38);
        assert_eq!(table.names().filter(|n| n.starts_with("EState_VSA")).count(), 11);
        let n3d = descriptor_names_3d().iter().filter(|n| table.contains_key(n)).count();
        assert_eq!(n3d, 24);
        assert_eq!(table.len(), 25 + 24 + 8 + 38 + 11);
    }

    #[test]
    fn names_follow_the_scheme() {
        let table = calculate_descriptors(ASPIRIN, true).unwrap();
        let expected = descriptor_names(true);
        let got: Vec<&str> = table.names().collect();
        assert_eq!(got, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(descriptor_names(false).len(), 25 + 8 + 38 + 11);
    }

    #[test]
    fn pmi_invariants_hold() {
        for smi in [ASPIRIN, "CCO", "c1ccccc1", "CC(C)(C)C"] {
            let t = calculate_descriptors(smi, true).unwrap();
            let (p1, p2, p3) = (t.get("PMI1").unwrap(), t.get("PMI2").unwrap(), t.get("PMI3").unwrap());
            assert!(p1 >= p2 && p2 >= p3, "{smi}");
            let sum: f64 = ["PMI1_norm", "PMI2_norm", "PMI3_norm"].iter().map(|k| t.get(k).unwrap()).sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(t.get("PlaneOfBestFit").unwrap() >= 0.0);
        }
    }

    #[test]
    fn without_3d_no_3d_keys() {
        let table = calculate_descriptors(ASPIRIN, false).unwrap();
        for name in descriptor_names_3d() {
            assert!(!table.contains_key(&name));
        }
    }

    #[test]
    fn embedding_failure_omits_3d_group_only() {
        let config = DescriptorConfig {
            embed: EmbedConfig { max_atoms: 5, ..EmbedConfig::default() },
            ..DescriptorConfig::default()
        };
        let table = DescriptorCalculator::new(config).calculate(ASPIRIN).unwrap();
        assert!(descriptor_names_3d().iter().all(|n| !table.contains_key(n)));
        assert_eq!(table.len(), 25 + 8 + 38 + 11);
    }

    #[test]
    fn atom_limit_counts_added_hydrogens() {
        let config = DescriptorConfig {
            embed: EmbedConfig { max_atoms: 10, ..EmbedConfig::default() },
            ..DescriptorConfig::default()
        };
        let calc = DescriptorCalculator::new(config);
        // Four heavy atoms, fourteen with hydrogens.
        let butane = calc.calculate("CCCC").unwrap();
        assert!(!butane.contains_key("PMI1"));
        // Two heavy atoms, eight with hydrogens.
        let ethane = calc.calculate("CC").unwrap();
        assert!(ethane.contains_key("PMI1"));
    }

    #[test]
    fn failed_subgroups_drop_only_their_own_keys() {
        let mut out = vec![("PMI1".to_string(), 3.0), ("PlaneOfBestFit".to_string(), 0.5)];
        let whim: Result<[f64; 7]> = Err(QsarError::Other("degenerate conformer".into()));
        push_group(&mut out, "WHIM", whim, "m");
        push_group(&mut out, "GETAWAY", Ok([1.0, f64::NAN, 2.0, 3.0, 4.0]), "m");
        push_group(&mut out, "3DMoRSE", Ok([0.1, 0.2, 0.3, 0.4, 0.5]), "m");

        let names: Vec<&str> = out.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["PMI1", "PlaneOfBestFit", "3DMoRSE1", "3DMoRSE2", "3DMoRSE3", "3DMoRSE4", "3DMoRSE5"]);
        assert_eq!(out[0].1, 3.0);
        assert_eq!(out[6].1, 0.5);
    }

    #[test]
    fn invalid_smiles_is_a_parse_error() {
        assert!(matches!(calculate_descriptors("C1CC(", false), Err(QsarError::Parse(_))));
        assert!(calculate_descriptors("not a molecule", true).is_err());
    }

    #[test]
    fn two_d_values_are_deterministic_and_plausible() {
        let a = calculate_descriptors(ASPIRIN, false).unwrap();
        let b = calculate_descriptors(ASPIRIN, false).unwrap();
        assert_eq!(a, b);
        assert!((a.get("MolWt").unwrap() - 180.16).abs() < 0.05);
        assert_eq!(a.get("HeavyAtomCount"), Some(13.0));
        assert_eq!(a.get("NumAromaticRings"), Some(1.0));
        assert_eq!(a.get("NumRotatableBonds"), Some(2.0));
        assert!((a.get("TPSA").unwrap() - 63.6).abs() < 0.1);
    }

    #[test]
    fn three_d_is_deterministic() {
        let a = calculate_descriptors("CCN", true).unwrap();
        let b = calculate_descriptors("CCN", true).unwrap();
        assert_eq!(a.get("PMI1"), b.get("PMI1"));
        assert_eq!(a.get("WHIM1"), b.get("WHIM1"));
    }

    #[test]
    fn explicit_hydrogens_fold_into_parents() {
        let implicit = calculate_descriptors("CO", false).unwrap();
        let explicit = calculate_descriptors("[H]C([H])([H])O[H]", false).unwrap();
        assert_eq!(implicit.get("HeavyAtomCount"), explicit.get("HeavyAtomCount"));
        assert_eq!(implicit.get("MolWt"), explicit.get("MolWt"));
    }

    #[test]
    fn batch_keeps_order_and_isolates_failures() {
        let calc = DescriptorCalculator::new(DescriptorConfig { include_3d: false, ..DescriptorConfig::default() });
        let results = calc.calculate_batch(&["CCO", "C1CC(", "c1ccccc1"]);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok() && results[1].is_err() && results[2].is_ok());
        assert_eq!(results[2].as_ref().unwrap().get("HeavyAtomCount"), Some(6.0));
    }

    #[test]
    fn info_covers_every_name() {
        let info = descriptor_info();
        let described: Vec<&str> = info.iter().flat_map(|g| g.descriptors.iter().map(|(n, _)| n.as_str())).collect();
        for name in descriptor_names(true) {
            assert!(described.contains(&name.as_str()), "{name} undocumented");
        }
        assert!(info.iter().flat_map(|g| &g.descriptors).all(|(_, d)| !d.is_empty()));
    }
}
