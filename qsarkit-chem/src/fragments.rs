//! `fr_` fragment-count registry.
//!
//! Every entry is a SMARTS query; the descriptor value is the number of
//! unique atom sets it matches. A query that fails to compile evaluates to
//! zero for that name only.

use std::sync::OnceLock;

use tracing::debug;

use crate::molecule::Molecule;
use crate::smarts::{parse_smarts, SmartsPattern, SmartsTarget};

/// A named fragment query.
#[derive(Debug, Clone, Copy)]
pub struct FragmentDef {
    pub name: &'static str,
    pub smarts: &'static str,
    pub description: &'static str,
}

const fn frag(name: &'static str, smarts: &'static str, description: &'static str) -> FragmentDef {
    FragmentDef { name, smarts, description }
}

/// The registry, in output order.
pub const FRAGMENTS: &[FragmentDef] = &[
    frag("fr_Al_COO", "C-C(=O)[O;H1,-1]", "Aliphatic carboxylic acids"),
    frag("fr_Al_OH", "[C;!$(C=O)]-[OH1]", "Aliphatic hydroxyl groups"),
    frag("fr_Ar_COO", "c-C(=O)[O;H1,-1]", "Aromatic carboxylic acids"),
    frag("fr_Ar_OH", "c-[OH1]", "Aromatic hydroxyl groups"),
    frag("fr_benzene", "c1ccccc1", "Benzene rings"),
    frag("fr_ether", "[OD2]([#6])[#6]", "Ether oxygens (including phenoxy)"),
    frag("fr_ester", "[#6][CX3](=O)[OX2H0][#6]", "Esters"),
    frag("fr_halogen", "[#9,#17,#35,#53]", "Halogens"),
    frag("fr_ketone", "[#6][CX3](=O)[#6]", "Ketones"),
    frag("fr_lactone", "[C;R](=O)[O;R][#6;R]", "Cyclic esters (lactones)"),
    frag("fr_methoxy", "[OX2](-[#6])-[CH3]", "Methoxy groups"),
    frag("fr_morpholine", "O1CCNCC1", "Morpholine rings"),
    frag("fr_nitro", "[$([NX3](=O)=O),$([NX3+](=O)[O-])]", "Nitro groups"),
    frag("fr_nitro_arom", "[$([NX3](=O)=O),$([NX3+](=O)[O-])]-c", "Nitro groups on aromatic carbon"),
    frag("fr_nitroso", "[N&D2](=O)[#6]", "Nitroso groups"),
    frag("fr_oxazole", "o1cncc1", "Oxazole rings"),
    frag("fr_oxime", "[CX3]=[NX2]-[OX2]", "Oximes"),
    frag(
        "fr_para_hydroxylation",
        "[cH]1[cH]cc(-[#8,#7])c[cH]1",
        "Para-hydroxylation sites on activated benzenes",
    ),
    frag("fr_phenol", "[OX2H]-c1ccccc1", "Phenols"),
    frag(
        "fr_phenol_noOrthoHbond",
        "[OX2H;!$(O-c:c-[#7,#8])]-c1ccccc1",
        "Phenols without an ortho hydrogen-bond partner",
    ),
    frag("fr_phos_acid", "P(=O)([OX2H,OX1-])[OX2H,OX1-]", "Phosphoric acid groups"),
    frag("fr_phos_ester", "P(=O)(~O)O[#6]", "Phosphoric esters"),
    frag("fr_piperdine", "N1CCCCC1", "Piperidine rings"),
    frag("fr_piperzine", "N1CCNCC1", "Piperazine rings"),
    frag("fr_priamide", "C(=O)-[NH2]", "Primary amides"),
    frag("fr_prisulfonamd", "[NH2]-S(=O)=O", "Primary sulfonamides"),
    frag("fr_pyridine", "n1ccccc1", "Pyridine rings"),
    frag("fr_quatN", "[NX4+]", "Quaternary nitrogens"),
    frag("fr_sulfide", "[SX2H0]([#6])[#6]", "Thioethers"),
    frag("fr_sulfonamd", "N-S(=O)(=O)", "Sulfonamides"),
    frag("fr_sulfone", "[SX4](=O)(=O)([#6])[#6]", "Sulfones"),
    frag("fr_term_acetylene", "C#[CH1]", "Terminal acetylenes"),
    frag("fr_tetrazole", "[#6]1:[#7]:[#7]:[#7]:[#7]:1", "Tetrazole rings"),
    frag("fr_thiazole", "c1cscn1", "Thiazole rings"),
    frag("fr_thiocyan", "C(#N)S", "Thiocyanates"),
    frag("fr_thiophene", "c1ccsc1", "Thiophene rings"),
    frag("fr_unbrch_alkane", "[R0;D2][R0;D2][R0;D2][R0;D2]", "Unbranched alkane chains of at least four members"),
    frag("fr_urea", "[#7]C(=O)[#7]", "Urea groups"),
];

fn compile(def: &FragmentDef) -> Option<SmartsPattern> {
    match parse_smarts(def.smarts) {
        Ok(p) => Some(p),
        Err(e) => {
            debug!(fragment = def.name, error = %e, "fragment pattern rejected");
            None
        }
    }
}

fn compiled() -> &'static [Option<SmartsPattern>] {
    static PATTERNS: OnceLock<Vec<Option<SmartsPattern>>> = OnceLock::new();
    PATTERNS.get_or_init(|| FRAGMENTS.iter().map(compile).collect())
}

/// Names of every fragment descriptor, in output order.
pub fn fragment_names() -> impl Iterator<Item = &'static str> {
    FRAGMENTS.iter().map(|f| f.name)
}

/// Count each fragment in `defs`, one entry per definition in order.
///
/// Queries from [`FRAGMENTS`] reuse the compiled registry; any other query
/// is compiled on the spot. A query that fails to compile counts as 0.0.
pub fn fragment_counts(mol: &Molecule, defs: &[FragmentDef]) -> Vec<(&'static str, f64)> {
    let target = SmartsTarget::new(mol);
    defs.iter()
        .map(|def| {
            let count = match FRAGMENTS.iter().position(|f| f.smarts == def.smarts) {
                Some(i) => compiled()[i].as_ref().map_or(0, |p| target.count_unique(p)),
                None => compile(def).map_or(0, |p| target.count_unique(&p)),
            };
            (def.name, count as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;
    use std::collections::HashSet;

    fn counts(smi: &str) -> std::collections::HashMap<&'static str, f64> {
        fragment_counts(&parse_smiles(smi).unwrap(), FRAGMENTS).into_iter().collect()
    }

    #[test]
    fn registry_has_38_unique_names() {
        assert_eq!(FRAGMENTS.len(), 38);
        let names: HashSet<_> = fragment_names().collect();
        assert_eq!(names.len(), 38);
        assert!(names.iter().all(|n| n.starts_with("fr_")));
    }

    #[test]
    fn every_pattern_compiles() {
        for (def, p) in FRAGMENTS.iter().zip(compiled()) {
            assert!(p.is_some(), "{} failed to compile", def.name);
        }
    }

    #[test]
    fn aspirin_fragments() {
        let c = counts("CC(=O)Oc1ccccc1C(=O)O");
        assert_eq!(c["fr_benzene"], 1.0);
        assert_eq!(c["fr_ester"], 1.0);
        assert_eq!(c["fr_Ar_COO"], 1.0);
        assert_eq!(c["fr_Al_COO"], 0.0);
        assert_eq!(c["fr_halogen"], 0.0);
        assert_eq!(c["fr_ketone"], 0.0);
    }

    #[test]
    fn simple_groups() {
        let c = counts("ClCCBr");
        assert_eq!(c["fr_halogen"], 2.0);
        assert_eq!(counts("CCO")["fr_Al_OH"], 1.0);
        assert_eq!(counts("Oc1ccccc1")["fr_phenol"], 1.0);
        assert_eq!(counts("CC(=O)C")["fr_ketone"], 1.0);
        assert_eq!(counts("C1CCNCC1")["fr_piperdine"], 1.0);
        assert_eq!(counts("c1ccncc1")["fr_pyridine"], 1.0);
        assert_eq!(counts("CC#C")["fr_term_acetylene"], 1.0);
        assert_eq!(counts("C[N+](C)(C)C")["fr_quatN"], 1.0);
    }

    #[test]
    fn every_name_always_present() {
        for smi in ["[Na+].[Cl-]", "C", "c1ccccc1"] {
            let result = fragment_counts(&parse_smiles(smi).unwrap(), FRAGMENTS);
            assert_eq!(result.len(), 38);
            assert!(result.iter().all(|(_, v)| v.is_finite() && *v >= 0.0));
        }
    }

    #[test]
    fn bad_query_counts_zero_and_spares_the_rest() {
        let defs = [
            frag("fr_Al_OH", "[C;!$(C=O)]-[OH1]", "Aliphatic hydroxyl groups"),
            frag("fr_broken", "C(C", "Unclosed branch"),
            frag("fr_methyl", "[CH3]", "Methyl groups"),
            frag("fr_benzene", "c1ccccc1", "Benzene rings"),
        ];
        let mol = parse_smiles("CC(C)Cc1ccccc1CO").unwrap();
        let result = fragment_counts(&mol, &defs);
        let names: Vec<_> = result.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["fr_Al_OH", "fr_broken", "fr_methyl", "fr_benzene"]);
        assert_eq!(result[0].1, 1.0);
        assert_eq!(result[1].1, 0.0);
        assert_eq!(result[2].1, 2.0);
        assert_eq!(result[3].1, 1.0);
    }
}
