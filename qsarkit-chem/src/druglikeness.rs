//! QED (Quantitative Estimate of Drug-likeness, Bickerton et al. 2012).
//!
//! Eight properties are mapped through asymmetric double-sigmoid
//! desirability functions and combined as a weighted geometric mean.

use qsarkit_core::Summarizable;

use crate::descriptors::{crippen_logp_mr, tpsa};
use crate::molecule::Molecule;
use crate::properties::{compute_properties, molecular_weight};
use crate::smarts::{parse_smarts, SmartsTarget};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// QED score with the property values that produced it.
#[derive(Debug, Clone)]
pub struct QedResult {
    pub score: f64,
    pub properties: Vec<(String, f64)>,
}

impl Summarizable for QedResult {
    fn summary(&self) -> String {
        let parts: Vec<String> = self.properties.iter().map(|(k, v)| format!("{k}={v:.2}")).collect();
        format!("QED={:.3} ({})", self.score, parts.join(" "))
    }
}

/// Parameters of the asymmetric double sigmoid.
struct Ads {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    dmax: f64,
}

impl Ads {
    fn eval(&self, x: f64) -> f64 {
        let rise = 1.0 + (-(x - self.c + self.d / 2.0) / self.e).exp();
        let fall = 1.0 + (-(x - self.c - self.d / 2.0) / self.f).exp();
        (self.a + self.b / rise * (1.0 - 1.0 / fall)) / self.dmax
    }
}

const PROPERTY_NAMES: [&str; 8] = ["MW", "ALOGP", "HBA", "HBD", "PSA", "ROTB", "AROM", "ALERTS"];

/// Mean weights from Bickerton 2012.
const QED_WEIGHTS: [f64; 8] = [0.66, 0.46, 0.05, 0.61, 0.06, 0.65, 0.48, 0.95];

const ADS_PARAMS: [Ads; 8] = [
    Ads { a: 2.817065973, b: 392.5754953, c: 290.7489764, d: 2.419764353, e: 49.22325677, f: 65.37051707, dmax: 104.9805561 },
    Ads { a: 3.172690585, b: 137.8624751, c: 2.534937431, d: 4.581497897, e: 0.822739154, f: 0.576295591, dmax: 131.3186604 },
    Ads { a: 2.948620388, b: 160.4605972, c: 3.615294657, d: 4.435986202, e: 0.290141953, f: 1.300669958, dmax: 148.7763046 },
    Ads { a: 1.618662227, b: 1010.051101, c: 0.985094388, d: 0.000000001, e: 0.713820843, f: 0.920922555, dmax: 258.1632616 },
    Ads { a: 1.876861559, b: 125.2232657, c: 62.90773554, d: 87.83366614, e: 12.01999824, f: 28.51324732, dmax: 104.5686167 },
    Ads { a: 0.010000000, b: 272.4121427, c: 2.558379970, d: 1.566972154, e: 1.271567166, f: 2.758063707, dmax: 105.4420403 },
    Ads { a: 3.217788970, b: 957.7374108, c: 2.274627939, d: 0.000000001, e: 1.317690384, f: 0.375760881, dmax: 312.3372610 },
    Ads { a: 0.010000000, b: 1199.094025, c: -0.09002883, d: 0.000000001, e: 0.185904477, f: 0.875193782, dmax: 417.7253140 },
];

/// Acceptor atoms as counted by QED.
const QED_ACCEPTORS: [&str; 11] = [
    "[oH0;X2]",
    "[OH1;X2;v2]",
    "[OH0;X2;v2]",
    "[OH0;X1;v2]",
    "[O-;X1]",
    "[SH0;X2;v2]",
    "[SH0;X1;v2]",
    "[S-;X1]",
    "[nH0;X2]",
    "[NH0;X1;v3]",
    "[$([N;+0;X3;v3]);!$(N[C,S]=O)]",
];

/// Unwanted-group alerts; each pattern counts once if present.
const STRUCTURAL_ALERTS: [&str; 30] = [
    "*1[O,S,N]*1",
    "[S,C](=[O,S])[F,Br,Cl,I]",
    "[CX4][Cl,Br,I]",
    "[#6]S(=O)(=O)O[#6]",
    "[$([CH]),$(CC)]#CC(=O)[#6]",
    "[$([CH]),$(CC)]#CC(=O)O[#6]",
    "n[OH]",
    "C=C(C=O)C=O",
    "n1c([F,Cl,Br,I])cccc1",
    "[CH1](=O)",
    "[#8][#8]",
    "[C;!R]=[N;!R]",
    "[N!R]=[N!R]",
    "[#6](=O)[#6](=O)",
    "[#16][#16]",
    "[#7][NH2]",
    "C(=O)N[NH2]",
    "[#6]=S",
    "C1(=[O,N])C=CC(=[O,N])C=C1",
    "C=[C!r]C#N",
    "[N+]#[C-]",
    "N=C=O",
    "N=C=S",
    "[SH]",
    "[N+](=O)[O-]",
    "[OH]c1ccc([OH,NH2,NH])cc1",
    "C(=O)Oc1ccccc1",
    "[CH2]=[CH]C(=O)",
    "[Si][O,Cl]",
    "[P,S](=O)(=O)[F,Cl]",
];

// ---------------------------------------------------------------------------
// QED
// ---------------------------------------------------------------------------

/// Compute QED for a hydrogen-suppressed molecule.
pub fn qed(mol: &Molecule) -> QedResult {
    let target = SmartsTarget::new(mol);
    let props = compute_properties(mol);

    let acceptors: usize = QED_ACCEPTORS
        .iter()
        .filter_map(|s| parse_smarts(s).ok())
        .map(|p| target.find_all(&p).len())
        .sum();
    let alerts = STRUCTURAL_ALERTS
        .iter()
        .filter_map(|s| parse_smarts(s).ok())
        .filter(|p| target.matches(p))
        .count();

    let values = [
        molecular_weight(mol),
        crippen_logp_mr(mol).0,
        acceptors as f64,
        props.hydrogen_bond_donors as f64,
        tpsa(mol),
        props.rotatable_bonds as f64,
        props.rings.aromatic as f64,
        alerts as f64,
    ];

    let mut log_sum = 0.0;
    for (i, &x) in values.iter().enumerate() {
        let d = ADS_PARAMS[i].eval(x).max(1e-6);
        log_sum += QED_WEIGHTS[i] * d.ln();
    }
    let weight_sum: f64 = QED_WEIGHTS.iter().sum();
    let score = (log_sum / weight_sum).exp().clamp(0.0, 1.0);

    let properties = PROPERTY_NAMES
        .iter()
        .zip(values)
        .map(|(name, v)| (name.to_string(), v))
        .collect();
    QedResult { score, properties }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn score(smi: &str) -> f64 {
        qed(&parse_smiles(smi).unwrap()).score
    }

    #[test]
    fn desirability_peaks_near_one() {
        // Each function is normalised so its maximum is about 1.
        for (ads, x) in ADS_PARAMS.iter().zip([300.0, 2.5, 3.0, 1.0, 60.0, 3.0, 2.0, 0.0]) {
            let d = ads.eval(x);
            assert!(d > 0.5 && d < 1.05, "d({x}) = {d}");
        }
    }

    #[test]
    fn aspirin_in_druglike_range() {
        let s = score("CC(=O)Oc1ccccc1C(=O)O");
        assert!(s > 0.3 && s < 0.8, "QED={s}");
    }

    #[test]
    fn greasy_chain_scores_below_drug() {
        let drug = score("CC(C)Cc1ccc(cc1)C(C)C(=O)O");
        let chain = score("CCCCCCCCCCCCCCCCCCCCCCCCCCCCCC");
        assert!(drug > chain, "ibuprofen {drug} vs chain {chain}");
    }

    #[test]
    fn result_lists_all_properties() {
        let result = qed(&parse_smiles("CCO").unwrap());
        assert_eq!(result.properties.len(), 8);
        assert_eq!(result.properties[0].0, "MW");
        assert!(result.summary().starts_with("QED="));
    }

    #[test]
    fn alert_patterns_compile() {
        for s in STRUCTURAL_ALERTS.iter().chain(QED_ACCEPTORS.iter()) {
            assert!(parse_smarts(s).is_ok(), "{s}");
        }
    }
}
