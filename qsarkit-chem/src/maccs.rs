//! MACCS 166-key structural fingerprints.
//!
//! Keys are SMARTS queries with a count threshold: a key is set when the
//! number of unique matches exceeds the threshold. Key 125 (more than one
//! aromatic ring) and key 166 (more than one fragment) are computed from the
//! graph directly. Keys 1 and 44 are undefined and never set.

use std::sync::OnceLock;

use tracing::debug;

use crate::fingerprint::Fingerprint;
use crate::molecule::Molecule;
use crate::properties::ring_stats;
use crate::ring::{count_components, RingInfo};
use crate::smarts::{parse_smarts, SmartsPattern, SmartsTarget};

/// Bit width: one bit per key, indexed by key number (bit 0 unused).
pub const MACCS_BITS: usize = 167;

/// (key, SMARTS, threshold)
const MACCS_KEYS: &[(u8, &str, usize)] = &[
    (2, "[#104]", 0),
    (3, "[#32,#33,#34,#50,#51,#52,#82,#83,#84]", 0),
    (4, "[#89,#90,#91,#92,#93,#94,#95,#96,#97,#98,#99,#100,#101,#102,#103]", 0),
    (5, "[Sc,Ti,Y,Zr,#72]", 0),
    (6, "[#57,#58,#59,#60,#61,#62,#63,#64,#65,#66,#67,#68,#69,#70,#71]", 0),
    (7, "[V,Cr,Mn,Nb,Mo,Tc,#73,#74,#75]", 0),
    (8, "[!#6;!#1]1~*~*~*~1", 0),
    (9, "[Fe,Co,Ni,Ru,Rh,Pd,#76,#77,#78]", 0),
    (10, "[Be,Mg,Ca,Sr,#56,#88]", 0),
    (11, "*1~*~*~*~1", 0),
    (12, "[Cu,Zn,Ag,Cd,#79,#80]", 0),
    (13, "[#8]~[#7](~[#6])~[#6]", 0),
    (14, "[#16]-[#16]", 0),
    (15, "[#8]~[#6](~[#8])~[#8]", 0),
    (16, "[!#6;!#1]1~*~*~1", 0),
    (17, "[#6]#[#6]", 0),
    (18, "[#5,#13,#31,#49,#81]", 0),
    (19, "*1~*~*~*~*~*~*~1", 0),
    (20, "[#14]", 0),
    (21, "[#6]=[#6](~[!#6;!#1])~[!#6;!#1]", 0),
    (22, "*1~*~*~1", 0),
    (23, "[#7]~[#6](~[#8])~[#8]", 0),
    (24, "[#7]-[#8]", 0),
    (25, "[#7]~[#6](~[#7])~[#7]", 0),
    (26, "[#6]=;@[#6](@*)@*", 0),
    (27, "[#53]", 0),
    (28, "[!#6;!#1]~[CH2]~[!#6;!#1]", 0),
    (29, "[#15]", 0),
    (30, "[#6]~[!#6;!#1](~[#6])(~[#6])~*", 0),
    (31, "[!#6;!#1]~[F,Cl,Br,I]", 0),
    (32, "[#6]~[#16]~[#7]", 0),
    (33, "[#7]~[#16]", 0),
    (34, "[CH2]=*", 0),
    (35, "[Li,Na,K,Rb,#55,#87]", 0),
    (36, "[#16R]", 0),
    (37, "[#7]~[#6](~[#8])~[#7]", 0),
    (38, "[#7]~[#6](~[#6])~[#7]", 0),
    (39, "[#8]~[#16](~[#8])~[#8]", 0),
    (40, "[#16]-[#8]", 0),
    (41, "[#6]#[#7]", 0),
    (42, "[#9]", 0),
    (43, "[!#6;!#1;!H0]~*~[!#6;!#1;!H0]", 0),
    (45, "[#6]=[#6]~[#7]", 0),
    (46, "[#35]", 0),
    (47, "[#16]~*~[#7]", 0),
    (48, "[#8]~[!#6;!#1](~[#8])(~[#8])", 0),
    (49, "[!+0]", 0),
    (50, "[#6]=[#6](~[#6])~[#6]", 0),
    (51, "[#6]~[#16]~[#8]", 0),
    (52, "[#7]~[#7]", 0),
    (53, "[!#6;!#1;!H0]~*~*~*~[!#6;!#1;!H0]", 0),
    (54, "[!#6;!#1;!H0]~*~*~[!#6;!#1;!H0]", 0),
    (55, "[#8]~[#16]~[#8]", 0),
    (56, "[#8]~[#7](~[#8])~[#6]", 0),
    (57, "[#8R]", 0),
    (58, "[!#6;!#1]~[#16]~[!#6;!#1]", 0),
    (59, "[#16]!:*:*", 0),
    (60, "[#16]=[#8]", 0),
    (61, "*~[#16](~*)~*", 0),
    (62, "*@*!@*@*", 0),
    (63, "[#7]=[#8]", 0),
    (64, "*@*!@[#16]", 0),
    (65, "c:n", 0),
    (66, "[#6]~[#6](~[#6])(~[#6])~*", 0),
    (67, "[!#6;!#1]~[#16]", 0),
    (68, "[!#6;!#1;!H0]~[!#6;!#1;!H0]", 0),
    (69, "[!#6;!#1]~[!#6;!#1;!H0]", 0),
    (70, "[!#6;!#1]~[#7]~[!#6;!#1]", 0),
    (71, "[#7]~[#8]", 0),
    (72, "[#8]~*~*~[#8]", 0),
    (73, "[#16]=*", 0),
    (74, "[CH3]~*~[CH3]", 0),
    (75, "*!@[#7]@*", 0),
    (76, "[#6]=[#6](~*)~*", 0),
    (77, "[#7]~*~[#7]", 0),
    (78, "[#6]=[#7]", 0),
    (79, "[#7]~*~*~[#7]", 0),
    (80, "[#7]~*~*~*~[#7]", 0),
    (81, "[#16]~*(~*)~*", 0),
    (82, "*~[CH2]~[!#6;!#1;!H0]", 0),
    (83, "[!#6;!#1]1~*~*~*~*~1", 0),
    (84, "[NH2]", 0),
    (85, "[#6]~[#7](~[#6])~[#6]", 0),
    (86, "[C;H2,H3][!#6;!#1][C;H2,H3]", 0),
    (87, "[F,Cl,Br,I]!@*@*", 0),
    (88, "[#16]", 0),
    (89, "[#8]~*~*~*~[#8]", 0),
    (
        90,
        "[$([!#6;!#1;!H0]~*~*~[CH2]~*),$([!#6;!#1;!H0;R]1@[R]@[R]@[CH2;R]1),$([!#6;!#1;!H0]~[R]1@[R]@[CH2;R]1)]",
        0,
    ),
    (
        91,
        "[$([!#6;!#1;!H0]~*~*~*~[CH2]~*),$([!#6;!#1;!H0;R]1@[R]@[R]@[R]@[CH2;R]1),$([!#6;!#1;!H0]~[R]1@[R]@[R]@[CH2;R]1),$([!#6;!#1;!H0]~*~[R]1@[R]@[CH2;R]1)]",
        0,
    ),
    (92, "[#8]~[#6](~[#7])~[#6]", 0),
    (93, "[!#6;!#1]~[CH3]", 0),
    (94, "[!#6;!#1]~[#7]", 0),
    (95, "[#7]~*~*~[#8]", 0),
    (96, "*1~*~*~*~*~1", 0),
    (97, "[#7]~*~*~*~[#8]", 0),
    (98, "[!#6;!#1]1~*~*~*~*~*~1", 0),
    (99, "[#6]=[#6]", 0),
    (100, "*~[CH2]~[#7]", 0),
    (
        101,
        "[$([R]@1@[R]@[R]@[R]@[R]@[R]@[R]@[R]1),$([R]@1@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]1),$([R]@1@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]1)]",
        0,
    ),
    (102, "[!#6;!#1]~[#8]", 0),
    (103, "[#17]", 0),
    (104, "[!#6;!#1;!H0]~*~[CH2]~*", 0),
    (105, "*@*(@*)@*", 0),
    (106, "[!#6;!#1]~*(~[!#6;!#1])~[!#6;!#1]", 0),
    (107, "[F,Cl,Br,I]~*(~*)~*", 0),
    (108, "[CH3]~*~*~*~[CH2]~*", 0),
    (109, "*~[CH2]~[#8]", 0),
    (110, "[#7]~[#6]~[#8]", 0),
    (111, "[#7]~*~[CH2]~*", 0),
    (112, "*~*(~*)(~*)~*", 0),
    (113, "[#8]!:*:*", 0),
    (114, "[CH3]~[CH2]~*", 0),
    (115, "[CH3]~*~[CH2]~*", 0),
    (116, "[$([CH3]~*~*~[CH2]~*),$([CH3]~*1~*~[CH2]1)]", 0),
    (117, "[#7]~*~[#8]", 0),
    (118, "[$(*~[CH2]~[CH2]~*),$(*1~[CH2]~[CH2]1)]", 1),
    (119, "[#7]=*", 0),
    (120, "[!#6;R]", 1),
    (121, "[#7;R]", 0),
    (122, "*~[#7](~*)~*", 0),
    (123, "[#8]~[#6]~[#8]", 0),
    (124, "[!#6;!#1]~[!#6;!#1]", 0),
    (126, "*!@[#8]!@*", 0),
    (127, "*@*!@[#8]", 1),
    (
        128,
        "[$(*~[CH2]~*~*~*~[CH2]~*),$([R]1@[CH2;R]@[R]@[R]@[R]@[CH2;R]1),$(*~[CH2]~[R]1@[R]@[R]@[CH2;R]1),$(*~[CH2]~*~[R]1@[R]@[CH2;R]1)]",
        0,
    ),
    (129, "[$(*~[CH2]~*~*~[CH2]~*),$([R]1@[CH2]@[R]@[R]@[CH2;R]1),$(*~[CH2]~[R]1@[R]@[CH2;R]1)]", 0),
    (130, "[!#6;!#1]~[!#6;!#1]", 1),
    (131, "[!#6;!#1;!H0]", 1),
    (132, "[#8]~*~[CH2]~*", 0),
    (133, "*@*!@[#7]", 0),
    (134, "[F,Cl,Br,I]", 0),
    (135, "[#7]!:*:*", 0),
    (136, "[#8]=*", 1),
    (137, "[!C;!c;R]", 0),
    (138, "[!#6;!#1]~[CH2]~*", 1),
    (139, "[O;!H0]", 0),
    (140, "[#8]", 3),
    (141, "[CH3]", 2),
    (142, "[#7]", 1),
    (143, "*@*!@[#8]", 0),
    (144, "*!:*:*!:*", 0),
    (145, "*1~*~*~*~*~*~1", 1),
    (146, "[#8]", 2),
    (147, "[$(*~[CH2]~[CH2]~*),$([R]1@[CH2;R]@[CH2;R]1)]", 0),
    (148, "*~[!#6;!#1](~*)~*", 0),
    (149, "[C;H3,H4]", 1),
    (150, "*!@*@*!@*", 0),
    (151, "[#7;!H0]", 0),
    (152, "[#8]~[#6](~[#6])~[#6]", 0),
    (153, "[!#6;!#1]~[CH2]~*", 0),
    (154, "[#6]=[#8]", 0),
    (155, "*!@[CH2]!@*", 0),
    (156, "[#7]~*(~*)~*", 0),
    (157, "[#6]-[#8]", 0),
    (158, "[#6]-[#7]", 0),
    (159, "[#8]", 1),
    (160, "[C;H3,H4]", 0),
    (161, "[#7]", 0),
    (162, "[a]", 0),
    (163, "*1~*~*~*~*~*~1", 0),
    (164, "[#8]", 0),
    (165, "[R]", 0),
];

struct CompiledKey {
    key: u8,
    pattern: SmartsPattern,
    threshold: usize,
}

fn compiled_keys() -> &'static [CompiledKey] {
    static KEYS: OnceLock<Vec<CompiledKey>> = OnceLock::new();
    KEYS.get_or_init(|| {
        MACCS_KEYS
            .iter()
            .filter_map(|&(key, smarts, threshold)| match parse_smarts(smarts) {
                Ok(pattern) => Some(CompiledKey { key, pattern, threshold }),
                Err(e) => {
                    debug!(key, error = %e, "MACCS key pattern rejected");
                    None
                }
            })
            .collect()
    })
}

/// Compute the MACCS 166-key fingerprint of a hydrogen-suppressed molecule.
///
/// # Example
///
/// ```
/// use qsarkit_chem::{parse_smiles, maccs_fingerprint};
///
/// let aspirin = parse_smiles("CC(=O)Oc1ccccc1C(=O)O").unwrap();
/// let fp = maccs_fingerprint(&aspirin);
/// assert_eq!(fp.nbits(), 167);
/// assert!(fp.count_ones() > 10);
/// ```
pub fn maccs_fingerprint(mol: &Molecule) -> Fingerprint {
    let mut fp = Fingerprint::new(MACCS_BITS);
    if mol.atom_count() == 0 {
        return fp;
    }

    let target = SmartsTarget::new(mol);
    for key in compiled_keys() {
        let hit = if key.threshold == 0 {
            target.matches(&key.pattern)
        } else {
            target.count_unique(&key.pattern) > key.threshold
        };
        if hit {
            fp.set_bit(key.key as usize);
        }
    }

    let rings = RingInfo::new(mol);
    if ring_stats(mol, &rings).aromatic > 1 {
        fp.set_bit(125);
    }
    if count_components(mol) > 1 {
        fp.set_bit(166);
    }
    fp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn keys(smi: &str) -> Fingerprint {
        maccs_fingerprint(&parse_smiles(smi).unwrap())
    }

    #[test]
    fn every_key_pattern_compiles() {
        assert_eq!(compiled_keys().len(), MACCS_KEYS.len());
    }

    #[test]
    fn benzene_keys() {
        let fp = keys("c1ccccc1");
        assert!(fp.get_bit(162), "aromatic");
        assert!(fp.get_bit(163), "six-ring");
        assert!(fp.get_bit(165), "ring atom");
        assert!(!fp.get_bit(164), "no oxygen");
        assert!(!fp.get_bit(125), "single aromatic ring");
    }

    #[test]
    fn oxygen_count_thresholds() {
        let fp = keys("OCCO");
        assert!(fp.get_bit(164));
        assert!(fp.get_bit(159));
        assert!(!fp.get_bit(146));
        let fp = keys("CC(=O)Oc1ccccc1C(=O)O");
        assert!(fp.get_bit(146) && fp.get_bit(140), "aspirin has four oxygens");
        assert!(fp.get_bit(154), "carbonyl");
        assert!(fp.get_bit(139), "OH");
    }

    #[test]
    fn graph_level_keys() {
        assert!(keys("c1ccc2ccccc2c1").get_bit(125));
        assert!(keys("[Na+].[Cl-]").get_bit(166));
        assert!(!keys("CCO").get_bit(166));
        assert!(keys("[Na+].[Cl-]").get_bit(49), "charged atom");
    }

    #[test]
    fn undefined_keys_stay_clear() {
        let fp = keys("CC(=O)Nc1ccc(O)cc1");
        assert!(!fp.get_bit(1));
        assert!(!fp.get_bit(44));
        assert!(!fp.get_bit(0));
    }

    #[test]
    fn halogen_keys() {
        let fp = keys("FC(Cl)(Br)I");
        for key in [42, 46, 27, 103, 134] {
            assert!(fp.get_bit(key), "key {key}");
        }
    }
}
