//! Cheminformatics toolkit and descriptor engine for QSAR modeling.
//!
//! Provides molecular graph representation, SMILES/SMARTS parsing, 2D
//! property and electrotopological descriptors, Gasteiger charges, hashed and
//! structural-key fingerprints, distance-geometry embedding with force-field
//! clean-up, 3D shape descriptors, and [`calculate_descriptors`], which turns a
//! SMILES string into a flat [`DescriptorTable`].
//!
//! # Example
//!
//! ```
//! use qsarkit_chem::{calculate_descriptors, parse_smiles, compute_properties};
//!
//! let ethanol = parse_smiles("CCO").unwrap();
//! assert_eq!(ethanol.atom_count(), 3);
//! assert_eq!(compute_properties(&ethanol).formula, "C2H6O");
//!
//! let table = calculate_descriptors("CCO", false).unwrap();
//! assert_eq!(table.names().filter(|n| n.starts_with("fr_")).count(), 38);
//! ```

pub mod aromaticity;
pub mod calculator;
pub mod conformer;
pub mod descriptors;
pub mod druglikeness;
pub mod element;
pub mod embed;
pub mod fingerprint;
pub mod forcefield;
pub mod fragments;
pub mod gasteiger;
pub mod hydrogens;
pub mod linalg;
pub mod maccs;
pub mod molecule;
pub mod properties;
pub mod ring;
pub mod shape;
pub mod smarts;
pub mod smiles;
pub mod spatial;
pub mod surface;
pub mod table;

pub use calculator::{
    calculate_descriptors, descriptor_info, descriptor_names, DescriptorCalculator, DescriptorConfig,
    DescriptorGroupInfo,
};
pub use conformer::Conformer;
pub use element::{element_by_number, element_by_symbol, Element};
pub use embed::{embed_molecule, generate_conformer, EmbedConfig, Embedding, ForceFieldUsed};
pub use fingerprint::{morgan_fingerprint, tanimoto_similarity, Fingerprint};
pub use forcefield::{ForceField, MinimizeConfig, MinimizeMethod};
pub use gasteiger::gasteiger_charges;
pub use hydrogens::{add_hydrogens, remove_hydrogens};
pub use maccs::maccs_fingerprint;
pub use molecule::{Bond, BondOrder, MolAtom, Molecule};
pub use properties::{compute_properties, molecular_formula, molecular_weight, MolecularProperties};
pub use ring::RingInfo;
pub use smarts::{parse_smarts, SmartsPattern, SmartsTarget, SubstructureMatch};
pub use smiles::{parse_smiles, parse_smiles_named};
pub use table::DescriptorTable;
