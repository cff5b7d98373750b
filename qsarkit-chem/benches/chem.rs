use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qsarkit_chem::{
    add_hydrogens, calculate_descriptors, embed_molecule, maccs_fingerprint, parse_smiles, EmbedConfig,
};

/// Drug-like molecules of varied size and functionality
const SMILES_SET: &[&str] = &[
    "CCO",                                 // ethanol
    "CC(=O)Oc1ccccc1C(=O)O",               // aspirin
    "CC12CCC3C(C1CCC2O)CCC4=CC(=O)CCC34C", // testosterone
    "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",        // caffeine
    "CC(C)CC1=CC=C(C=C1)C(C)C(=O)O",       // ibuprofen
    "CC(=O)NC1=CC=C(C=C1)O",               // acetaminophen
    "c1ccc2ccccc2c1",                      // naphthalene
    "c1ccncc1",                            // pyridine
    "C1=CSC=C1",                           // thiophene
    "OC(=O)C1=CC=CC=C1O",                  // salicylic acid
];

fn bench_descriptors_2d(c: &mut Criterion) {
    let mut group = c.benchmark_group("descriptors");
    group.bench_function("2d_10_mols", |b| {
        b.iter(|| {
            for &smi in black_box(SMILES_SET) {
                let _ = calculate_descriptors(smi, false);
            }
        })
    });
    group.sample_size(10);
    group.bench_function("with_3d_aspirin", |b| {
        b.iter(|| calculate_descriptors(black_box("CC(=O)Oc1ccccc1C(=O)O"), true))
    });
    group.finish();
}

fn bench_maccs(c: &mut Criterion) {
    let mols: Vec<_> = SMILES_SET.iter().filter_map(|s| parse_smiles(s).ok()).collect();
    c.bench_function("maccs_10_mols", |b| {
        b.iter(|| {
            for mol in black_box(&mols) {
                let _ = maccs_fingerprint(mol);
            }
        })
    });
}

fn bench_embed(c: &mut Criterion) {
    let mol = add_hydrogens(&parse_smiles("CC(C)CC1=CC=C(C=C1)C(C)C(=O)O").unwrap());
    let config = EmbedConfig { optimize: false, ..EmbedConfig::default() };
    let mut group = c.benchmark_group("embed");
    group.sample_size(10);
    group.bench_function("ibuprofen_no_ff", |b| b.iter(|| embed_molecule(black_box(&mol), &config)));
    group.finish();
}

criterion_group!(benches, bench_descriptors_2d, bench_maccs, bench_embed);
criterion_main!(benches);
