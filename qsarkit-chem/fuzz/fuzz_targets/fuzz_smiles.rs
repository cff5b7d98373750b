#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if qsarkit_chem::parse_smiles(data).is_ok() {
        let _ = qsarkit_chem::calculate_descriptors(data, false);
    }
});
