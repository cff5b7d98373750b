//! Traits shared by molecules, models and reports.

/// Identity derived from serialized content.
///
/// Molecules hash their atom and bond lists; trained models hash the bytes of
/// their saved model file, which is what the metadata checksum records.
pub trait ContentAddressable {
    /// Lowercase hex SHA-256.
    fn content_hash(&self) -> String;
}

/// Something with a stable display name, e.g. a molecule or a model kind.
pub trait Annotated {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }
}

/// One-line human-readable report.
pub trait Summarizable {
    fn summary(&self) -> String;
}
