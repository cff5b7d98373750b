//! Structured error types for descriptor calculation and modeling.

use thiserror::Error;

/// Unified error type for all qsarkit operations.
#[derive(Debug, Error)]
pub enum QsarError {
    /// I/O error (missing artifact, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed SMILES/SMARTS or serialized data)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, shape mismatches, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unregistered model family / task combination or inconsistent settings
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation requires a trained model
    #[error("model not trained: {0}")]
    NotTrained(String),

    /// The selected model or task lacks the requested capability
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Top-level descriptor calculation failure
    #[error("descriptor calculation failed: {source}")]
    Descriptor {
        #[source]
        source: Box<QsarError>,
    },

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl QsarError {
    /// Wrap an error as a descriptor-calculation failure.
    ///
    /// Parse and invalid-input errors keep their own variant so callers can
    /// tell malformed structures apart from internal failures.
    pub fn descriptor(source: QsarError) -> Self {
        match source {
            e @ (QsarError::Parse(_) | QsarError::InvalidInput(_) | QsarError::Descriptor { .. }) => e,
            other => QsarError::Descriptor {
                source: Box::new(other),
            },
        }
    }
}

/// Convenience alias used throughout qsarkit.
pub type Result<T> = std::result::Result<T, QsarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_wraps_internal_errors() {
        let err = QsarError::descriptor(QsarError::Other("boom".into()));
        assert!(matches!(err, QsarError::Descriptor { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn descriptor_keeps_parse_errors() {
        let err = QsarError::descriptor(QsarError::Parse("bad".into()));
        assert!(matches!(err, QsarError::Parse(_)));
    }

    #[test]
    fn io_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: QsarError = io.into();
        assert!(matches!(err, QsarError::Io(_)));
    }
}
