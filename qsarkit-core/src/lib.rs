//! Shared primitives for the qsarkit crates.
//!
//! - **Error types**: [`QsarError`] and [`Result`] used by every crate
//! - **Traits**: [`Annotated`], [`Summarizable`], [`ContentAddressable`]
//! - **Hashing**: SHA-256 digests for model artifact integrity

pub mod error;
pub mod hash;
pub mod traits;

pub use error::{QsarError, Result};
pub use traits::*;
