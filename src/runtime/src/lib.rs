//! Layercheck runtime - container image layer extraction and package
//! provenance reconciliation.
//!
//! The extractor materializes a selected subset of an image's filesystem
//! (platform markers, package databases, license files) into a local
//! directory. The reconciler re-walks the same layers and checks that
//! package-owned files were only changed by the package manager.

#![allow(clippy::result_large_err)]

pub mod extract;
pub mod oci;
pub mod platform;
pub mod provenance;
pub mod rpm;

// Re-export common types
pub use extract::{extract, ExtractReport, LayerExtractor};
pub use oci::{FileLayer, Layer, MemoryLayer, OciImage, OciImageConfig};
pub use platform::OsRelease;
pub use provenance::reconcile;
pub use rpm::{PackageKey, PackageRecord, RpmDatabase};

/// Layercheck runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
