//! Layercheck Core - Foundational Types
//!
//! Error taxonomy, configuration, and the finding/verdict types shared by
//! the extraction and provenance engines and the CLI.

pub mod config;
pub mod dist;
pub mod error;
pub mod finding;

// Re-export commonly used types
pub use config::{CheckConfig, ExtractConfig, ProvenanceConfig};
pub use dist::DistTag;
pub use error::{CheckError, Result};
pub use finding::{Finding, FindingKind, Verdict};

/// Layercheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
