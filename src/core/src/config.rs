use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CheckError, Result};

/// Top-level check configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Which files to materialize from the image
    pub extract: ExtractConfig,

    /// Package provenance rules
    pub provenance: ProvenanceConfig,
}

impl CheckConfig {
    /// Load a configuration file (YAML).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CheckError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: CheckConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

/// Extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Glob patterns for required paths (leading slash optional)
    pub patterns: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                "/etc/os-release".to_string(),
                "/usr/lib/os-release".to_string(),
                "/licenses/*".to_string(),
                "/usr/lib/sysimage/rpm/*".to_string(),
                "/var/lib/rpm/*".to_string(),
            ],
        }
    }
}

/// Provenance reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceConfig {
    /// Expected package vendor; empty disables the vendor rule
    pub vendor: String,

    /// Distribution tag override (e.g. "el9"); detected from os-release when unset
    pub dist_tag: Option<String>,

    /// Candidate package database roots, relative to the image root, in lookup order
    pub db_locations: Vec<String>,

    /// Directories whose contents are never attributed to packages
    pub excluded_dirs: Vec<String>,

    /// Individual files never attributed to packages
    pub excluded_files: Vec<String>,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            vendor: "Red Hat, Inc.".to_string(),
            dist_tag: None,
            db_locations: vec![
                "usr/lib/sysimage/rpm".to_string(),
                "var/lib/rpm".to_string(),
            ],
            excluded_dirs: [
                "usr/lib/sysimage/rpm",
                "var/lib/rpm",
                "var/cache",
                "var/log",
                "var/tmp",
                "var/run",
                "run",
                "tmp",
                "usr/lib/.build-id",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            excluded_files: [
                "etc/hostname",
                "etc/hosts",
                "etc/machine-id",
                "etc/resolv.conf",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}
