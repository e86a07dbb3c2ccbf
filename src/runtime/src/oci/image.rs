//! OCI image layout loading.
//!
//! Resolves an on-disk OCI image layout into its ordered layer blobs.

use layercheck_core::error::{CheckError, Result};
use oci_spec::image::{ImageConfiguration, ImageIndex, ImageManifest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::layers::FileLayer;

/// Represents an OCI image loaded from disk.
#[derive(Debug)]
pub struct OciImage {
    /// Root directory of the OCI image layout
    root_dir: PathBuf,

    /// Platform and labels from the image configuration
    config: OciImageConfig,

    /// Layer blobs (in order, bottom to top)
    layers: Vec<FileLayer>,
}

/// The parts of the image configuration the checks care about.
#[derive(Debug, Clone, Default)]
pub struct OciImageConfig {
    /// CPU architecture (e.g. "amd64")
    pub architecture: String,

    /// Operating system (e.g. "linux")
    pub os: String,

    /// Labels
    pub labels: HashMap<String, String>,
}

impl OciImage {
    /// Load an OCI image from a directory.
    ///
    /// The directory must contain a valid OCI image layout:
    /// - oci-layout file
    /// - index.json
    /// - blobs/<algorithm>/ directory with manifest, config, and layers
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let root_dir = path.as_ref().to_path_buf();

        Self::validate_oci_layout(&root_dir)?;

        let index = Self::load_index(&root_dir)?;

        let manifest_digest = index
            .manifests()
            .first()
            .ok_or_else(|| CheckError::OciImage("No manifests in index.json".to_string()))?
            .digest()
            .to_string();

        let manifest = Self::load_manifest(&root_dir, &manifest_digest)?;

        let config_digest = manifest.config().digest().to_string();
        let config = Self::load_config(&root_dir, &config_digest)?;

        let layers = manifest
            .layers()
            .iter()
            .map(|layer| {
                let digest = layer.digest().to_string();
                FileLayer::new(Self::blob_path(&root_dir, &digest), digest)
            })
            .collect();

        Ok(Self {
            root_dir,
            config,
            layers,
        })
    }

    /// Get the image configuration.
    pub fn config(&self) -> &OciImageConfig {
        &self.config
    }

    /// Get all layers (in order, bottom to top).
    pub fn layers(&self) -> &[FileLayer] {
        &self.layers
    }

    /// Consume the image, keeping only its layers.
    pub fn into_layers(self) -> Vec<FileLayer> {
        self.layers
    }

    /// Get the root directory of the OCI image.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn validate_oci_layout(root_dir: &Path) -> Result<()> {
        for required in ["oci-layout", "index.json", "blobs"] {
            if !root_dir.join(required).exists() {
                return Err(CheckError::OciImage(format!(
                    "Not a valid OCI layout: missing {} in {}",
                    required,
                    root_dir.display()
                )));
            }
        }
        Ok(())
    }

    fn load_index(root_dir: &Path) -> Result<ImageIndex> {
        let index_path = root_dir.join("index.json");
        let content = std::fs::read_to_string(&index_path).map_err(|e| {
            CheckError::OciImage(format!(
                "Failed to read index.json at {}: {}",
                index_path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| CheckError::OciImage(format!("Failed to parse index.json: {}", e)))
    }

    fn load_manifest(root_dir: &Path, digest: &str) -> Result<ImageManifest> {
        let blob_path = Self::blob_path(root_dir, digest);
        let content = std::fs::read_to_string(&blob_path).map_err(|e| {
            CheckError::OciImage(format!(
                "Failed to read manifest at {}: {}",
                blob_path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| CheckError::OciImage(format!("Failed to parse manifest: {}", e)))
    }

    fn load_config(root_dir: &Path, digest: &str) -> Result<OciImageConfig> {
        let blob_path = Self::blob_path(root_dir, digest);
        let content = std::fs::read_to_string(&blob_path).map_err(|e| {
            CheckError::OciImage(format!(
                "Failed to read config at {}: {}",
                blob_path.display(),
                e
            ))
        })?;

        let oci_config: ImageConfiguration = serde_json::from_str(&content)
            .map_err(|e| CheckError::OciImage(format!("Failed to parse config: {}", e)))?;

        Ok(OciImageConfig::from_oci_config(&oci_config))
    }

    /// Get the path to a blob by digest ("sha256:abc..." or a bare hash).
    fn blob_path(root_dir: &Path, digest: &str) -> PathBuf {
        let (algorithm, hash) = digest.split_once(':').unwrap_or(("sha256", digest));
        root_dir.join("blobs").join(algorithm).join(hash)
    }
}

impl OciImageConfig {
    fn from_oci_config(oci_config: &ImageConfiguration) -> Self {
        let labels = oci_config
            .config()
            .as_ref()
            .and_then(|c| c.labels().clone())
            .unwrap_or_default();

        Self {
            architecture: oci_config.architecture().to_string(),
            os: oci_config.os().to_string(),
            labels,
        }
    }
}
