//! Per-layer preparation: change set plus package index.

use std::fs::File;
use std::io::{self, Read};
use std::sync::Arc;

use layercheck_core::error::{CheckError, Result};
use layercheck_core::ProvenanceConfig;
use tar::{Archive, Entry, EntryType};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::changes::{ChangeSet, ChangeSetBuilder};
use super::ownership::{Exclusions, PackageIndex};
use crate::extract::confine::{resolve_dir, Resolved};
use crate::extract::paths;
use crate::oci::{stream_error, CancellableReader, Layer};
use crate::rpm;

/// What one layer contributes to reconciliation.
#[derive(Debug)]
pub struct LayerSnapshot {
    pub changes: ChangeSet,
    pub index: Arc<PackageIndex>,
    /// Whether this layer ships its own package database.
    pub has_database: bool,
}

/// Builds snapshots layer by layer, carrying the package index forward.
pub struct SnapshotBuilder<'a> {
    config: &'a ProvenanceConfig,
    exclusions: Exclusions,
    db_dirs: Vec<String>,
    previous: Arc<PackageIndex>,
    cancel: &'a CancellationToken,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(config: &'a ProvenanceConfig, cancel: &'a CancellationToken) -> Self {
        let db_dirs = config
            .db_locations
            .iter()
            .filter_map(|p| paths::normalize(p))
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            config,
            exclusions: Exclusions::from_config(config),
            db_dirs,
            previous: Arc::new(PackageIndex::default()),
            cancel,
        }
    }

    /// Scan layer `index`. Without a database of its own, the layer
    /// inherits the index of the layer before it.
    pub fn snapshot<L: Layer>(&mut self, index: usize, layer: &L) -> Result<LayerSnapshot> {
        let staging = TempDir::new()?;
        let changes = self.scan(index, layer, &staging)?;

        let (index_for_layer, has_database) =
            match rpm::find_packages(staging.path(), &self.config.db_locations) {
                Some(packages) => {
                    tracing::debug!(
                        layer = index,
                        packages = packages.len(),
                        "Layer carries a package database"
                    );
                    (Arc::new(PackageIndex::build(packages, &self.exclusions)), true)
                }
                None => (Arc::clone(&self.previous), false),
            };

        self.previous = Arc::clone(&index_for_layer);
        Ok(LayerSnapshot {
            changes,
            index: index_for_layer,
            has_database,
        })
    }

    fn scan<L: Layer>(&self, index: usize, layer: &L, staging: &TempDir) -> Result<ChangeSet> {
        let reader = layer.open().map_err(|e| stream_error(self.cancel, index, e))?;
        let mut archive = Archive::new(CancellableReader::new(reader, self.cancel));
        let mut builder = ChangeSetBuilder::new();

        {
            let entries = archive
                .entries()
                .map_err(|e| stream_error(self.cancel, index, e))?;
            for entry in entries {
                if self.cancel.is_cancelled() {
                    return Err(CheckError::Cancelled);
                }
                let mut entry = entry.map_err(|e| stream_error(self.cancel, index, e))?;
                self.handle_entry(index, &mut entry, &mut builder, staging)?;
            }
        }

        let mut inner = archive.into_inner();
        io::copy(&mut inner, &mut io::sink()).map_err(|e| stream_error(self.cancel, index, e))?;
        Ok(builder.finish())
    }

    fn handle_entry<R: Read>(
        &self,
        layer: usize,
        entry: &mut Entry<'_, R>,
        builder: &mut ChangeSetBuilder,
        staging: &TempDir,
    ) -> Result<()> {
        let raw = entry
            .path()
            .map_err(|e| CheckError::layer_read(layer, e))?
            .to_string_lossy()
            .into_owned();
        let Some(path) = paths::normalize(&raw) else {
            tracing::warn!(layer, path = %raw, "Ignoring entry outside the image root");
            return Ok(());
        };
        if path.is_empty() {
            return Ok(());
        }

        if paths::is_whiteout(&path) {
            if let Some(deleted) = paths::whiteout_target(&path) {
                builder.record_whiteout(&deleted);
            }
            return Ok(());
        }

        let mode = entry
            .header()
            .mode()
            .map_err(|e| CheckError::layer_read(layer, e))?;
        match entry.header().entry_type() {
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                builder.record(&path, mode);
                if self.db_dirs.iter().any(|d| paths::is_within(&path, d)) {
                    self.stage(layer, &path, entry, staging)?;
                }
            }
            EntryType::Symlink => builder.record(&path, mode),
            EntryType::Link => {
                let target = entry
                    .link_name()
                    .map_err(|e| CheckError::layer_read(layer, e))?
                    .and_then(|t| paths::normalize(&t.to_string_lossy()));
                match target {
                    Some(target) => builder.record_hardlink(&path, mode, &target),
                    None => builder.record(&path, mode),
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Copy a package database file into the staging tree.
    fn stage<R: Read>(
        &self,
        layer: usize,
        path: &str,
        entry: &mut Entry<'_, R>,
        staging: &TempDir,
    ) -> Result<()> {
        let root = staging.path();
        let dir = match resolve_dir(root, paths::parent(path), true)? {
            Resolved::Inside(dir) => dir,
            Resolved::Escapes | Resolved::Missing => return Ok(()),
        };
        let mut file = File::create(dir.join(paths::file_name(path)))?;
        io::copy(entry, &mut file).map_err(|e| stream_error(self.cancel, layer, e))?;
        Ok(())
    }
}
