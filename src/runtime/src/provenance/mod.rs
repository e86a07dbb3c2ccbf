//! Package provenance reconciliation.
//!
//! Walks the layers of an image and checks that every package-owned file a
//! layer touches was put there by the package manager. Each layer is scanned
//! once to record what it changes and to read the package database it ships
//! (if any). The rules then compare each layer against the one before it.
//!
//! Findings are results, not errors: a bad image produces a failing
//! [`Verdict`], and only unreadable layers or local I/O failures surface as
//! [`CheckError`](layercheck_core::CheckError).

mod changes;
mod ownership;
mod rules;
mod snapshot;

pub use changes::{ChangeSet, ChangeSetBuilder};
pub use ownership::{Exclusions, PackageIndex};
pub use rules::Rules;
pub use snapshot::{LayerSnapshot, SnapshotBuilder};

use layercheck_core::error::{CheckError, Result};
use layercheck_core::{DistTag, ProvenanceConfig, Verdict};
use tokio_util::sync::CancellationToken;

use crate::oci::Layer;

/// Reconcile `layers` against their package databases.
pub fn reconcile<L: Layer>(
    layers: &[L],
    dist_tag: &DistTag,
    config: &ProvenanceConfig,
    cancel: &CancellationToken,
) -> Result<Verdict> {
    let mut builder = SnapshotBuilder::new(config, cancel);
    let mut snapshots = Vec::with_capacity(layers.len());
    for (index, layer) in layers.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(CheckError::Cancelled);
        }
        let snapshot = builder.snapshot(index, layer)?;
        tracing::debug!(
            layer = index,
            digest = layer.digest(),
            changes = snapshot.changes.len(),
            has_database = snapshot.has_database,
            "Prepared layer"
        );
        snapshots.push(snapshot);
    }

    let findings = Rules::new(dist_tag, &config.vendor).evaluate(&snapshots);
    let verdict = Verdict::from_findings(findings);
    tracing::info!(
        layers = layers.len(),
        findings = verdict.findings.len(),
        passed = verdict.passed,
        "Reconciliation complete"
    );
    Ok(verdict)
}
