//! Reconciliation rules applied to prepared layer snapshots.

use layercheck_core::{DistTag, Finding, FindingKind};

use super::snapshot::LayerSnapshot;
use crate::rpm::PackageRecord;

const SETID_BITS: u32 = 0o6000;

/// Applies the provenance rules to a sequence of layer snapshots.
pub struct Rules<'a> {
    dist_tag: &'a DistTag,
    vendor: &'a str,
}

impl<'a> Rules<'a> {
    /// An empty `vendor` disables the vendor comparison.
    pub fn new(dist_tag: &'a DistTag, vendor: &'a str) -> Self {
        Self { dist_tag, vendor }
    }

    /// Findings for every layer after the first, in layer then path order.
    pub fn evaluate(&self, snapshots: &[LayerSnapshot]) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (layer, pair) in snapshots.windows(2).enumerate() {
            let layer = layer + 1;
            let (previous, current) = (&pair[0], &pair[1]);
            for (path, mode) in current.changes.iter() {
                self.check_path(snapshots, layer, previous, current, path, mode, &mut findings);
            }
        }
        findings
    }

    #[allow(clippy::too_many_arguments)]
    fn check_path(
        &self,
        snapshots: &[LayerSnapshot],
        layer: usize,
        previous: &LayerSnapshot,
        current: &LayerSnapshot,
        path: &str,
        mode: u32,
        findings: &mut Vec<Finding>,
    ) {
        let Some(owner) = current.index.owner(path) else {
            return;
        };
        let Some(prior) = previous.index.owner(path) else {
            if current.has_database {
                tracing::trace!(layer, path, package = %owner.key(), "New package file");
            }
            return;
        };

        let key = owner.key();
        let prior_key = prior.key();

        if key == prior_key {
            let Some(prior_mode) = last_mode(snapshots, layer, path) else {
                return;
            };
            if is_hardening(prior_mode, mode) {
                return;
            }
            if self.is_third_party(owner, prior) {
                findings.push(Finding::new(
                    FindingKind::Warning,
                    layer,
                    path,
                    format!(
                        "file owned by {} modified outside the package manager; package does not appear to come from the distribution",
                        key
                    ),
                ));
                return;
            }
            if owner.install_time > prior.install_time {
                return;
            }
            findings.push(Finding::new(
                FindingKind::DisallowedModification,
                layer,
                path,
                format!(
                    "file owned by {} modified outside the package manager (mode {:04o} -> {:04o})",
                    key, prior_mode, mode
                ),
            ));
            return;
        }

        if self.dist_tag.matches(&prior_key.release) && !self.dist_tag.matches(&key.release) {
            findings.push(Finding::new(
                FindingKind::DistroMismatch,
                layer,
                path,
                format!(
                    "{} replaced by {}, which is not built for {}",
                    prior_key, key, self.dist_tag
                ),
            ));
        }
        if prior_key.arch != key.arch {
            findings.push(Finding::new(
                FindingKind::ArchMismatch,
                layer,
                path,
                format!(
                    "{} replaced by {} with a different architecture ({} -> {})",
                    prior_key, key, prior_key.arch, key.arch
                ),
            ));
        }
    }

    fn is_third_party(&self, current: &PackageRecord, previous: &PackageRecord) -> bool {
        let off_distro = self.dist_tag.is_known() && !self.dist_tag.matches(&current.release);
        let off_vendor =
            !self.vendor.is_empty() && current.vendor != self.vendor && previous.vendor != self.vendor;
        off_distro || off_vendor
    }
}

/// Most recent mode recorded for `path` by a layer before `layer`.
fn last_mode(snapshots: &[LayerSnapshot], layer: usize, path: &str) -> Option<u32> {
    snapshots[..layer]
        .iter()
        .rev()
        .find_map(|s| s.changes.mode(path))
}

/// The only change is clearing setuid and/or setgid.
fn is_hardening(previous: u32, current: u32) -> bool {
    let diff = (previous ^ current) & 0o7777;
    diff != 0 && diff & !SETID_BITS == 0 && current & diff == 0
}
