//! Per-layer change sets.

use std::collections::{BTreeMap, HashSet};

use crate::extract::paths;

/// Paths a layer adds or modifies, with their permission bits.
///
/// Deleted (whited-out) paths and paths only referenced as hard link
/// targets are not changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    modes: BTreeMap<String, u32>,
}

impl ChangeSet {
    pub fn mode(&self, path: &str) -> Option<u32> {
        self.modes.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.modes.contains_key(path)
    }

    /// Changed paths in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.modes.iter().map(|(p, m)| (p.as_str(), *m))
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

/// Accumulates a [`ChangeSet`] while a layer is scanned.
#[derive(Debug, Default)]
pub struct ChangeSetBuilder {
    modes: BTreeMap<String, u32>,
    link_targets: HashSet<String>,
    deleted: Vec<String>,
}

impl ChangeSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A regular file or symlink at `path`.
    pub fn record(&mut self, path: &str, mode: u32) {
        self.modes.insert(path.to_string(), mode & 0o7777);
    }

    /// A hard link at `path` referring to `target`.
    pub fn record_hardlink(&mut self, path: &str, mode: u32, target: &str) {
        self.record(path, mode);
        self.link_targets.insert(target.to_string());
    }

    /// A whiteout for `path` (and everything beneath it).
    pub fn record_whiteout(&mut self, path: &str) {
        self.deleted.push(path.to_string());
    }

    pub fn finish(mut self) -> ChangeSet {
        for target in &self.link_targets {
            self.modes.remove(target);
        }
        for deleted in &self.deleted {
            self.modes.retain(|p, _| !paths::is_within(p, deleted));
        }
        ChangeSet { modes: self.modes }
    }
}
