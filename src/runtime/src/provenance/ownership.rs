//! File ownership maps built from installed-package records.

use std::collections::HashMap;

use layercheck_core::ProvenanceConfig;

use crate::extract::paths;
use crate::rpm::{FileFlags, PackageRecord};

/// Paths that are never attributed to a package.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    dirs: Vec<String>,
    files: Vec<String>,
}

impl Exclusions {
    pub fn new<S: AsRef<str>>(dirs: &[S], files: &[S]) -> Self {
        let clean = |list: &[S]| -> Vec<String> {
            list.iter()
                .filter_map(|p| paths::normalize(p.as_ref()))
                .filter(|p| !p.is_empty())
                .collect()
        };
        Self {
            dirs: clean(dirs),
            files: clean(files),
        }
    }

    pub fn from_config(config: &ProvenanceConfig) -> Self {
        Self::new(&config.excluded_dirs, &config.excluded_files)
    }

    pub fn excludes(&self, path: &str) -> bool {
        self.files.iter().any(|f| f == path) || self.dirs.iter().any(|d| paths::is_within(path, d))
    }
}

/// Installed packages of one layer and the files each one owns.
#[derive(Debug, Default)]
pub struct PackageIndex {
    packages: Vec<PackageRecord>,
    owners: HashMap<String, usize>,
}

impl PackageIndex {
    /// Build the ownership map from `packages`.
    ///
    /// Files that may legitimately change are left unowned. When a path is
    /// claimed by the same package built for another architecture, the
    /// first claim is kept; any other conflict goes to the later package.
    pub fn build(packages: Vec<PackageRecord>, exclusions: &Exclusions) -> Self {
        let mut owners: HashMap<String, usize> = HashMap::new();

        for (index, package) in packages.iter().enumerate() {
            let key = package.key();
            for file in &package.files {
                if file.flags.intersects(FileFlags::NOT_VERIFIED) {
                    continue;
                }
                let Some(path) = paths::normalize(&file.path) else {
                    continue;
                };
                if path.is_empty() || exclusions.excludes(&path) {
                    continue;
                }
                if let Some(&existing) = owners.get(&path) {
                    if packages[existing].key().differs_only_in_arch(&key) {
                        continue;
                    }
                }
                owners.insert(path, index);
            }
        }

        Self { packages, owners }
    }

    /// Package owning the normalized `path`.
    pub fn owner(&self, path: &str) -> Option<&PackageRecord> {
        self.owners.get(path).map(|&i| &self.packages[i])
    }

    pub fn packages(&self) -> &[PackageRecord] {
        &self.packages
    }

    pub fn owned_files(&self) -> usize {
        self.owners.len()
    }
}
