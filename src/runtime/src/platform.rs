//! Platform detection from os-release.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use layercheck_core::error::Result;
use layercheck_core::DistTag;

const OS_RELEASE_PATHS: [&str; 2] = ["etc/os-release", "usr/lib/os-release"];

const RHEL_FAMILY: [&str; 4] = ["rhel", "centos", "almalinux", "rocky"];

/// Parsed `os-release` key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    fields: HashMap<String, String>,
}

impl OsRelease {
    /// Parse `KEY=value` lines. Values may be single or double quoted.
    pub fn parse(content: &str) -> Self {
        let fields = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), unquote(value.trim())))
            .collect();
        Self { fields }
    }

    /// Read os-release from an extracted image tree.
    ///
    /// Files that resolve outside `root` are ignored. Returns `None` when
    /// no os-release file is present.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let root = fs::canonicalize(root)?;
        for candidate in OS_RELEASE_PATHS {
            let Ok(path) = fs::canonicalize(root.join(candidate)) else {
                continue;
            };
            if !path.starts_with(&root) {
                tracing::warn!(path = %path.display(), "os-release resolves outside the image root");
                continue;
            }
            let content = fs::read_to_string(&path)?;
            return Ok(Some(Self::parse(&content)));
        }
        Ok(None)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Distribution tag carried in package release strings.
    pub fn dist_tag(&self) -> DistTag {
        let id = self.get("ID").unwrap_or_default();
        let like = self.get("ID_LIKE").unwrap_or_default();
        let version = self.get("VERSION_ID").unwrap_or_default();
        let major = version.split('.').next().unwrap_or_default();

        if major.is_empty() || !major.chars().all(|c| c.is_ascii_digit()) {
            return DistTag::unknown();
        }
        if RHEL_FAMILY.contains(&id) || like.split_whitespace().any(|l| l == "rhel") {
            return DistTag::from(format!("el{}", major).as_str());
        }
        if id == "fedora" {
            return DistTag::from(format!("fc{}", major).as_str());
        }
        DistTag::unknown()
    }
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    value.to_string()
}
