//! Package records decoded from rpm headers.

use std::fmt;

use layercheck_core::error::Result;
use serde::{Deserialize, Serialize};

use super::header::*;

/// Per-file attribute flags (`RPMFILE_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileFlags(u32);

impl FileFlags {
    pub const CONFIG: FileFlags = FileFlags(1 << 0);
    pub const DOC: FileFlags = FileFlags(1 << 1);
    pub const MISSINGOK: FileFlags = FileFlags(1 << 3);
    pub const GHOST: FileFlags = FileFlags(1 << 6);
    pub const LICENSE: FileFlags = FileFlags(1 << 7);
    pub const README: FileFlags = FileFlags(1 << 8);
    pub const ARTIFACT: FileFlags = FileFlags(1 << 12);

    /// Files whose content is expected to change or may be absent.
    pub const NOT_VERIFIED: FileFlags = FileFlags(
        Self::CONFIG.0
            | Self::DOC.0
            | Self::MISSINGOK.0
            | Self::GHOST.0
            | Self::LICENSE.0
            | Self::README.0
            | Self::ARTIFACT.0,
    );

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether any bit of `other` is set.
    pub const fn intersects(self, other: FileFlags) -> bool {
        self.0 & other.0 != 0
    }
}

/// Identity of an installed package: name, version, release, arch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.version, self.release)?;
        if !self.arch.is_empty() {
            write!(f, ".{}", self.arch)?;
        }
        Ok(())
    }
}

impl PackageKey {
    /// Same package apart from architecture.
    pub fn differs_only_in_arch(&self, other: &PackageKey) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.release == other.release
            && self.arch != other.arch
    }
}

/// A file owned by a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFile {
    /// Absolute path as recorded in the database.
    pub path: String,
    pub flags: FileFlags,
    pub mode: u16,
}

/// An installed package and the files it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub release: String,
    pub epoch: Option<u32>,
    pub arch: String,
    pub vendor: String,
    pub install_time: u32,
    pub files: Vec<PackageFile>,
}

impl PackageRecord {
    /// Decode a header blob.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        let header = Header::parse(blob)?;
        let text = |tag| -> Result<String> { Ok(header.string(tag)?.unwrap_or_default()) };

        let paths = file_paths(&header)?;
        let flags = header.u32_array(TAG_FILEFLAGS)?;
        let modes = header.u16_array(TAG_FILEMODES)?;
        let files = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| PackageFile {
                path,
                flags: FileFlags::from_bits(flags.get(i).copied().unwrap_or(0)),
                mode: modes.get(i).copied().unwrap_or(0),
            })
            .collect();

        Ok(Self {
            name: text(TAG_NAME)?,
            version: text(TAG_VERSION)?,
            release: text(TAG_RELEASE)?,
            epoch: header.u32(TAG_EPOCH)?,
            arch: text(TAG_ARCH)?,
            vendor: text(TAG_VENDOR)?,
            install_time: header.u32(TAG_INSTALLTIME)?.unwrap_or(0),
            files,
        })
    }

    pub fn key(&self) -> PackageKey {
        PackageKey {
            name: self.name.clone(),
            version: self.version.clone(),
            release: self.release.clone(),
            arch: self.arch.clone(),
        }
    }
}

/// File paths from the compressed (dirnames/basenames) or legacy layout.
fn file_paths(header: &Header) -> Result<Vec<String>> {
    let basenames = header.string_array(TAG_BASENAMES)?;
    if basenames.is_empty() {
        return header.string_array(TAG_OLDFILENAMES);
    }
    let dirnames = header.string_array(TAG_DIRNAMES)?;
    let indexes = header.u32_array(TAG_DIRINDEXES)?;

    Ok(basenames
        .into_iter()
        .enumerate()
        .filter_map(|(i, base)| {
            let dir = dirnames.get(*indexes.get(i)? as usize)?;
            Some(format!("{}{}", dir, base))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpm::testutil::{HeaderBuilder, TestPackage, CONFIG, NO_FLAGS};

    #[test]
    fn test_key_display() {
        let key = PackageKey {
            name: "foo".into(),
            version: "1.0".into(),
            release: "1.el9".into(),
            arch: "x86_64".into(),
        };
        assert_eq!(key.to_string(), "foo-1.0-1.el9.x86_64");
    }

    #[test]
    fn test_differs_only_in_arch() {
        let a = PackageKey {
            name: "glibc".into(),
            version: "2.34".into(),
            release: "60.el9".into(),
            arch: "x86_64".into(),
        };
        let mut b = a.clone();
        b.arch = "i686".into();
        assert!(a.differs_only_in_arch(&b));
        assert!(!a.differs_only_in_arch(&a));
        b.version = "2.35".into();
        assert!(!a.differs_only_in_arch(&b));
    }

    #[test]
    fn test_record_from_blob() {
        let package = TestPackage {
            name: "bash",
            version: "5.1.8",
            release: "6.el9",
            arch: "x86_64",
            vendor: "Red Hat, Inc.",
            install_time: 1_700_000_000,
            files: &[("/usr/bin/bash", NO_FLAGS), ("/etc/skel/.bashrc", CONFIG)],
        };

        let record = PackageRecord::from_blob(&package.blob()).unwrap();

        assert_eq!(record.key().to_string(), "bash-5.1.8-6.el9.x86_64");
        assert_eq!(record.vendor, "Red Hat, Inc.");
        assert_eq!(record.install_time, 1_700_000_000);
        assert_eq!(record.epoch, None);
        assert_eq!(record.files.len(), 2);
        assert_eq!(record.files[0].path, "/usr/bin/bash");
        assert_eq!(record.files[1].path, "/etc/skel/.bashrc");
        assert!(record.files[1].flags.intersects(FileFlags::NOT_VERIFIED));
        assert!(!record.files[0].flags.intersects(FileFlags::NOT_VERIFIED));
    }

    #[test]
    fn test_legacy_file_names() {
        let blob = HeaderBuilder::new()
            .string(TAG_NAME, "old")
            .string_array(TAG_OLDFILENAMES, &["/bin/old", "/etc/old.conf"])
            .int32(TAG_FILEFLAGS, &[0, FileFlags::CONFIG.bits()])
            .int16(TAG_FILEMODES, &[0o100755, 0o100644])
            .build();

        let record = PackageRecord::from_blob(&blob).unwrap();

        assert_eq!(record.files[0].path, "/bin/old");
        assert_eq!(record.files[0].mode, 0o100755);
        assert_eq!(record.files[1].flags, FileFlags::CONFIG);
        assert_eq!(record.version, "");
    }
}
