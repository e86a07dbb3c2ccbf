//! Installed-package database access.

use std::fmt;
use std::path::{Path, PathBuf};

use layercheck_core::error::{CheckError, Result};
use rusqlite::{Connection, OpenFlags};

use super::package::PackageRecord;

const SQLITE_FILE: &str = "rpmdb.sqlite";
const BDB_FILE: &str = "Packages";
const NDB_FILE: &str = "Packages.db";

/// On-disk database format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    BerkeleyDb,
    Ndb,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Sqlite => write!(f, "sqlite"),
            Backend::BerkeleyDb => write!(f, "bdb"),
            Backend::Ndb => write!(f, "ndb"),
        }
    }
}

impl Backend {
    /// Detect the backend present in `dir`, preferring sqlite.
    pub fn detect(dir: &Path) -> Option<(Backend, PathBuf)> {
        [
            (Backend::Sqlite, SQLITE_FILE),
            (Backend::Ndb, NDB_FILE),
            (Backend::BerkeleyDb, BDB_FILE),
        ]
        .into_iter()
        .map(|(backend, file)| (backend, dir.join(file)))
        .find(|(_, path)| path.is_file())
    }
}

/// An opened sqlite rpm database.
pub struct RpmDatabase {
    path: PathBuf,
    conn: Connection,
}

impl RpmDatabase {
    /// Open an existing `rpmdb.sqlite` file.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| CheckError::PackageDb(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode every package header. Malformed headers are skipped.
    pub fn packages(&self) -> Result<Vec<PackageRecord>> {
        let db_err = |e: rusqlite::Error| CheckError::PackageDb(format!("{}: {}", self.path.display(), e));

        let mut stmt = self
            .conn
            .prepare("SELECT hnum, blob FROM Packages ORDER BY hnum")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))
            .map_err(db_err)?;

        let mut packages = Vec::new();
        for row in rows {
            let (hnum, blob) = row.map_err(db_err)?;
            match PackageRecord::from_blob(&blob) {
                Ok(record) => packages.push(record),
                Err(e) => tracing::warn!(hnum, error = %e, "Skipping unreadable package header"),
            }
        }

        tracing::debug!(path = %self.path.display(), count = packages.len(), "Read package database");
        Ok(packages)
    }
}

/// Load packages from the first candidate directory under `root` holding a
/// readable database. `None` when no candidate has one.
pub fn find_packages<S: AsRef<str>>(root: &Path, candidates: &[S]) -> Option<Vec<PackageRecord>> {
    for candidate in candidates {
        let dir = root.join(candidate.as_ref().trim_start_matches('/'));
        let Some((backend, path)) = Backend::detect(&dir) else {
            continue;
        };
        if backend != Backend::Sqlite {
            tracing::warn!(
                path = %path.display(),
                %backend,
                "Unsupported package database backend, ignoring"
            );
            continue;
        }
        match RpmDatabase::open(&path).and_then(|db| db.packages()) {
            Ok(packages) => return Some(packages),
            Err(e) => tracing::warn!(error = %e, "Failed to read package database"),
        }
    }
    None
}
