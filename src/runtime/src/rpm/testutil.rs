//! Test helpers for synthesizing rpm headers and databases.

use std::path::Path;

use super::header::*;
use super::package::FileFlags;

/// Builds header blobs in the on-disk layout.
#[derive(Default)]
pub struct HeaderBuilder {
    entries: Vec<(u32, u32, Vec<u8>, u32, usize)>,
}

impl HeaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, tag: u32, kind: u32, data: Vec<u8>, count: u32, align: usize) -> Self {
        self.entries.push((tag, kind, data, count, align));
        self
    }

    pub fn string(self, tag: u32, value: &str) -> Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        self.push(tag, 6, data, 1, 1)
    }

    pub fn string_array(self, tag: u32, values: &[&str]) -> Self {
        let mut data = Vec::new();
        for value in values {
            data.extend_from_slice(value.as_bytes());
            data.push(0);
        }
        self.push(tag, 8, data, values.len() as u32, 1)
    }

    pub fn int32(self, tag: u32, values: &[u32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.push(tag, 4, data, values.len() as u32, 4)
    }

    pub fn int16(self, tag: u32, values: &[u16]) -> Self {
        let data = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.push(tag, 3, data, values.len() as u32, 2)
    }

    pub fn build(self) -> Vec<u8> {
        let mut index = Vec::new();
        let mut store: Vec<u8> = Vec::new();
        for (tag, kind, data, count, align) in &self.entries {
            while store.len() % align != 0 {
                store.push(0);
            }
            index.extend_from_slice(&tag.to_be_bytes());
            index.extend_from_slice(&kind.to_be_bytes());
            index.extend_from_slice(&(store.len() as u32).to_be_bytes());
            index.extend_from_slice(&count.to_be_bytes());
            store.extend_from_slice(data);
        }

        let mut blob = Vec::new();
        blob.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        blob.extend_from_slice(&(store.len() as u32).to_be_bytes());
        blob.extend_from_slice(&index);
        blob.extend_from_slice(&store);
        blob
    }
}

/// Minimal description of a package for tests.
pub struct TestPackage<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub release: &'a str,
    pub arch: &'a str,
    pub vendor: &'a str,
    pub install_time: u32,
    pub files: &'a [(&'a str, u32)],
}

impl TestPackage<'_> {
    pub fn blob(&self) -> Vec<u8> {
        let mut dirs: Vec<String> = Vec::new();
        let mut bases: Vec<String> = Vec::new();
        let mut indexes: Vec<u32> = Vec::new();
        let mut flags: Vec<u32> = Vec::new();
        for (path, flag) in self.files {
            let (dir, base) = path.rsplit_once('/').unwrap_or(("", path));
            let dir = format!("{}/", dir);
            let index = match dirs.iter().position(|d| *d == dir) {
                Some(i) => i,
                None => {
                    dirs.push(dir);
                    dirs.len() - 1
                }
            };
            bases.push(base.to_string());
            indexes.push(index as u32);
            flags.push(*flag);
        }
        let dirs: Vec<&str> = dirs.iter().map(String::as_str).collect();
        let bases: Vec<&str> = bases.iter().map(String::as_str).collect();

        HeaderBuilder::new()
            .string(TAG_NAME, self.name)
            .string(TAG_VERSION, self.version)
            .string(TAG_RELEASE, self.release)
            .int32(TAG_INSTALLTIME, &[self.install_time])
            .string(TAG_VENDOR, self.vendor)
            .string(TAG_ARCH, self.arch)
            .int32(TAG_FILEFLAGS, &flags)
            .int32(TAG_DIRINDEXES, &indexes)
            .string_array(TAG_BASENAMES, &bases)
            .string_array(TAG_DIRNAMES, &dirs)
            .build()
    }
}

/// Write an sqlite rpmdb holding `packages` at `dir/rpmdb.sqlite`.
pub fn write_sqlite_db(dir: &Path, packages: &[TestPackage<'_>]) {
    std::fs::create_dir_all(dir).unwrap();
    let conn = rusqlite::Connection::open(dir.join("rpmdb.sqlite")).unwrap();
    conn.execute(
        "CREATE TABLE Packages (hnum INTEGER PRIMARY KEY AUTOINCREMENT, blob BLOB NOT NULL)",
        [],
    )
    .unwrap();
    for package in packages {
        conn.execute("INSERT INTO Packages (blob) VALUES (?1)", [package.blob()])
            .unwrap();
    }
}

pub const NO_FLAGS: u32 = 0;
pub const CONFIG: u32 = FileFlags::CONFIG.bits();
