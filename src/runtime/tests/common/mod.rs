//! Shared builders for layer archives and package databases.

#![allow(dead_code)]

use std::io;

use layercheck_runtime::MemoryLayer;
use tar::{EntryType, Header};
use tempfile::TempDir;

pub enum Item<'a> {
    File(&'a str, &'a [u8]),
    FileMode(&'a str, &'a [u8], u32),
    Dir(&'a str),
    Symlink(&'a str, &'a str),
    Whiteout(&'a str),
    RawFile(&'a str, &'a [u8]),
}

/// Build an uncompressed tar layer.
pub fn layer(digest: &str, items: &[Item<'_>]) -> MemoryLayer {
    let mut builder = tar::Builder::new(Vec::new());
    for item in items {
        let mut header = Header::new_gnu();
        match item {
            Item::File(name, data) => append_file(&mut builder, &mut header, name, data, 0o644),
            Item::FileMode(name, data, mode) => {
                append_file(&mut builder, &mut header, name, data, *mode)
            }
            Item::Dir(name) => {
                header.set_entry_type(EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                header.set_cksum();
                builder.append_data(&mut header, name, io::empty()).unwrap();
            }
            Item::Symlink(name, target) => {
                header.set_entry_type(EntryType::Symlink);
                header.set_size(0);
                header.set_mode(0o777);
                builder.append_link(&mut header, name, target).unwrap();
            }
            Item::Whiteout(path) => {
                let (dir, base) = path.rsplit_once('/').unwrap_or(("", *path));
                let name = if dir.is_empty() {
                    format!(".wh.{}", base)
                } else {
                    format!("{}/.wh.{}", dir, base)
                };
                append_file(&mut builder, &mut header, &name, b"", 0o644);
            }
            Item::RawFile(name, data) => {
                let raw = name.as_bytes();
                header.as_old_mut().name[..raw.len()].copy_from_slice(raw);
                header.set_size(data.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append(&header, *data).unwrap();
            }
        }
    }
    MemoryLayer::new(digest, builder.into_inner().unwrap())
}

fn append_file(
    builder: &mut tar::Builder<Vec<u8>>,
    header: &mut Header,
    name: &str,
    data: &[u8],
    mode: u32,
) {
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_cksum();
    builder.append_data(header, name, data).unwrap();
}

pub fn patterns(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A package as stored in the rpm database.
pub struct Package<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub release: &'a str,
    pub arch: &'a str,
    pub vendor: &'a str,
    pub install_time: u32,
    pub files: &'a [&'a str],
}

impl<'a> Package<'a> {
    pub fn foo(version: &'a str, release: &'a str) -> Self {
        Self {
            name: "foo",
            version,
            release,
            arch: "x86_64",
            vendor: "Red Hat, Inc.",
            install_time: 1_700_000_000,
            files: &["/usr/bin/foo"],
        }
    }

    /// Encode as an rpm header blob (index + data store, big-endian).
    pub fn blob(&self) -> Vec<u8> {
        let mut dirs: Vec<String> = Vec::new();
        let mut bases: Vec<&str> = Vec::new();
        let mut indexes: Vec<u32> = Vec::new();
        for path in self.files {
            let (dir, base) = path.rsplit_once('/').unwrap();
            let dir = format!("{}/", dir);
            let index = dirs.iter().position(|d| *d == dir).unwrap_or_else(|| {
                dirs.push(dir);
                dirs.len() - 1
            });
            bases.push(base);
            indexes.push(index as u32);
        }
        let dirs: Vec<&str> = dirs.iter().map(String::as_str).collect();
        let flags = vec![0u32; self.files.len()];

        let mut tags: Vec<(u32, u32, Vec<u8>, u32)> = vec![
            (1000, 6, cstr(&[self.name]), 1),
            (1001, 6, cstr(&[self.version]), 1),
            (1002, 6, cstr(&[self.release]), 1),
            (1008, 4, self.install_time.to_be_bytes().to_vec(), 1),
            (1011, 6, cstr(&[self.vendor]), 1),
            (1022, 6, cstr(&[self.arch]), 1),
            (1037, 4, ints(&flags), flags.len() as u32),
            (1116, 4, ints(&indexes), indexes.len() as u32),
            (1117, 8, cstr(&bases), bases.len() as u32),
            (1118, 8, cstr(&dirs), dirs.len() as u32),
        ];

        let mut index = Vec::new();
        let mut store = Vec::new();
        for (tag, kind, data, count) in tags.drain(..) {
            if kind == 4 {
                while store.len() % 4 != 0 {
                    store.push(0);
                }
            }
            index.extend_from_slice(&tag.to_be_bytes());
            index.extend_from_slice(&kind.to_be_bytes());
            index.extend_from_slice(&(store.len() as u32).to_be_bytes());
            index.extend_from_slice(&count.to_be_bytes());
            store.extend_from_slice(&data);
        }

        let mut blob = Vec::new();
        blob.extend_from_slice(&((index.len() / 16) as u32).to_be_bytes());
        blob.extend_from_slice(&(store.len() as u32).to_be_bytes());
        blob.extend_from_slice(&index);
        blob.extend_from_slice(&store);
        blob
    }
}

fn cstr(values: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        out.extend_from_slice(value.as_bytes());
        out.push(0);
    }
    out
}

fn ints(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// Bytes of an sqlite rpm database holding `packages`.
pub fn rpmdb(packages: &[Package<'_>]) -> Vec<u8> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("rpmdb.sqlite");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
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
    std::fs::read(path).unwrap()
}
