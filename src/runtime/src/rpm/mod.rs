//! RPM installed-package database reader.

mod db;
mod header;
mod package;

#[cfg(test)]
pub(crate) mod testutil;

pub use db::{find_packages, Backend, RpmDatabase};
pub use header::Header;
pub use package::{FileFlags, PackageFile, PackageKey, PackageRecord};
