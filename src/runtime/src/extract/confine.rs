//! Filesystem access confined beneath a destination root.
//!
//! Directories are walked one component at a time. Symlinks met along the
//! way are followed as if the destination root were `/`, so nothing reached
//! through this module can live outside the root.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Upper bound on symlinks followed while resolving one directory.
pub const MAX_LINK_HOPS: usize = 40;

/// Outcome of resolving a directory beneath the root.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolved {
    /// Physical path of the directory, inside the root.
    Inside(PathBuf),
    /// The walk had to climb above the root.
    Escapes,
    /// A component does not exist (only when not creating).
    Missing,
}

/// Resolve the normalized directory `rel_dir` under the canonical `root`.
///
/// With `create`, missing components are created and regular files standing
/// where a directory is needed are replaced.
pub fn resolve_dir(root: &Path, rel_dir: &str, create: bool) -> io::Result<Resolved> {
    let mut pending: VecDeque<String> = rel_dir
        .split('/')
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    let mut current = root.to_path_buf();
    let mut hops = 0;

    while let Some(component) = pending.pop_front() {
        match component.as_str() {
            "." => continue,
            ".." => {
                if current == root {
                    return Ok(Resolved::Escapes);
                }
                current.pop();
                continue;
            }
            _ => {}
        }

        let next = current.join(&component);
        match fs::symlink_metadata(&next) {
            Ok(meta) if meta.file_type().is_symlink() => {
                hops += 1;
                if hops > MAX_LINK_HOPS {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!("too many levels of symbolic links at {}", next.display()),
                    ));
                }
                let target = fs::read_link(&next)?;
                let target = target.to_string_lossy();
                if target.starts_with('/') {
                    current = root.to_path_buf();
                }
                for part in target.split('/').rev().filter(|c| !c.is_empty()) {
                    pending.push_front(part.to_string());
                }
            }
            Ok(meta) if meta.is_dir() => current = next,
            Ok(_) if create => {
                fs::remove_file(&next)?;
                fs::create_dir(&next)?;
                current = next;
            }
            Ok(_) => return Ok(Resolved::Missing),
            Err(e) if e.kind() == io::ErrorKind::NotFound && create => {
                fs::create_dir(&next)?;
                current = next;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Resolved::Missing),
            Err(e) => return Err(e),
        }
    }

    Ok(Resolved::Inside(current))
}

/// Remove whatever currently occupies `path` (file, link, or directory tree).
pub fn clear_slot(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Normalized path of `physical` relative to `root`.
pub fn relative_to_root(root: &Path, physical: &Path) -> String {
    physical
        .strip_prefix(root)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn canonical_root() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = fs::canonicalize(temp_dir.path()).unwrap();
        (temp_dir, root)
    }

    #[test]
    fn test_creates_missing_directories() {
        let (_guard, root) = canonical_root();

        let resolved = resolve_dir(&root, "usr/share/licenses", true).unwrap();

        assert_eq!(resolved, Resolved::Inside(root.join("usr/share/licenses")));
        assert!(root.join("usr/share/licenses").is_dir());
    }

    #[test]
    fn test_missing_without_create() {
        let (_guard, root) = canonical_root();
        assert_eq!(resolve_dir(&root, "nope/deeper", false).unwrap(), Resolved::Missing);
        assert!(!root.join("nope").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_follows_absolute_symlink_from_root() {
        let (_guard, root) = canonical_root();
        fs::create_dir_all(root.join("usr/lib")).unwrap();
        std::os::unix::fs::symlink("/usr/lib", root.join("lib")).unwrap();

        let resolved = resolve_dir(&root, "lib", false).unwrap();

        assert_eq!(resolved, Resolved::Inside(root.join("usr/lib")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_climbing_above_root_escapes() {
        let (_guard, root) = canonical_root();
        std::os::unix::fs::symlink("../../..", root.join("up")).unwrap();

        assert_eq!(resolve_dir(&root, "up/etc", true).unwrap(), Resolved::Escapes);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_an_error() {
        let (_guard, root) = canonical_root();
        std::os::unix::fs::symlink("b", root.join("a")).unwrap();
        std::os::unix::fs::symlink("a", root.join("b")).unwrap();

        assert!(resolve_dir(&root, "a", false).is_err());
    }

    #[test]
    fn test_replaces_file_with_directory() {
        let (_guard, root) = canonical_root();
        fs::write(root.join("opt"), b"file").unwrap();

        let resolved = resolve_dir(&root, "opt/app", true).unwrap();

        assert_eq!(resolved, Resolved::Inside(root.join("opt/app")));
    }

    #[test]
    fn test_clear_slot_handles_all_kinds() {
        let (_guard, root) = canonical_root();
        fs::create_dir_all(root.join("d/e")).unwrap();
        fs::write(root.join("f"), b"x").unwrap();

        clear_slot(&root.join("d")).unwrap();
        clear_slot(&root.join("f")).unwrap();
        clear_slot(&root.join("absent")).unwrap();

        assert!(!root.join("d").exists());
        assert!(!root.join("f").exists());
    }

    #[test]
    fn test_relative_to_root() {
        let root = PathBuf::from("/dest");
        assert_eq!(relative_to_root(&root, &root.join("usr/bin")), "usr/bin");
        assert_eq!(relative_to_root(&root, &root), "");
    }
}
