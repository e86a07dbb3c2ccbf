//! Lexical path handling for archive entry names and link targets.
//!
//! All paths here are "normalized": relative to the image root, `/`-separated,
//! with no leading slash, no empty or `.` components and no `..` components.
//! The image root itself is the empty string.

/// Base-name prefix marking a whiteout (deletion) entry.
pub const WHITEOUT_PREFIX: &str = ".wh.";

/// Base name marking an opaque directory.
pub const OPAQUE_WHITEOUT: &str = ".wh..wh..opq";

/// Clean an archive path. Returns `None` when `..` would climb above the root.
pub fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Parent directory of a normalized path (`""` for root-level entries).
pub fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Last component of a normalized path.
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// Join a normalized directory and a relative path, then normalize.
pub fn join(dir: &str, rel: &str) -> Option<String> {
    if dir.is_empty() {
        normalize(rel)
    } else {
        normalize(&format!("{dir}/{rel}"))
    }
}

/// Resolve a symlink target to a normalized path.
///
/// Absolute targets are taken from the image root; relative targets from
/// the directory holding the link (the root for root-level links).
/// Returns `None` when the target leaves the root.
pub fn resolve_link_target(link_path: &str, target: &str) -> Option<String> {
    if target.starts_with('/') {
        normalize(target)
    } else {
        join(parent(link_path), target)
    }
}

/// Relative link text that reaches `to` from the directory `from_dir`.
pub fn relative_target(from_dir: &str, to: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|c| !c.is_empty()).collect();
    let to: Vec<&str> = to.split('/').filter(|c| !c.is_empty()).collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = std::iter::repeat("..").take(from.len() - common).collect();
    parts.extend_from_slice(&to[common..]);

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Path deleted by a whiteout entry, or `None` for regular and opaque entries.
pub fn whiteout_target(path: &str) -> Option<String> {
    let name = file_name(path);
    if name == OPAQUE_WHITEOUT {
        return None;
    }
    let deleted = name.strip_prefix(WHITEOUT_PREFIX)?;
    join(parent(path), deleted)
}

/// Whether the base name carries the whiteout prefix (including opaque markers).
pub fn is_whiteout(path: &str) -> bool {
    file_name(path).starts_with(WHITEOUT_PREFIX)
}

/// Whether `path` is `dir` or lies beneath it.
pub fn is_within(path: &str, dir: &str) -> bool {
    dir.is_empty()
        || path == dir
        || (path.starts_with(dir) && path.as_bytes().get(dir.len()) == Some(&b'/'))
}
