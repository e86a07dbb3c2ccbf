//! Layer stream extraction.
//!
//! Pulls a selected subset of files out of an ordered sequence of tar layers
//! into a destination directory. Symlink and hard link targets that were not
//! requested are discovered as they are met and fetched by further passes
//! over the layers until nothing new turns up.
//!
//! # Passes
//!
//! A pass opens every layer in order and scans every entry. Within a pass,
//! later layers overwrite (or white out) paths written by earlier ones. A
//! path materialized by a completed pass is never touched again.
//!
//! # Confinement
//!
//! - An entry whose *name* normalizes outside the destination is fatal.
//! - A link whose *target* resolves outside the destination is skipped
//!   with a warning and extraction continues.
//!
//! # Replacement
//!
//! Writing over a directory drops every record beneath it. An entry whose
//! ancestor was replaced by a later entry is shadowed and never written by
//! later passes.

pub mod confine;
pub mod filter;
pub mod paths;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use layercheck_core::error::{CheckError, Result};
use tar::{Archive, Entry, EntryType};
use tokio_util::sync::CancellationToken;

use crate::oci::{stream_error, CancellableReader, Layer};
use confine::{clear_slot, relative_to_root, resolve_dir, Resolved, MAX_LINK_HOPS};
use filter::FilterSet;

/// Summary of a completed extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    /// Normalized paths materialized on disk
    pub extracted: BTreeSet<String>,
    /// Number of passes over the layer sequence
    pub passes: usize,
    /// Link targets that no layer provides
    pub dangling: BTreeSet<String>,
    /// Links not created because their target leaves the destination
    pub skipped_links: BTreeSet<String>,
}

/// Extract entries matching `patterns` from `layers` into `dest`.
///
/// `dest` must exist. At least one pass always runs, so a malformed layer
/// stream is reported even when nothing is requested.
pub fn extract<L: Layer>(
    dest: &Path,
    layers: &[L],
    patterns: &[String],
    cancel: &CancellationToken,
) -> Result<ExtractReport> {
    let mut extractor = LayerExtractor::new(dest, patterns, cancel)?;
    extractor.run(layers)?;
    Ok(extractor.into_report())
}

/// Where an entry sits in the layer sequence: (layer index, entry index).
type Position = (usize, usize);

/// Paths materialized by completed passes.
#[derive(Debug, Default)]
struct ExtractionState {
    /// Extracted path -> position of the entry that wrote it
    extracted: HashMap<String, Position>,
    /// Extracted symlink path -> normalized target
    links: HashMap<String, String>,
    /// Requested directories seen so far
    dirs: HashSet<String>,
    /// Link targets still waiting for a layer to provide them
    pending: BTreeSet<String>,
}

/// Bookkeeping for a single pass.
#[derive(Debug, Default)]
struct PassState {
    extracted: HashMap<String, Position>,
    links: HashMap<String, String>,
    /// Link targets referenced during this pass
    targets: BTreeSet<String>,
    /// Requested directories seen during this pass
    dirs: HashSet<String>,
    /// Hard links deferred because their target was not on disk yet
    deferred: BTreeSet<String>,
}

impl PassState {
    fn record(&mut self, path: &str, at: Position) {
        self.extracted.insert(path.to_string(), at);
        self.links.remove(path);
    }

    fn forget(&mut self, path: &str) {
        self.extracted.retain(|p, _| !paths::is_within(p, path));
        self.links.retain(|p, _| !paths::is_within(p, path));
    }
}

/// Multi-pass extractor over one destination root.
pub struct LayerExtractor<'a> {
    root: PathBuf,
    filter: FilterSet,
    cancel: &'a CancellationToken,
    state: ExtractionState,
    report: ExtractReport,
}

impl<'a> LayerExtractor<'a> {
    /// Create an extractor for an existing destination directory.
    pub fn new(dest: &Path, patterns: &[String], cancel: &'a CancellationToken) -> Result<Self> {
        let root = fs::canonicalize(dest).map_err(|e| {
            CheckError::Other(format!(
                "Destination directory {} is not usable: {}",
                dest.display(),
                e
            ))
        })?;
        if !root.is_dir() {
            return Err(CheckError::Other(format!(
                "Destination {} is not a directory",
                dest.display()
            )));
        }

        Ok(Self {
            root,
            filter: FilterSet::new(patterns)?,
            cancel,
            state: ExtractionState::default(),
            report: ExtractReport::default(),
        })
    }

    /// Run passes until no new link target is discovered.
    pub fn run<L: Layer>(&mut self, layers: &[L]) -> Result<()> {
        loop {
            self.report.passes += 1;
            let pass = self.report.passes;
            let (unresolved, retry_links) = self.run_pass(layers, pass)?;

            let mut discovered = 0;
            for target in unresolved {
                let target = self.through_known_links(&target).unwrap_or(target);
                if self.state.extracted.contains_key(&target) {
                    continue;
                }
                // A target the filter already covers would have been found
                if !self.filter.matches(&target) && self.filter.add_literal(&target) {
                    discovered += 1;
                }
                self.state.pending.insert(target);
            }

            tracing::debug!(
                pass,
                discovered,
                retry_links,
                extracted = self.state.extracted.len(),
                "Extraction pass complete"
            );

            if discovered == 0 && !retry_links {
                break;
            }
        }

        let dangling: Vec<String> = self
            .state
            .pending
            .iter()
            .filter(|t| !self.state.extracted.contains_key(*t) && !self.state.dirs.contains(*t))
            .cloned()
            .collect();
        for target in dangling {
            tracing::warn!(target = %target, "Link target not found in any layer");
            self.report.dangling.insert(target);
        }
        Ok(())
    }

    /// Consume the extractor, returning its report.
    pub fn into_report(mut self) -> ExtractReport {
        self.report.extracted = self.state.extracted.into_keys().collect();
        self.report
    }

    /// One pass over every layer. Returns the unresolved link targets and
    /// whether a deferred hard link can now be created.
    fn run_pass<L: Layer>(&mut self, layers: &[L], pass: usize) -> Result<(BTreeSet<String>, bool)> {
        let mut state = PassState::default();

        for (index, layer) in layers.iter().enumerate() {
            tracing::debug!(pass, layer = index, digest = layer.digest(), "Scanning layer");
            self.scan_layer(index, layer, &mut state)?;
        }

        // Only a target first written by this pass can unblock a deferred
        // link. One that was already on disk failed for good.
        let retry_links = state
            .deferred
            .iter()
            .any(|target| state.extracted.contains_key(target));

        self.state.extracted.extend(state.extracted.drain());
        self.state.links.extend(state.links.drain());
        self.state.dirs.extend(state.dirs.drain());

        let unresolved = state
            .targets
            .into_iter()
            .filter(|t| !self.state.extracted.contains_key(t) && !self.state.dirs.contains(t))
            .collect();

        Ok((unresolved, retry_links))
    }

    fn scan_layer<L: Layer>(&mut self, index: usize, layer: &L, state: &mut PassState) -> Result<()> {
        let reader = layer.open().map_err(|e| stream_error(self.cancel, index, e))?;
        let mut archive = Archive::new(CancellableReader::new(reader, self.cancel));

        {
            let entries = archive
                .entries()
                .map_err(|e| stream_error(self.cancel, index, e))?;
            for (position, entry) in entries.enumerate() {
                if self.cancel.is_cancelled() {
                    return Err(CheckError::Cancelled);
                }
                let mut entry = entry.map_err(|e| stream_error(self.cancel, index, e))?;
                self.handle_entry((index, position), &mut entry, state)?;
            }
        }

        // The decoder must see the stream through to its end
        let mut inner = archive.into_inner();
        io::copy(&mut inner, &mut io::sink()).map_err(|e| stream_error(self.cancel, index, e))?;
        Ok(())
    }

    fn handle_entry<R: Read>(
        &mut self,
        at: Position,
        entry: &mut Entry<'_, R>,
        state: &mut PassState,
    ) -> Result<()> {
        let layer = at.0;
        let raw = entry
            .path()
            .map_err(|e| CheckError::layer_read(layer, e))?
            .to_string_lossy()
            .into_owned();
        let path = paths::normalize(&raw)
            .ok_or_else(|| CheckError::PathEscape { path: raw.clone(), layer })?;
        if path.is_empty() {
            return Ok(());
        }

        if paths::is_whiteout(&path) {
            if let Some(deleted) = paths::whiteout_target(&path) {
                self.apply_whiteout(&deleted, state)?;
            }
            return Ok(());
        }

        if self.state.extracted.contains_key(&path) || !self.filter.matches(&path) {
            return Ok(());
        }
        if self.shadowed(&path, at) {
            tracing::debug!(layer, path = %path, "Skipping entry beneath a later replacement");
            return Ok(());
        }

        let entry_type = entry.header().entry_type();
        match entry_type {
            EntryType::Directory => {
                state.dirs.insert(path);
            }
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                self.write_file(at, &path, entry, state)?;
            }
            EntryType::Symlink => {
                let target = link_name(layer, entry)?;
                self.create_symlink(at, &path, &target, state)?;
            }
            EntryType::Link => {
                let target = link_name(layer, entry)?;
                self.create_hardlink(at, &path, &target, state)?;
            }
            other => {
                tracing::debug!(path = %path, kind = ?other, "Skipping unsupported entry type");
            }
        }
        Ok(())
    }

    /// Resolve (creating as needed) the physical parent directory of `path`.
    fn materialize_parent(&self, layer: usize, path: &str) -> Result<PathBuf> {
        match resolve_dir(&self.root, paths::parent(path), true)? {
            Resolved::Inside(dir) => Ok(dir),
            Resolved::Escapes | Resolved::Missing => Err(CheckError::PathEscape {
                path: path.to_string(),
                layer,
            }),
        }
    }

    /// Whether an ancestor of `path` was replaced by an entry after `at`.
    fn shadowed(&self, path: &str, at: Position) -> bool {
        path.match_indices('/').any(|(i, _)| {
            matches!(self.state.extracted.get(&path[..i]), Some(&written) if written > at)
        })
    }

    /// Drop records beneath `path`, which is about to be replaced.
    fn forget_beneath(&mut self, path: &str, state: &mut PassState) {
        let beneath = |p: &String| p != path && paths::is_within(p, path);
        state.extracted.retain(|p, _| !beneath(p));
        state.links.retain(|p, _| !beneath(p));
        self.state.extracted.retain(|p, _| !beneath(p));
        self.state.links.retain(|p, _| !beneath(p));
    }

    fn write_file<R: Read>(
        &mut self,
        at: Position,
        path: &str,
        entry: &mut Entry<'_, R>,
        state: &mut PassState,
    ) -> Result<()> {
        let layer = at.0;
        let parent = self.materialize_parent(layer, path)?;
        let target = parent.join(paths::file_name(path));
        self.forget_beneath(path, state);
        clear_slot(&target)?;

        let mut file = File::create(&target)?;
        io::copy(entry, &mut file).map_err(|e| stream_error(self.cancel, layer, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = entry.header().mode().unwrap_or(0o644);
            fs::set_permissions(&target, fs::Permissions::from_mode((mode & 0o777) | 0o600))?;
        }

        tracing::debug!(layer, path = %path, "Extracted file");
        state.record(path, at);
        Ok(())
    }

    fn create_symlink(
        &mut self,
        at: Position,
        path: &str,
        target: &str,
        state: &mut PassState,
    ) -> Result<()> {
        let layer = at.0;
        let Some(resolved) = paths::resolve_link_target(path, target) else {
            tracing::warn!(
                layer,
                path = %path,
                target = %target,
                "Skipping symlink whose target escapes the destination"
            );
            self.report.skipped_links.insert(path.to_string());
            return Ok(());
        };

        let parent = self.materialize_parent(layer, path)?;
        let link_path = parent.join(paths::file_name(path));
        // Written relative to where the link physically lives so it never
        // points at the host filesystem
        let link_text = paths::relative_target(&relative_to_root(&self.root, &parent), &resolved);
        self.forget_beneath(path, state);
        clear_slot(&link_path)?;
        make_symlink(&link_text, &link_path)?;

        tracing::debug!(layer, path = %path, target = %resolved, "Created symlink");
        state.record(path, at);
        if resolved != path {
            state.links.insert(path.to_string(), resolved.clone());
            state.targets.insert(resolved);
        }
        Ok(())
    }

    fn create_hardlink(
        &mut self,
        at: Position,
        path: &str,
        target: &str,
        state: &mut PassState,
    ) -> Result<()> {
        let layer = at.0;
        let Some(resolved) = paths::normalize(target).filter(|t| !t.is_empty()) else {
            tracing::warn!(
                layer,
                path = %path,
                target = %target,
                "Skipping hard link whose target escapes the destination"
            );
            self.report.skipped_links.insert(path.to_string());
            return Ok(());
        };
        if resolved == path {
            return Ok(());
        }
        state.targets.insert(resolved.clone());

        let source = match resolve_dir(&self.root, paths::parent(&resolved), false)? {
            Resolved::Inside(dir) => dir.join(paths::file_name(&resolved)),
            Resolved::Escapes => {
                tracing::warn!(layer, path = %path, target = %resolved, "Skipping hard link through escaping directory");
                self.report.skipped_links.insert(path.to_string());
                return Ok(());
            }
            Resolved::Missing => {
                state.deferred.insert(resolved);
                return Ok(());
            }
        };
        if fs::symlink_metadata(&source).is_err() {
            state.deferred.insert(resolved);
            return Ok(());
        }

        let parent = self.materialize_parent(layer, path)?;
        let link_path = parent.join(paths::file_name(path));
        self.forget_beneath(path, state);
        clear_slot(&link_path)?;
        fs::hard_link(&source, &link_path)?;

        tracing::debug!(layer, path = %path, target = %resolved, "Created hard link");
        state.record(path, at);
        Ok(())
    }

    /// Remove a path written earlier in this pass that a later layer deleted.
    fn apply_whiteout(&mut self, deleted: &str, state: &mut PassState) -> Result<()> {
        let touched = state.extracted.keys().any(|p| paths::is_within(p, deleted));
        if !touched {
            return Ok(());
        }
        if let Resolved::Inside(dir) = resolve_dir(&self.root, paths::parent(deleted), false)? {
            clear_slot(&dir.join(paths::file_name(deleted)))?;
        }
        state.forget(deleted);
        tracing::debug!(path = %deleted, "Applied whiteout");
        Ok(())
    }

    /// Rewrite `target` through symlinked parent directories extracted so far.
    fn through_known_links(&self, target: &str) -> Option<String> {
        let mut current = target.to_string();
        for _ in 0..MAX_LINK_HOPS {
            let components: Vec<&str> = current.split('/').collect();
            let rewritten = (1..components.len()).rev().find_map(|i| {
                let prefix = components[..i].join("/");
                self.state
                    .links
                    .get(&prefix)
                    .and_then(|dest| paths::join(dest, &components[i..].join("/")))
            });
            match rewritten {
                Some(next) if next != current => current = next,
                _ => return Some(current),
            }
        }
        None
    }
}

fn link_name<R: Read>(layer: usize, entry: &Entry<'_, R>) -> Result<String> {
    entry
        .link_name()
        .map_err(|e| CheckError::layer_read(layer, e))?
        .map(|p| p.to_string_lossy().into_owned())
        .ok_or_else(|| CheckError::layer_read(layer, "link entry without a target"))
}

#[cfg(unix)]
fn make_symlink(text: &str, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(text, link)
}

#[cfg(not(unix))]
fn make_symlink(_text: &str, link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("symlinks are not supported here: {}", link.display()),
    ))
}
