//! Filter pattern set selecting which archive entries to extract.

use std::collections::HashSet;

use glob::{MatchOptions, Pattern};
use layercheck_core::error::{CheckError, Result};

/// Shell-glob semantics: `*` and `?` never match `/`.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Growable set of glob patterns matched against normalized entry paths.
#[derive(Debug, Default)]
pub struct FilterSet {
    patterns: Vec<Pattern>,
    sources: HashSet<String>,
}

impl FilterSet {
    /// Compile the caller's patterns. A leading `/` or `./` is ignored.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut set = Self::default();
        for pattern in patterns {
            set.add_pattern(pattern.as_ref())?;
        }
        Ok(set)
    }

    /// Add a glob pattern. Returns false if it was already present.
    pub fn add_pattern(&mut self, pattern: &str) -> Result<bool> {
        let source = strip_root(pattern);
        if source.is_empty() || self.sources.contains(source) {
            return Ok(false);
        }
        let compiled = Pattern::new(source)
            .map_err(|e| CheckError::Pattern(format!("{}: {}", pattern, e)))?;
        self.patterns.push(compiled);
        self.sources.insert(source.to_string());
        Ok(true)
    }

    /// Add an exact path, escaping glob metacharacters. Returns false if present.
    pub fn add_literal(&mut self, path: &str) -> bool {
        let escaped = Pattern::escape(strip_root(path));
        // Escaped text always compiles
        self.add_pattern(&escaped).unwrap_or(false)
    }

    /// Whether a normalized path matches any pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(path, MATCH_OPTIONS))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn strip_root(pattern: &str) -> &str {
    let mut rest = pattern;
    loop {
        if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else {
            return rest;
        }
    }
}
