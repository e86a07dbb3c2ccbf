//! Reconciliation findings and the overall verdict.

use serde::{Deserialize, Serialize};

/// Category of a reconciliation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    /// A package-owned file changed outside the package manager.
    DisallowedModification,
    /// An update replaced a distribution package with a non-distribution build.
    DistroMismatch,
    /// An update changed the architecture of the owning package.
    ArchMismatch,
    /// Informational only; never fails the check.
    Warning,
}

impl FindingKind {
    /// Whether findings of this kind fail the check.
    pub fn is_failure(self) -> bool {
        !matches!(self, FindingKind::Warning)
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DisallowedModification => write!(f, "disallowed-modification"),
            Self::DistroMismatch => write!(f, "distro-mismatch"),
            Self::ArchMismatch => write!(f, "arch-mismatch"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single finding about one path in one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    /// Index of the layer that introduced the change
    pub layer: usize,
    /// Normalized path (no leading slash)
    pub path: String,
    /// Human-readable description for reports
    pub description: String,
}

impl Finding {
    pub fn new(
        kind: FindingKind,
        layer: usize,
        path: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            layer,
            path: path.into(),
            description: description.into(),
        }
    }
}

/// Pass/fail result plus the ordered findings that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub findings: Vec<Finding>,
}

impl Verdict {
    /// Build a verdict; it passes iff no finding is a failure.
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let passed = !findings.iter().any(|f| f.kind.is_failure());
        Self { passed, findings }
    }

    /// Findings of the given kind.
    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }
}
