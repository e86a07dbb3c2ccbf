//! Platform distribution tag (e.g. `el9`) carried in package release strings.

use serde::{Deserialize, Serialize};

/// A distribution tag, or `unknown` which disables distro comparisons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DistTag(Option<String>);

impl DistTag {
    pub fn unknown() -> Self {
        Self(None)
    }

    pub fn is_known(&self) -> bool {
        self.0.is_some()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Whether a release string carries this tag. Always false when unknown.
    pub fn matches(&self, release: &str) -> bool {
        self.0.as_deref().is_some_and(|tag| release.contains(tag))
    }
}

impl From<&str> for DistTag {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("unknown") {
            Self(None)
        } else {
            Self(Some(s.to_string()))
        }
    }
}

impl From<String> for DistTag {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<DistTag> for String {
    fn from(tag: DistTag) -> Self {
        tag.to_string()
    }
}

impl std::fmt::Display for DistTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.as_deref().unwrap_or("unknown"))
    }
}

impl std::str::FromStr for DistTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}
