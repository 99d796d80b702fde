//! Stability classification of release tags.
//!
//! Tags are not required to be strict semver. The classifier looks at the
//! first alphabetic modifier that follows the numeric core, so `v2.1.0`,
//! `2.1.0-beta.3`, `2.1.0-RC1` and `2.1.0beta2` are all understood. Anything
//! it cannot place is treated as [`Stability::Dev`] so that an unknown tag is
//! never offered on the stable channel.

use std::fmt;

/// Stability level of a version string, from least to most stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stability {
    /// Development snapshot or unrecognised modifier.
    Dev,
    /// Alpha pre-release.
    Alpha,
    /// Beta pre-release.
    Beta,
    /// Release candidate.
    ReleaseCandidate,
    /// Final release.
    Stable,
}

impl Stability {
    /// Map a modifier word (already lowercased) to a stability level.
    fn from_modifier(modifier: &str) -> Self {
        match modifier {
            "stable" | "patch" | "pl" | "p" => Self::Stable,
            "rc" => Self::ReleaseCandidate,
            "beta" | "b" => Self::Beta,
            "alpha" | "a" => Self::Alpha,
            _ => Self::Dev,
        }
    }

    /// Check if this is a final release.
    #[must_use]
    pub fn is_stable(&self) -> bool {
        *self == Self::Stable
    }

    /// Short lowercase name.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::ReleaseCandidate => "rc",
            Self::Stable => "stable",
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Classify a version or tag string.
#[must_use]
pub fn classify(version: &str) -> Stability {
    let lowered = version.trim().to_ascii_lowercase();
    let without_prefix = lowered.strip_prefix('v').unwrap_or(&lowered);
    let core = without_prefix
        .split_once('+')
        .map_or(without_prefix, |(core, _build)| core);

    if core.is_empty() || core.starts_with("dev-") || core.ends_with("dev") {
        return Stability::Dev;
    }

    match first_modifier(core) {
        Some(modifier) => Stability::from_modifier(modifier),
        None => Stability::Stable,
    }
}

/// Returns the first run of ASCII letters in `version`, if any.
fn first_modifier(version: &str) -> Option<&str> {
    let start = version.find(|c: char| c.is_ascii_alphabetic())?;
    let rest = &version[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}
