//! Release discovery and selection.
//!
//! Releases are scanned in the order the API returns them. GitHub does not
//! promise chronological or semver order for the list endpoint; the first
//! qualifying entry wins regardless.

use serde_json::Value;
use tracing::{debug, info};

use crate::config::{StabilityPolicy, UpdaterConfig};
use crate::error::{Result, UpdateError};
use crate::release::{Release, ResolvedRelease};
use crate::transport::Transport;

/// Picks the release an update should install.
pub struct ReleaseResolver<'a, T: Transport> {
    transport: T,
    config: &'a UpdaterConfig,
}

impl<'a, T: Transport> ReleaseResolver<'a, T> {
    /// Creates a resolver for the repository in `config`.
    pub fn new(transport: T, config: &'a UpdaterConfig) -> Self {
        Self { transport, config }
    }

    /// Resolve the release to install under `policy`.
    pub fn resolve(&self, policy: StabilityPolicy) -> Result<ResolvedRelease> {
        let resolved = match policy {
            StabilityPolicy::Stable => self.resolve_stable(),
            StabilityPolicy::Preview => self.resolve_preview(),
        }?;
        info!(
            "Resolved {} release {} ({})",
            policy, resolved.version, resolved.download_url
        );
        Ok(resolved)
    }

    /// First release in API order that has an asset, any stability.
    pub fn resolve_preview(&self) -> Result<ResolvedRelease> {
        let releases = self.fetch_releases(false)?;
        first_qualifying(&releases, StabilityPolicy::Preview).ok_or(
            UpdateError::NoReleaseFound {
                policy: StabilityPolicy::Preview,
            },
        )
    }

    /// The API's latest release if it has an asset, else the first stable
    /// release with an asset from the full list.
    pub fn resolve_stable(&self) -> Result<ResolvedRelease> {
        let latest = self.fetch_releases(true)?;
        if let Some(resolved) = latest.first().and_then(Release::resolve) {
            debug!("Latest release {} has assets", resolved.version);
            return Ok(resolved);
        }

        debug!("Latest release has no assets yet, scanning the full release list");
        let releases = self.fetch_releases(false)?;
        first_qualifying(&releases, StabilityPolicy::Stable).ok_or(UpdateError::NoReleaseFound {
            policy: StabilityPolicy::Stable,
        })
    }

    /// Fetch the full release list, or just the latest release.
    pub fn fetch_releases(&self, latest_only: bool) -> Result<Vec<Release>> {
        let url = if latest_only {
            self.config.latest_release_url()
        } else {
            self.config.releases_url()
        };

        let body = self.transport.fetch(&url)?;
        let releases = parse_releases(&body)?;
        debug!("Fetched {} release(s) from {}", releases.len(), url);
        Ok(releases)
    }
}

/// Parse an API body that is either one release object or an array of them.
pub fn parse_releases(body: &[u8]) -> Result<Vec<Release>> {
    let value: Value = serde_json::from_slice(body)?;

    match value {
        Value::Array(items) if items.is_empty() => {
            Err(UpdateError::Api("release list is empty".to_string()))
        }
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(UpdateError::from))
            .collect(),
        Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        Value::Null => Err(UpdateError::Api("no release data returned".to_string())),
        other => Err(UpdateError::Api(format!(
            "expected a release object or list, got {other}"
        ))),
    }
}

/// First release accepted by `policy` that has at least one asset.
fn first_qualifying(releases: &[Release], policy: StabilityPolicy) -> Option<ResolvedRelease> {
    releases
        .iter()
        .filter(|release| policy.accepts(release.stability()))
        .find_map(Release::resolve)
}
