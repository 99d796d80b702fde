//! Release records as exposed by the hosting API.

use serde::{Deserialize, Serialize};

use crate::stability::{Stability, classify};

/// A published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// The release tag (e.g., "v1.0.0"). Not required to be strict semver.
    #[serde(rename = "tag_name")]
    pub tag: String,

    /// The release title.
    #[serde(default)]
    pub name: Option<String>,

    /// Whether the API flags this release as a pre-release.
    #[serde(default)]
    pub prerelease: bool,

    /// Whether this is a draft release.
    #[serde(default)]
    pub draft: bool,

    /// Downloadable files, in the order the API returned them.
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Release {
    /// Stability of the tag as judged by the classifier.
    ///
    /// The API's own `prerelease` flag is not consulted.
    #[must_use]
    pub fn stability(&self) -> Stability {
        classify(&self.tag)
    }

    /// The first asset, which is the one an update installs.
    #[must_use]
    pub fn first_asset(&self) -> Option<&Asset> {
        self.assets.first()
    }

    /// The (version, URL) pair this release resolves to, if it has an asset.
    #[must_use]
    pub fn resolve(&self) -> Option<ResolvedRelease> {
        self.first_asset().map(|asset| ResolvedRelease {
            version: self.tag.clone(),
            download_url: asset.download_url.clone(),
        })
    }
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Direct download URL.
    #[serde(rename = "browser_download_url")]
    pub download_url: String,

    /// Asset file name.
    #[serde(default)]
    pub name: Option<String>,
}

/// The release an update will install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    /// Tag of the release, compared verbatim to the running version.
    pub version: String,
    /// URL of the release's first asset.
    pub download_url: String,
}
