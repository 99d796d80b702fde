//! Configuration types for the update system.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stability::Stability;

/// Default hosting API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which releases an update may pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityPolicy {
    /// Only releases whose version classifies as stable.
    #[default]
    Stable,
    /// Any release, including alpha, beta, rc and dev builds.
    Preview,
}

impl StabilityPolicy {
    /// Check if a release of the given stability is acceptable.
    #[must_use]
    pub fn accepts(&self, stability: Stability) -> bool {
        match self {
            Self::Stable => stability == Stability::Stable,
            Self::Preview => true,
        }
    }

    /// Get a human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Preview => "preview",
        }
    }
}

impl fmt::Display for StabilityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Settings shared by the resolver, the transport and the installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Repository in `owner/name` form.
    pub repository: String,

    /// Base URL of the GitHub-compatible API, without trailing slash.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Version string of the running executable, compared verbatim to tags.
    pub current_version: String,

    /// Application name used in the `User-Agent` header.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Timeout applied to every request.
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub request_timeout: Duration,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_app_name() -> String {
    crate::APP_NAME.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

impl UpdaterConfig {
    /// Creates a configuration for `repository` running `current_version`.
    #[must_use]
    pub fn new(repository: impl Into<String>, current_version: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            api_base_url: default_api_base_url(),
            current_version: current_version.into(),
            app_name: default_app_name(),
            request_timeout: default_timeout(),
        }
    }

    /// Point the resolver at a different API host (mirrors, GitHub Enterprise).
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the version the installer compares against.
    #[must_use]
    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = version.into();
        self
    }

    /// Override the application name sent in the `User-Agent` header.
    #[must_use]
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// URL of the full release list.
    #[must_use]
    pub fn releases_url(&self) -> String {
        format!("{}/repos/{}/releases", self.api_base_url, self.repository)
    }

    /// URL of the single "latest" release.
    #[must_use]
    pub fn latest_release_url(&self) -> String {
        format!("{}/latest", self.releases_url())
    }

    /// `User-Agent` naming the application, its version and the repository.
    #[must_use]
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} (+https://github.com/{})",
            self.app_name, self.current_version, self.repository
        )
    }
}
