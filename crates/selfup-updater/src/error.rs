//! Error types for the self-update system.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::StabilityPolicy;

/// What a failed writability check was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    /// The directory that receives the temporary download.
    Directory,
    /// The running executable itself.
    Executable,
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => write!(f, "directory"),
            Self::Executable => write!(f, "executable"),
        }
    }
}

/// Errors that can occur during the update process.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpdateError {
    /// The hosting API returned data that could not be used.
    #[error("release API returned unusable data: {0}")]
    Api(String),

    /// No release satisfies the stability policy and has a downloadable asset.
    #[error("no {policy} release with a downloadable asset was found")]
    NoReleaseFound {
        /// Policy the releases were filtered with.
        policy: StabilityPolicy,
    },

    /// Self-update was invoked from a development build.
    #[error(
        "self-update only works on installed release builds, {} lives in a cargo build directory",
        path.display()
    )]
    NotPackaged {
        /// Path of the running executable.
        path: PathBuf,
    },

    /// The temp directory or the executable cannot be written.
    #[error(
        "the {target} {} is not writable, try again with elevated privileges (sudo or an administrator shell)",
        path.display()
    )]
    PermissionDenied {
        /// Path that failed the check.
        path: PathBuf,
        /// Whether the directory or the executable failed.
        target: WriteTarget,
    },

    /// Network request failed.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("request to {url} failed with HTTP status {status}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// GitHub API rate limit exceeded.
    #[error("release API rate limit exceeded, retry after {retry_after} seconds")]
    RateLimited {
        /// Seconds until rate limit resets.
        retry_after: u64,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(String),
}

impl UpdateError {
    /// Returns a short message suitable for end users.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(_) | Self::Http { .. } => {
                "Could not reach the release server. Please check your internet connection."
            }
            Self::RateLimited { .. } => "Release API rate limit reached. Please try again later.",
            Self::NoReleaseFound { .. } => "No suitable release is available yet.",
            Self::NotPackaged { .. } => "Self-update is not available for development builds.",
            Self::PermissionDenied { .. } => {
                "Not allowed to replace the executable. Re-run with elevated privileges."
            }
            Self::Api(_) | Self::Io(_) => "An unexpected error occurred.",
        }
    }

    /// Returns whether this error is potentially recoverable with a retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Http { .. } | Self::RateLimited { .. } | Self::Io(_)
        )
    }
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        match (err.status(), err.url()) {
            (Some(status), Some(url)) => Self::Http {
                status: status.as_u16(),
                url: url.to_string(),
            },
            _ => Self::Network(err.to_string()),
        }
    }
}

impl From<std::io::Error> for UpdateError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for UpdateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Api(err.to_string())
    }
}

/// Result type alias for update operations.
pub type Result<T> = std::result::Result<T, UpdateError>;
