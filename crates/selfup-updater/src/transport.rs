//! Fetching bytes from URLs.
//!
//! The resolver and the installer only see the [`Transport`] trait. The
//! production implementation is [`HttpTransport`], a blocking `reqwest` client
//! that also serves `file://` URLs straight from disk.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};

/// Retry delay used when the rate-limit reset header is missing.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// A "fetch URL, get bytes" capability.
pub trait Transport {
    /// Fetch the whole body at `url` into memory.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    /// Write the body at `url` to `dest`, truncating any existing file.
    ///
    /// Returns the number of bytes written.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch(url)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        (**self).download(url, dest)
    }
}

/// Blocking HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a client carrying the configured `User-Agent` and timeout.
    pub fn new(config: &UpdaterConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let user_agent = HeaderValue::from_str(&config.user_agent())
            .map_err(|e| UpdateError::Network(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, user_agent);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| UpdateError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Sends a GET and turns error statuses into [`UpdateError`]s.
    fn get(&self, url: &str) -> Result<Response> {
        debug!("GET {}", url);
        let response = self.client.get(url).send()?;
        check_status(response, url)
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(path) = local_path(url) {
            return Ok(fs::read(path)?);
        }

        let body = self.get(url)?.bytes()?;
        Ok(body.to_vec())
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        if let Some(path) = local_path(url) {
            debug!("Copying {} to {}", path.display(), dest.display());
            return Ok(fs::copy(path, dest)?);
        }

        let mut response = self.get(url)?;
        let mut file = File::create(dest)?;
        let written = response.copy_to(&mut file)?;
        file.flush()?;
        file.sync_all()?;
        Ok(written)
    }
}

/// Maps `file://` URLs to local paths.
fn local_path(url: &str) -> Option<&Path> {
    url.strip_prefix("file://").map(Path::new)
}

/// Checks the response status, detecting GitHub rate limiting.
fn check_status(response: Response, url: &str) -> Result<Response> {
    let status = response.status();

    if status == StatusCode::FORBIDDEN
        && response
            .headers()
            .get("x-ratelimit-remaining")
            .is_some_and(|remaining| remaining.to_str().unwrap_or("1") == "0")
    {
        let retry_after = response
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|reset| {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                reset.saturating_sub(now)
            })
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

        return Err(UpdateError::RateLimited { retry_after });
    }

    if !status.is_success() {
        return Err(UpdateError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    Ok(response)
}
