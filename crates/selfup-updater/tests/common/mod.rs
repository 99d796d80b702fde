//! Shared fixtures for the updater integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::{Value, json};

use selfup_updater::{Result, Transport, UpdateError, UpdaterConfig};

pub const API: &str = "https://api.test";
pub const REPO: &str = "acme/tool";

pub fn config(current_version: &str) -> UpdaterConfig {
    UpdaterConfig::new(REPO, current_version).with_api_base_url(API)
}

pub fn releases_url() -> String {
    format!("{API}/repos/{REPO}/releases")
}

pub fn latest_url() -> String {
    format!("{API}/repos/{REPO}/releases/latest")
}

pub fn asset_url(tag: &str) -> String {
    format!("https://downloads.test/{tag}/tool")
}

/// A release document as the API returns it.
pub fn release(tag: &str, with_asset: bool) -> Value {
    let assets = if with_asset {
        json!([{ "name": "tool", "browser_download_url": asset_url(tag) }])
    } else {
        json!([])
    };
    json!({
        "tag_name": tag,
        "name": tag,
        "prerelease": false,
        "draft": false,
        "assets": assets,
    })
}

/// Canned responses keyed by URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct MockTransport {
    documents: HashMap<String, Vec<u8>>,
    files: HashMap<String, Vec<u8>>,
    failing_downloads: HashMap<String, u16>,
    fetches: RefCell<Vec<String>>,
    downloads: Cell<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: impl Into<String>, body: &Value) -> Self {
        self.documents.insert(url.into(), body.to_string().into_bytes());
        self
    }

    pub fn with_raw_document(mut self, url: impl Into<String>, body: &[u8]) -> Self {
        self.documents.insert(url.into(), body.to_vec());
        self
    }

    pub fn with_file(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.files.insert(url.into(), bytes);
        self
    }

    /// The download writes a partial file and then fails with `status`.
    pub fn with_failing_download(mut self, url: impl Into<String>, status: u16) -> Self {
        self.failing_downloads.insert(url.into(), status);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetches.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.fetches.borrow().len() + self.downloads.get()
    }
}

impl Transport for MockTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetches.borrow_mut().push(url.to_string());
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| UpdateError::Http {
                status: 404,
                url: url.to_string(),
            })
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.downloads.set(self.downloads.get() + 1);
        if let Some(&status) = self.failing_downloads.get(url) {
            fs::write(dest, b"partial")?;
            return Err(UpdateError::Http {
                status,
                url: url.to_string(),
            });
        }
        let bytes = self.files.get(url).ok_or_else(|| UpdateError::Http {
            status: 404,
            url: url.to_string(),
        })?;
        fs::write(dest, bytes)?;
        Ok(bytes.len() as u64)
    }
}
