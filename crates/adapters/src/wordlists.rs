// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named wordlists under the workspace `wordlists/` directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where a wordlist comes from when it is not already on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordlistSource {
    /// File name under the wordlist directory.
    pub file: String,
    pub url: Option<String>,
    /// Expected SHA-256, checked after download (mismatch warns only).
    pub sha256: Option<String>,
}

/// Wordlist lookup and download-on-demand.
pub struct WordlistDir {
    dir: PathBuf,
    catalog: HashMap<String, WordlistSource>,
}

impl WordlistDir {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, catalog: default_catalog() })
    }

    pub fn with_catalog(mut self, catalog: HashMap<String, WordlistSource>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a named wordlist if it exists on disk.
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        let file = self.catalog.get(name).map(|s| s.file.clone())?;
        let path = self.dir.join(file);
        path.exists().then_some(path)
    }

    /// Path for a named wordlist, downloading it first when missing.
    pub async fn ensure(&self, name: &str, http: &reqwest::Client) -> Option<PathBuf> {
        if let Some(path) = self.path(name) {
            return Some(path);
        }
        let source = self.catalog.get(name)?;
        let url = source.url.as_deref()?;
        let path = self.dir.join(&source.file);

        tracing::info!(wordlist = name, url, "downloading wordlist");
        let body = match http.get(url).send().await.and_then(|r| r.error_for_status()) {
            Ok(response) => match response.bytes().await {
                Ok(body) => body,
                Err(error) => {
                    tracing::warn!(wordlist = name, %error, "wordlist download failed");
                    return None;
                }
            },
            Err(error) => {
                tracing::warn!(wordlist = name, %error, "wordlist download failed");
                return None;
            }
        };

        if let Some(expected) = &source.sha256 {
            let actual = format!("{:x}", Sha256::digest(&body));
            if &actual != expected {
                tracing::warn!(wordlist = name, "wordlist checksum mismatch");
            }
        }

        if let Err(error) = std::fs::write(&path, &body) {
            tracing::warn!(wordlist = name, %error, "failed to write wordlist");
            return None;
        }
        Some(path)
    }
}

fn default_catalog() -> HashMap<String, WordlistSource> {
    let raw = [
        (
            "subdomains-medium",
            "subdomains-top1million-20000.txt",
            "https://raw.githubusercontent.com/danielmiessler/SecLists/master/Discovery/DNS/subdomains-top1million-20000.txt",
        ),
        (
            "directories",
            "directory-list-2.3-medium.txt",
            "https://raw.githubusercontent.com/danielmiessler/SecLists/master/Discovery/Web-Content/directory-list-2.3-medium.txt",
        ),
        (
            "files",
            "raft-medium-files.txt",
            "https://raw.githubusercontent.com/danielmiessler/SecLists/master/Discovery/Web-Content/raft-medium-files.txt",
        ),
    ];
    raw.into_iter()
        .map(|(name, file, url)| {
            (
                name.to_string(),
                WordlistSource {
                    file: file.to_string(),
                    url: Some(url.to_string()),
                    sha256: None,
                },
            )
        })
        .collect()
}

#[cfg(test)]
#[path = "wordlists_tests.rs"]
mod tests;
