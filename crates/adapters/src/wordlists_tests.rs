// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn missing_wordlist_has_no_path() {
    let dir = tempdir().unwrap();
    let wordlists = WordlistDir::new(dir.path()).unwrap();
    assert!(wordlists.path("subdomains-medium").is_none());
    assert!(wordlists.path("unknown-name").is_none());
}

#[test]
fn present_wordlist_resolves() {
    let dir = tempdir().unwrap();
    let wordlists = WordlistDir::new(dir.path()).unwrap();
    std::fs::write(dir.path().join("subdomains-top1million-20000.txt"), "www\napi\n").unwrap();

    let path = wordlists.path("subdomains-medium").unwrap();
    assert!(path.ends_with("subdomains-top1million-20000.txt"));
}

#[tokio::test]
async fn ensure_returns_existing_file_without_network() {
    let dir = tempdir().unwrap();
    let wordlists = WordlistDir::new(dir.path()).unwrap();
    std::fs::write(dir.path().join("raft-medium-files.txt"), "robots.txt\n").unwrap();

    let http = reqwest::Client::new();
    let path = wordlists.ensure("files", &http).await.unwrap();
    assert!(path.ends_with("raft-medium-files.txt"));
}

#[test]
fn custom_catalog_overrides_defaults() {
    let dir = tempdir().unwrap();
    let mut catalog = HashMap::new();
    catalog.insert(
        "tiny".to_string(),
        WordlistSource { file: "tiny.txt".to_string(), url: None, sha256: None },
    );
    let wordlists = WordlistDir::new(dir.path()).unwrap().with_catalog(catalog);

    std::fs::write(dir.path().join("tiny.txt"), "a\n").unwrap();
    assert!(wordlists.path("tiny").is_some());
    assert!(wordlists.path("subdomains-medium").is_none());
}
