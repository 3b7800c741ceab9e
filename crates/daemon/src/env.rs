// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem layout under the working-directory root.

use std::path::{Path, PathBuf};

/// Directory layout the daemon creates on startup.
#[derive(Debug, Clone)]
pub struct Paths {
    pub root: PathBuf,
    pub data: PathBuf,
    pub logs: PathBuf,
    pub reports: PathBuf,
    pub wordlists: PathBuf,
    /// Per-scan checkpoint files.
    pub state: PathBuf,
    pub db: PathBuf,
    pub socket: PathBuf,
    pub lock: PathBuf,
    pub tools_config: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data: root.join("data"),
            logs: root.join("logs"),
            reports: root.join("reports"),
            wordlists: root.join("wordlists"),
            state: root.join("data").join("state"),
            db: root.join("data").join("dragnet.db"),
            socket: root.join("data").join("dragnetd.sock"),
            lock: root.join("data").join("dragnetd.lock"),
            tools_config: root.join("tools.json"),
            root,
        }
    }

    /// Create every directory the daemon expects.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.data, &self.logs, &self.reports, &self.wordlists, &self.state] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Root directory: `$DRAGNET_HOME`, else `~/.dragnet`, else `./.dragnet`.
pub fn default_root() -> PathBuf {
    if let Ok(home) = std::env::var("DRAGNET_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .map(|h| h.join(".dragnet"))
        .unwrap_or_else(|| Path::new(".dragnet").to_path_buf())
}
