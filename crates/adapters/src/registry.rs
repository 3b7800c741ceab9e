// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool registry: resolve, probe, and install external scanning tools.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dn_proc::Supervisor;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors from tool resolution and installation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    Unknown(String),
    /// Probe failed and installation did not produce a working binary.
    #[error("tool unavailable: {0}")]
    Unavailable(String),
    #[error("tool disabled: {0}")]
    Disabled(String),
}

/// One registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    /// Binary path; `~` expands to the home directory.
    pub binary_path: String,
    pub install_cmd: Option<String>,
    pub version_probe: Option<String>,
    pub category: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ToolSpec {
    fn go_tool(name: &str, module: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            binary_path: name.to_string(),
            install_cmd: Some(format!("go install -v {module}@latest")),
            version_probe: Some(format!("{name} -version")),
            category: category.to_string(),
            enabled: true,
        }
    }
}

/// Tool status for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStatus {
    pub name: String,
    pub category: String,
    pub installed: bool,
    pub version: Option<String>,
    pub enabled: bool,
}

/// Registry of external tools, keyed by name.
///
/// `ensure` is idempotent and memoizes both success and failure: a
/// missing tool is recorded once per registry lifetime so a scan does
/// not retry-storm the installer.
pub struct ToolRegistry {
    specs: HashMap<String, ToolSpec>,
    supervisor: Supervisor,
    /// name → installed verdict, memoized.
    memo: Mutex<HashMap<String, bool>>,
    /// Per-tool install locks so concurrent `ensure` calls deduplicate.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ToolRegistry {
    /// Registry with the built-in tool table.
    pub fn builtin() -> Self {
        let specs = [
            ToolSpec::go_tool("subfinder", "github.com/projectdiscovery/subfinder/v2/cmd/subfinder", "subdomain"),
            ToolSpec::go_tool("amass", "github.com/owasp-amass/amass/v4/...", "subdomain"),
            ToolSpec::go_tool("assetfinder", "github.com/tomnomnom/assetfinder", "subdomain"),
            ToolSpec {
                name: "findomain".to_string(),
                binary_path: "findomain".to_string(),
                install_cmd: None,
                version_probe: Some("findomain --version".to_string()),
                category: "subdomain".to_string(),
                enabled: true,
            },
            ToolSpec::go_tool("dnsx", "github.com/projectdiscovery/dnsx/cmd/dnsx", "dns"),
            ToolSpec::go_tool("httpx", "github.com/projectdiscovery/httpx/cmd/httpx", "http"),
            ToolSpec::go_tool("naabu", "github.com/projectdiscovery/naabu/v2/cmd/naabu", "ports"),
            ToolSpec {
                name: "nmap".to_string(),
                binary_path: "nmap".to_string(),
                install_cmd: None,
                version_probe: Some("nmap --version".to_string()),
                category: "ports".to_string(),
                enabled: true,
            },
            ToolSpec::go_tool("gau", "github.com/lc/gau/v2/cmd/gau", "urls"),
            ToolSpec::go_tool("waybackurls", "github.com/tomnomnom/waybackurls", "urls"),
            ToolSpec::go_tool("ffuf", "github.com/ffuf/ffuf/v2", "fuzzing"),
            ToolSpec::go_tool("nuclei", "github.com/projectdiscovery/nuclei/v3/cmd/nuclei", "vuln"),
        ];
        Self::from_specs(specs)
    }

    pub fn from_specs(specs: impl IntoIterator<Item = ToolSpec>) -> Self {
        Self {
            specs: specs.into_iter().map(|s| (s.name.clone(), s)).collect(),
            supervisor: Supervisor::new(),
            memo: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Apply overrides from a `tools.json` file when present.
    pub fn with_overrides(mut self, path: impl AsRef<std::path::Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return self;
        }
        match std::fs::read_to_string(path).map_err(|e| e.to_string()).and_then(|text| {
            serde_json::from_str::<HashMap<String, ToolSpec>>(&text).map_err(|e| e.to_string())
        }) {
            Ok(overrides) => {
                for (name, spec) in overrides {
                    self.specs.insert(name, spec);
                }
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "ignoring unreadable tools.json");
            }
        }
        self
    }

    fn spec(&self, name: &str) -> Result<&ToolSpec, ToolError> {
        self.specs.get(name).ok_or_else(|| ToolError::Unknown(name.to_string()))
    }

    /// Resolved binary path with `~` expansion.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ToolError> {
        let spec = self.spec(name)?;
        Ok(expand_home(&spec.binary_path))
    }

    /// Whether the binary is reachable, plus its version when probeable.
    pub async fn check(&self, name: &str) -> Result<(bool, Option<String>), ToolError> {
        let spec = self.spec(name)?;
        let binary = expand_home(&spec.binary_path);
        if which::which(&binary).is_err() {
            return Ok((false, None));
        }
        let version = match &spec.version_probe {
            Some(probe) => match self.supervisor.run_capture(probe.clone(), PROBE_TIMEOUT).await {
                Ok(stdout) => {
                    let line = stdout.lines().next().unwrap_or("").trim().to_string();
                    (!line.is_empty()).then_some(line)
                }
                Err(_) => None,
            },
            None => None,
        };
        Ok((true, version))
    }

    /// Make sure a tool is usable, installing it when missing.
    ///
    /// Idempotent; concurrent calls for the same tool collapse into one
    /// install attempt while the other callers wait on its verdict.
    pub async fn ensure(&self, name: &str) -> Result<(), ToolError> {
        let spec = self.spec(name)?;
        if !spec.enabled {
            return Err(ToolError::Disabled(name.to_string()));
        }
        if let Some(installed) = self.memo.lock().get(name).copied() {
            return verdict(name, installed);
        }

        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(name.to_string()).or_default())
        };
        let _install = lock.lock().await;

        // A concurrent caller may have settled the verdict while we waited.
        if let Some(installed) = self.memo.lock().get(name).copied() {
            return verdict(name, installed);
        }

        let (installed, _) = self.check(name).await?;
        if installed {
            self.memo.lock().insert(name.to_string(), true);
            return Ok(());
        }

        let installed = match &spec.install_cmd {
            Some(install_cmd) => {
                tracing::info!(tool = name, "installing missing tool");
                let ok = self
                    .supervisor
                    .run_capture(install_cmd.clone(), INSTALL_TIMEOUT)
                    .await
                    .is_ok()
                    && self.check(name).await.map(|(ok, _)| ok).unwrap_or(false);
                if !ok {
                    tracing::warn!(tool = name, "install did not produce a working binary");
                }
                ok
            }
            None => {
                tracing::warn!(tool = name, "tool missing and has no install command");
                false
            }
        };
        self.memo.lock().insert(name.to_string(), installed);
        verdict(name, installed)
    }

    /// Status of every registered tool.
    pub async fn list(&self) -> Vec<ToolStatus> {
        let mut statuses = Vec::with_capacity(self.specs.len());
        let mut names: Vec<_> = self.specs.keys().cloned().collect();
        names.sort();
        for name in names {
            let (installed, version) = self.check(&name).await.unwrap_or((false, None));
            let spec = &self.specs[&name];
            statuses.push(ToolStatus {
                name: spec.name.clone(),
                category: spec.category.clone(),
                installed,
                version,
                enabled: spec.enabled,
            });
        }
        statuses
    }
}

fn verdict(name: &str, installed: bool) -> Result<(), ToolError> {
    if installed {
        Ok(())
    } else {
        Err(ToolError::Unavailable(name.to_string()))
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
