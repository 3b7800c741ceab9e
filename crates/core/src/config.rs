// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed per-scan configuration, built once at admission time.
//!
//! A profile expands into a closed config shape; nothing downstream merges
//! dictionaries at runtime.

use crate::scan::Profile;
use serde::{Deserialize, Serialize};

/// Default ports probed by the fast port-scan profile.
pub const TOP_PORTS: [u16; 31] = [
    80, 443, 8080, 8443, 3000, 8000, 8888, 9000, 5000, 7000, 22, 21, 23, 25, 53, 110, 143, 993,
    995, 3306, 5432, 6379, 27017, 9200, 5601, 9090, 9092, 8081, 8082, 8083, 8880,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdomainConfig {
    pub use_subfinder: bool,
    pub use_amass: bool,
    pub use_assetfinder: bool,
    pub use_findomain: bool,
    pub use_crtsh: bool,
    pub brute_force: bool,
    pub wordlist: String,
    pub permutations: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfig {
    pub wildcard_detection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub retries: u32,
    pub follow_redirects: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortScanType {
    Fast,
    Full,
    Custom,
}

crate::simple_display! {
    PortScanType {
        Fast => "fast",
        Full => "full",
        Custom => "custom",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub scan_type: PortScanType,
    /// Comma-separated port spec for `Custom` scans.
    pub ports: Option<String>,
    pub service_detection: bool,
    /// Hosts to pass through nmap service detection.
    pub service_detection_hosts: usize,
}

impl PortConfig {
    /// Port specification handed to the sweep tool.
    pub fn port_spec(&self) -> String {
        match self.scan_type {
            PortScanType::Full => "1-65535".to_string(),
            PortScanType::Custom => self
                .ports
                .clone()
                .unwrap_or_else(|| Self::top_ports_spec()),
            PortScanType::Fast => Self::top_ports_spec(),
        }
    }

    fn top_ports_spec() -> String {
        TOP_PORTS
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaybackConfig {
    pub use_gau: bool,
    pub use_waybackurls: bool,
    pub use_cdx_api: bool,
    /// Endpoint rows persisted per scan from historical URLs.
    pub max_saved_urls: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsConfig {
    /// JS files fetched and analyzed per scan.
    pub max_files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzConfig {
    pub enabled: bool,
    /// Live hosts fuzzed per scan.
    pub max_targets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NucleiConfig {
    /// Comma-separated severity filter passed to the scanner.
    pub severity: String,
    pub rate_limit: u32,
    pub timeout_secs: u64,
    pub update_templates: bool,
    pub tags: Option<String>,
    pub exclude_tags: Option<String>,
    pub llm_filter: bool,
}

/// Complete configuration for one scan, derived from a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub profile: Profile,
    /// Fail the scan on the first stage error instead of continuing.
    pub stop_on_error: bool,
    /// Requests per second ceiling passed to rate-aware tools.
    pub rate_limit: u32,
    /// Default per-tool timeout in seconds.
    pub tool_timeout_secs: u64,
    pub subdomain: SubdomainConfig,
    pub dns: DnsConfig,
    pub http: HttpConfig,
    pub ports: PortConfig,
    pub wayback: WaybackConfig,
    pub js: JsConfig,
    pub patterns: PatternConfig,
    pub fuzzing: FuzzConfig,
    pub nuclei: NucleiConfig,
}

impl ScanConfig {
    /// Expand a profile into its full config shape.
    pub fn for_profile(profile: Profile) -> Self {
        let (rate_limit, tool_timeout_secs) = match profile {
            Profile::Stealth => (10, 600),
            Profile::Normal => (50, 300),
            Profile::Aggressive => (200, 120),
        };
        Self {
            profile,
            stop_on_error: false,
            rate_limit,
            tool_timeout_secs,
            subdomain: SubdomainConfig {
                use_subfinder: true,
                // Active amass enumeration is too noisy for stealth
                use_amass: profile != Profile::Stealth,
                use_assetfinder: true,
                use_findomain: true,
                use_crtsh: true,
                brute_force: profile == Profile::Aggressive,
                wordlist: "subdomains-medium".to_string(),
                permutations: profile == Profile::Aggressive,
            },
            dns: DnsConfig { wildcard_detection: true },
            http: HttpConfig {
                timeout_secs: 10,
                retries: 1,
                follow_redirects: true,
            },
            ports: PortConfig {
                scan_type: if profile == Profile::Aggressive {
                    PortScanType::Full
                } else {
                    PortScanType::Fast
                },
                ports: None,
                service_detection: profile != Profile::Stealth,
                service_detection_hosts: 10,
            },
            wayback: WaybackConfig {
                use_gau: true,
                use_waybackurls: true,
                use_cdx_api: true,
                max_saved_urls: 1000,
            },
            js: JsConfig { max_files: 50 },
            patterns: PatternConfig { enabled: true },
            fuzzing: FuzzConfig {
                enabled: profile != Profile::Stealth,
                max_targets: 5,
            },
            nuclei: NucleiConfig {
                severity: "critical,high,medium".to_string(),
                rate_limit,
                timeout_secs: 30,
                update_templates: profile != Profile::Stealth,
                tags: None,
                exclude_tags: None,
                llm_filter: true,
            },
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::for_profile(Profile::Normal)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
