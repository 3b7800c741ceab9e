// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain artifacts produced by pipeline stages

use crate::scan::ScanId;
use serde::{Deserialize, Serialize};

/// Finding severity, ordered least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

crate::simple_display! {
    Severity {
        Info => "info",
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

crate::simple_from_str! {
    Severity {
        "info" => Info,
        "low" => Low,
        "medium" => Medium,
        "high" => High,
        "critical" => Critical,
    }
}

/// A discovered hostname within scope of a scan.
///
/// Unique per (scan, hostname); later stages fill in resolution and
/// liveness data on the same row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subdomain {
    pub scan_id: ScanId,
    pub hostname: String,
    /// Resolved addresses in resolver order.
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub is_live: bool,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    /// Detected technology tags.
    #[serde(default)]
    pub tech: Vec<String>,
    /// Tools that discovered this hostname.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl Subdomain {
    pub fn new(scan_id: ScanId, hostname: impl Into<String>) -> Self {
        Self {
            scan_id,
            hostname: hostname.into(),
            addresses: Vec::new(),
            is_live: false,
            status_code: None,
            title: None,
            tech: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }
}

/// A URL observed under a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub scan_id: ScanId,
    pub url: String,
    pub method: String,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// Query parameter names seen on this URL.
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Vulnerability-indicator pattern classes this URL matched.
    #[serde(default)]
    pub pattern_matches: Vec<String>,
    /// Tool or source that discovered this URL.
    pub discovered_via: String,
}

impl Endpoint {
    pub fn new(scan_id: ScanId, url: impl Into<String>, discovered_via: impl Into<String>) -> Self {
        Self {
            scan_id,
            url: url.into(),
            method: "GET".to_string(),
            status_code: None,
            content_type: None,
            content_length: None,
            parameters: Vec::new(),
            pattern_matches: Vec::new(),
            discovered_via: discovered_via.into(),
        }
    }
}

/// A candidate vulnerability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub scan_id: ScanId,
    pub title: String,
    pub severity: Severity,
    pub cvss_score: Option<f64>,
    pub affected_url: Option<String>,
    pub parameter: Option<String>,
    pub evidence: Option<String>,
    /// Commands that reproduce the finding.
    #[serde(default)]
    pub poc_commands: Vec<String>,
    pub tool_source: String,
    pub template_id: Option<String>,
    #[serde(default)]
    pub false_positive: bool,
    /// Triage rationale, when the finding has been reviewed.
    pub triage_rationale: Option<String>,
    pub triage_model: Option<String>,
}

impl Finding {
    pub fn new(
        scan_id: ScanId,
        title: impl Into<String>,
        severity: Severity,
        tool_source: impl Into<String>,
    ) -> Self {
        Self {
            scan_id,
            title: title.into(),
            severity,
            cvss_score: None,
            affected_url: None,
            parameter: None,
            evidence: None,
            poc_commands: Vec::new(),
            tool_source: tool_source.into(),
            template_id: None,
            false_positive: false,
            triage_rationale: None,
            triage_model: None,
        }
    }
}

/// Transport protocol of an observed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
}

crate::simple_display! {
    Protocol {
        Tcp => "tcp",
        Udp => "udp",
    }
}

/// Observed state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    Open,
    Filtered,
    Closed,
}

crate::simple_display! {
    PortState {
        Open => "open",
        Filtered => "filtered",
        Closed => "closed",
    }
}

/// An open port on an IP seen during a scan.
///
/// Unique per (scan, ip, port, protocol).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub scan_id: ScanId,
    pub ip: String,
    pub port: u16,
    pub protocol: Protocol,
    pub service: Option<String>,
    pub version: Option<String>,
    pub state: PortState,
}

impl Port {
    pub fn open(scan_id: ScanId, ip: impl Into<String>, port: u16) -> Self {
        Self {
            scan_id,
            ip: ip.into(),
            port,
            protocol: Protocol::Tcp,
            service: None,
            version: None,
            state: PortState::Open,
        }
    }
}
