// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders and helpers shared by other crates' tests.

use crate::artifact::{Finding, Severity};
use crate::scan::{Profile, Scan, ScanId, ScanStatus};
use crate::target::{Target, TargetId};

/// Build a target with sensible test defaults.
pub struct TargetBuilder {
    name: String,
    domain: String,
    exclusions: Vec<String>,
}

impl TargetBuilder {
    pub fn new() -> Self {
        Self {
            name: "acme".to_string(),
            domain: "example.com".to_string(),
            exclusions: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn exclusion(mut self, pattern: impl Into<String>) -> Self {
        self.exclusions.push(pattern.into());
        self
    }

    pub fn build(self) -> Target {
        let mut target = Target::new(self.name, self.domain, 1_700_000_000_000);
        target.exclusions = self.exclusions;
        target
    }
}

impl Default for TargetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a scan with sensible test defaults.
pub struct ScanBuilder {
    target_id: TargetId,
    profile: Profile,
    status: ScanStatus,
}

impl ScanBuilder {
    pub fn new(target_id: TargetId) -> Self {
        Self {
            target_id,
            profile: Profile::Normal,
            status: ScanStatus::Pending,
        }
    }

    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn status(mut self, status: ScanStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Scan {
        let mut scan = Scan::new(self.target_id, self.profile, 1_700_000_000_000);
        scan.status = self.status;
        scan
    }
}

/// A minimal finding for triage and store tests.
pub fn sample_finding(scan_id: ScanId) -> Finding {
    let mut finding = Finding::new(scan_id, "Exposed panel", Severity::High, "nuclei");
    finding.affected_url = Some("https://www.example.com/admin".to_string());
    finding.template_id = Some("exposed-panel".to_string());
    finding
}
