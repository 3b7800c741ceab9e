// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target scope declarations

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a target.
    pub struct TargetId("tgt-");
}

/// A target is a scope declaration: the primary domain plus the patterns
/// and address ranges the engagement is allowed to touch.
///
/// Immutable after creation except for scope edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub primary_domain: String,
    /// Include-list of scope patterns (e.g. `*.example.com`).
    #[serde(default)]
    pub scope: Vec<String>,
    /// Exclude-list of patterns that must never be scanned.
    #[serde(default)]
    pub exclusions: Vec<String>,
    /// Known IP ranges in CIDR notation.
    #[serde(default)]
    pub ip_ranges: Vec<String>,
    /// Known ASNs.
    #[serde(default)]
    pub asns: Vec<String>,
    pub created_at_ms: u64,
}

impl Target {
    pub fn new(name: impl Into<String>, primary_domain: impl Into<String>, epoch_ms: u64) -> Self {
        Self {
            id: TargetId::new(),
            name: name.into(),
            primary_domain: primary_domain.into(),
            scope: Vec::new(),
            exclusions: Vec::new(),
            ip_ranges: Vec::new(),
            asns: Vec::new(),
            created_at_ms: epoch_ms,
        }
    }

    /// Check a hostname against the exclude-list.
    ///
    /// A pattern with a leading `*.` matches any subdomain of its suffix;
    /// anything else must match exactly.
    pub fn is_excluded(&self, hostname: &str) -> bool {
        self.exclusions.iter().any(|pat| {
            if let Some(suffix) = pat.strip_prefix("*.") {
                hostname == suffix || hostname.ends_with(&format!(".{suffix}"))
            } else {
                hostname == pat
            }
        })
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
