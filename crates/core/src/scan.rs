// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan identifier, status machine, and stage order

use crate::target::TargetId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a scan instance.
    ///
    /// Each scan run gets a unique ID used to track its state, query its
    /// status, and name its checkpoint file.
    pub struct ScanId("scn-");
}

/// The fixed, linear ordering of pipeline stages executed per scan.
///
/// Resume logic indexes into this order, so entries must never be
/// reordered; appending new stages at the end is safe.
pub const STAGE_ORDER: [&str; 9] = [
    "subdomain_enum",
    "dns_resolution",
    "http_probe",
    "port_scan",
    "wayback_urls",
    "js_analysis",
    "gf_patterns",
    "fuzzing",
    "nuclei_scan",
];

/// Index of a stage in [`STAGE_ORDER`], or `None` for an unknown name.
pub fn stage_index(name: &str) -> Option<usize> {
    STAGE_ORDER.iter().position(|s| *s == name)
}

/// Status of a scan.
///
/// `Completed` and `Failed` are absorbing; a scan may oscillate
/// running↔paused arbitrarily many times before reaching one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    /// Whether a transition to `next` is legal.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        use ScanStatus::*;
        match (self, next) {
            (Pending, Running) => true,
            (Pending, Failed) => true,
            (Running, Paused) | (Paused, Running) => true,
            (Running, Completed) | (Running, Failed) => true,
            (Paused, Failed) => true,
            _ => false,
        }
    }
}

crate::simple_display! {
    ScanStatus {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
    }
}

crate::simple_from_str! {
    ScanStatus {
        "pending" => Pending,
        "running" => Running,
        "paused" => Paused,
        "completed" => Completed,
        "failed" => Failed,
    }
}

/// Named bundle of per-stage tuning (rate, timeouts, tool toggles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Stealth,
    #[default]
    Normal,
    Aggressive,
}

crate::simple_display! {
    Profile {
        Stealth => "stealth",
        Normal => "normal",
        Aggressive => "aggressive",
    }
}

crate::simple_from_str! {
    Profile {
        "stealth" => Stealth,
        "normal" => Normal,
        "aggressive" => Aggressive,
    }
}

/// A scan instance: one execution of the stage pipeline against a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: ScanId,
    pub target_id: TargetId,
    pub profile: Profile,
    pub status: ScanStatus,
    /// Per-stage progress, 0–100.
    #[serde(default)]
    pub progress: HashMap<String, u8>,
    /// Stage currently executing (or last executed).
    pub current_stage: Option<String>,
    pub error: Option<String>,
    /// True when this run was rehydrated from a checkpoint.
    #[serde(default)]
    pub is_resumed: bool,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    /// Opaque checkpoint blob; non-null iff at least one stage boundary
    /// was crossed.
    pub checkpoint: Option<String>,
}

impl Scan {
    pub fn new(target_id: TargetId, profile: Profile, epoch_ms: u64) -> Self {
        Self {
            id: ScanId::new(),
            target_id,
            profile,
            status: ScanStatus::Pending,
            progress: HashMap::new(),
            current_stage: None,
            error: None,
            is_resumed: false,
            created_at_ms: epoch_ms,
            started_at_ms: None,
            completed_at_ms: None,
            checkpoint: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
