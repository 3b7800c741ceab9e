// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide health snapshot

use serde::{Deserialize, Serialize};

/// Upstream connectivity as seen by the resilience monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    #[default]
    Online,
    Offline,
}

crate::simple_display! {
    NetworkStatus {
        Online => "online",
        Offline => "offline",
    }
}

/// Single-row health snapshot, written by the resilience monitor only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SystemState {
    pub network_status: NetworkStatus,
    pub battery_level: Option<u8>,
    #[serde(default)]
    pub is_charging: bool,
    /// Device temperature in celsius, when readable.
    pub temperature: Option<f64>,
    /// Triage model currently loaded, if any.
    pub llm_model: Option<String>,
    pub free_memory_mb: Option<u64>,
    pub updated_at_ms: u64,
}
