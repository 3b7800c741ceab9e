// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::types::TargetSpec;

/// Request from a client to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Health check.
    Ping,

    /// Register a new target scope.
    CreateTarget { spec: TargetSpec },
    GetTarget { id: String },
    ListTargets,
    DeleteTarget { id: String },

    /// Admit a scan against a target.
    CreateScan {
        target_id: String,
        #[serde(default)]
        profile: Option<String>,
        #[serde(default)]
        stop_on_error: bool,
    },
    GetScan { id: String },
    PauseScan { id: String },
    ResumeScan { id: String },
    StopScan { id: String },

    /// Read-only listings for a scan.
    ScanSubdomains { id: String },
    ScanFindings { id: String },

    /// System-wide operations.
    SystemStatus,
    SystemPause,
    SystemResume,
    QueueStatus,

    /// Switch this connection into event-push mode.
    Subscribe,

    Shutdown,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
