// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events pushed to control-surface subscribers.

use dn_core::{NetworkStatus, ScanStatus};
use serde::{Deserialize, Serialize};

/// Progress and health events emitted by the engine, best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    ScanProgress {
        scan_id: String,
        stage: String,
        percent: u8,
    },
    ScanStatusChanged {
        scan_id: String,
        status: ScanStatus,
    },
    SystemStatus {
        network: NetworkStatus,
    },
}
