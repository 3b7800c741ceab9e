// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the pipeline and the control surface.

use serde::{Deserialize, Serialize};

/// Classification tag attached to every surfaced error.
///
/// Each kind has distinct handling: tool failures are absorbed per stage,
/// checkpoint corruption restarts the scan, store failures kill it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Probe failure or transport timeout; drives the outage state machine.
    TransientNetwork,
    /// Missing binary or permission denied.
    ToolSpawnFailed,
    /// Tool ran but exited non-zero; partial output is still consumed.
    ToolExitNonZero,
    /// Tool exceeded its budget; treated like a non-zero exit.
    ToolTimeout,
    /// Digest mismatch or unparseable checkpoint.
    CheckpointCorrupt,
    /// Unexpected error inside stage code.
    StageException,
    /// User-initiated stop; recorded as `failed` with "stopped by user".
    StopRequested,
    /// Persistent store unavailable; fatal to the scan.
    StoreWriteFailure,
    /// Anything the taxonomy does not name.
    Internal,
}

crate::simple_display! {
    ErrorKind {
        TransientNetwork => "transient_network",
        ToolSpawnFailed => "tool_spawn_failed",
        ToolExitNonZero => "tool_exit_non_zero",
        ToolTimeout => "tool_timeout",
        CheckpointCorrupt => "checkpoint_corrupt",
        StageException => "stage_exception",
        StopRequested => "stop_requested",
        StoreWriteFailure => "store_write_failure",
        Internal => "internal",
    }
}

/// Error message recorded when a scan is stopped by the user.
///
/// Persisted scan history predates a dedicated cancelled status, so the
/// wording is load-bearing.
pub const STOPPED_BY_USER: &str = "stopped by user";
