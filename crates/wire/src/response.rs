// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::types::{FindingDto, ScanDto, SubdomainDto, SystemDto, TargetDto};

/// Response from the daemon to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Generic success.
    Ok,

    /// Health check response.
    Pong,

    /// Structured error with a taxonomy tag; never a stack trace.
    Error { kind: String, message: String },

    Target { target: TargetDto },
    Targets { targets: Vec<TargetDto> },

    Scan { scan: Box<ScanDto> },
    ScanQueued { scan_id: String },

    Subdomains { subdomains: Vec<SubdomainDto> },
    Findings { findings: Vec<FindingDto> },

    System { system: SystemDto },

    /// Queue snapshot.
    Queue {
        queued: usize,
        active: Vec<String>,
        paused: Vec<String>,
        process_paused: bool,
    },

    /// Event-push mode acknowledged; events follow until disconnect.
    Subscribed,

    /// A pushed engine event (scan progress or system status).
    Event { event: serde_json::Value },

    /// Daemon is shutting down.
    ShuttingDown,
}

impl Response {
    /// Tagged error helper.
    pub fn error(kind: dn_core::ErrorKind, message: impl Into<String>) -> Self {
        Response::Error { kind: kind.to_string(), message: message.into() }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
