// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint payload shape

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Durable snapshot of scan progress, written at every stage boundary.
///
/// The `checksum` field is the first 16 hex digits of SHA-256 over the
/// canonical JSON of the payload with `checksum` removed; the checkpoint
/// store computes and verifies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPayload {
    pub scan_id: String,
    /// Epoch milliseconds at save time.
    pub timestamp: u64,
    /// Last completed stage.
    pub current_module: String,
    pub completed_modules: Vec<String>,
    pub pending_modules: Vec<String>,
    /// Reserved per-stage scratch state.
    #[serde(default)]
    pub module_state: HashMap<String, Value>,
    /// Stage name → serialized stage result, rehydrated on resume.
    #[serde(default)]
    pub results_cache: HashMap<String, Value>,
    #[serde(default)]
    pub checksum: String,
}

impl CheckpointPayload {
    /// `completed_modules` must be a prefix of the static stage order for
    /// the restored remaining-stage computation to be sound.
    pub fn is_order_prefix(&self, order: &[&str]) -> bool {
        self.completed_modules.len() <= order.len()
            && self
                .completed_modules
                .iter()
                .zip(order.iter())
                .all(|(a, b)| a == b)
    }
}
