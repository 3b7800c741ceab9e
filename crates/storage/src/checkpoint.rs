// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dual-backed checkpoint persistence.
//!
//! Every checkpoint is written to a per-scan file under the state
//! directory first, then to the scan row's blob column. Readers prefer
//! the file, so the bounded inconsistency is always "newer file, older
//! row". A payload whose recomputed digest does not match is rejected
//! outright; the row copy is only consulted when the file is missing.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use dn_core::{CheckpointPayload, ScanId};

use crate::error::StoreError;
use crate::store::ArtifactStore;

/// Number of hex digits kept from the SHA-256 digest.
const DIGEST_LEN: usize = 16;

/// Per-scan checkpoint persistence over a state directory and the scan row.
pub struct CheckpointStore {
    state_dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let state_dir = state_dir.into();
        std::fs::create_dir_all(&state_dir)?;
        Ok(Self { state_dir })
    }

    pub fn file_path(&self, scan_id: &ScanId) -> PathBuf {
        self.state_dir.join(format!("{}.json", scan_id))
    }

    /// Persist a checkpoint: stamp the digest, write the file, then the row.
    pub fn save(
        &self,
        store: &ArtifactStore,
        payload: &mut CheckpointPayload,
    ) -> Result<(), StoreError> {
        payload.checksum = digest(payload)?;
        let json = serde_json::to_string_pretty(payload)?;
        let scan_id = ScanId::from_string(payload.scan_id.clone());

        std::fs::write(self.file_path(&scan_id), &json)?;
        store.save_checkpoint_blob(&scan_id, &json)?;
        tracing::debug!(scan_id = %payload.scan_id, stage = %payload.current_module, "checkpoint saved");
        Ok(())
    }

    /// Load the checkpoint for a scan, or `None` when there is nothing to
    /// resume from (never written, cleared, or failed verification).
    pub fn load(
        &self,
        store: &ArtifactStore,
        scan_id: &ScanId,
    ) -> Result<Option<CheckpointPayload>, StoreError> {
        let path = self.file_path(scan_id);
        if path.exists() {
            return Ok(parse_verified(&std::fs::read_to_string(&path)?, scan_id, "file"));
        }

        let Some(scan) = store.scan(scan_id)? else {
            return Ok(None);
        };
        match scan.checkpoint {
            Some(blob) => Ok(parse_verified(&blob, scan_id, "row")),
            None => Ok(None),
        }
    }

    /// Remove both copies after successful completion.
    pub fn clear(&self, store: &ArtifactStore, scan_id: &ScanId) -> Result<(), StoreError> {
        let path = self.file_path(scan_id);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        store.clear_checkpoint_blob(scan_id)?;
        Ok(())
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }
}

fn parse_verified(text: &str, scan_id: &ScanId, source: &str) -> Option<CheckpointPayload> {
    let payload: CheckpointPayload = match serde_json::from_str(text) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::warn!(%scan_id, source, %error, "discarding unparseable checkpoint");
            return None;
        }
    };
    if !verify(&payload) {
        tracing::warn!(%scan_id, source, "discarding checkpoint with digest mismatch");
        return None;
    }
    Some(payload)
}

/// First 16 hex of SHA-256 over the canonical JSON of the payload with the
/// `checksum` field removed. serde_json sorts object keys, so the encoding
/// is deterministic.
pub fn digest(payload: &CheckpointPayload) -> Result<String, StoreError> {
    let mut value = serde_json::to_value(payload)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("checksum");
    }
    let canonical = serde_json::to_string(&value)?;
    let full = format!("{:x}", Sha256::digest(canonical.as_bytes()));
    Ok(full[..DIGEST_LEN].to_string())
}

/// Whether the stored checksum matches the recomputed digest.
pub fn verify(payload: &CheckpointPayload) -> bool {
    match digest(payload) {
        Ok(expected) => !payload.checksum.is_empty() && payload.checksum == expected,
        Err(_) => false,
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
