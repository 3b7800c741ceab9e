// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dn_core::test_support::{ScanBuilder, TargetBuilder};
use dn_core::{CheckpointPayload, Scan, STAGE_ORDER};
use std::collections::HashMap;
use tempfile::tempdir;

fn payload_for(scan: &Scan, completed: &[&str]) -> CheckpointPayload {
    let mut results_cache = HashMap::new();
    for stage in completed {
        results_cache.insert(stage.to_string(), serde_json::json!({"total": 1}));
    }
    CheckpointPayload {
        scan_id: scan.id.to_string(),
        timestamp: 1_700_000_000_000,
        current_module: completed.last().unwrap_or(&"").to_string(),
        completed_modules: completed.iter().map(|s| s.to_string()).collect(),
        pending_modules: STAGE_ORDER[completed.len()..].iter().map(|s| s.to_string()).collect(),
        module_state: HashMap::new(),
        results_cache,
        checksum: String::new(),
    }
}

fn fixture() -> (tempfile::TempDir, CheckpointStore, ArtifactStore, Scan) {
    let dir = tempdir().unwrap();
    let checkpoints = CheckpointStore::new(dir.path().join("state")).unwrap();
    let store = ArtifactStore::in_memory().unwrap();
    let target = TargetBuilder::new().build();
    store.create_target(&target).unwrap();
    let scan = ScanBuilder::new(target.id.clone()).build();
    store.create_scan(&scan).unwrap();
    (dir, checkpoints, store, scan)
}

#[test]
fn save_then_load_round_trips() {
    let (_dir, checkpoints, store, scan) = fixture();
    let mut payload = payload_for(&scan, &["subdomain_enum", "dns_resolution"]);

    checkpoints.save(&store, &mut payload).unwrap();
    let loaded = checkpoints.load(&store, &scan.id).unwrap().unwrap();

    assert_eq!(loaded, payload);
    assert_eq!(loaded.checksum.len(), 16);
    assert!(loaded.is_order_prefix(&STAGE_ORDER));
}

#[test]
fn digest_changes_with_payload() {
    let (_dir, _checkpoints, _store, scan) = fixture();
    let a = digest(&payload_for(&scan, &["subdomain_enum"])).unwrap();
    let b = digest(&payload_for(&scan, &["subdomain_enum", "dns_resolution"])).unwrap();
    assert_ne!(a, b);
}

#[test]
fn digest_ignores_stored_checksum() {
    let (_dir, _checkpoints, _store, scan) = fixture();
    let mut payload = payload_for(&scan, &["subdomain_enum"]);
    let clean = digest(&payload).unwrap();
    payload.checksum = "ffffffffffffffff".to_string();
    assert_eq!(digest(&payload).unwrap(), clean);
}

#[test]
fn corrupted_file_is_rejected() {
    let (_dir, checkpoints, store, scan) = fixture();
    let mut payload = payload_for(&scan, &["subdomain_enum"]);
    checkpoints.save(&store, &mut payload).unwrap();

    std::fs::write(checkpoints.file_path(&scan.id), b"not a checkpoint").unwrap();

    assert!(checkpoints.load(&store, &scan.id).unwrap().is_none());
}

#[test]
fn tampered_payload_fails_verification() {
    let (_dir, checkpoints, store, scan) = fixture();
    let mut payload = payload_for(&scan, &["subdomain_enum"]);
    checkpoints.save(&store, &mut payload).unwrap();

    let mut tampered = payload.clone();
    tampered.completed_modules.push("dns_resolution".to_string());
    std::fs::write(
        checkpoints.file_path(&scan.id),
        serde_json::to_string(&tampered).unwrap(),
    )
    .unwrap();

    assert!(checkpoints.load(&store, &scan.id).unwrap().is_none());
}

#[test]
fn row_fallback_when_file_missing() {
    let (_dir, checkpoints, store, scan) = fixture();
    let mut payload = payload_for(&scan, &["subdomain_enum", "dns_resolution", "http_probe"]);
    checkpoints.save(&store, &mut payload).unwrap();

    std::fs::remove_file(checkpoints.file_path(&scan.id)).unwrap();

    let loaded = checkpoints.load(&store, &scan.id).unwrap().unwrap();
    assert_eq!(loaded.completed_modules.len(), 3);
}

#[test]
fn clear_removes_file_and_row() {
    let (_dir, checkpoints, store, scan) = fixture();
    let mut payload = payload_for(&scan, &["subdomain_enum"]);
    checkpoints.save(&store, &mut payload).unwrap();

    checkpoints.clear(&store, &scan.id).unwrap();

    assert!(!checkpoints.file_path(&scan.id).exists());
    assert!(store.scan(&scan.id).unwrap().unwrap().checkpoint.is_none());
    assert!(checkpoints.load(&store, &scan.id).unwrap().is_none());
}

#[test]
fn empty_checksum_never_verifies() {
    let (_dir, _checkpoints, _store, scan) = fixture();
    let payload = payload_for(&scan, &[]);
    assert!(!verify(&payload));
}
