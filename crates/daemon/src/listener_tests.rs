// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::lifecycle::{Daemon, DaemonConfig};
use dn_wire::TargetSpec;
use std::sync::Arc;

/// A wired daemon over a temp root. Workers are not spawned, so queued
/// scans stay queued — exactly what dispatch tests want.
fn test_daemon() -> (tempfile::TempDir, Arc<Daemon>) {
    let dir = tempfile::tempdir().unwrap();
    let daemon = Daemon::start(DaemonConfig {
        root: dir.path().to_path_buf(),
        tcp: None,
        monitor: Default::default(),
        triage_enabled: false,
    })
    .unwrap();
    (dir, daemon)
}

fn spec(name: &str) -> TargetSpec {
    TargetSpec {
        name: name.to_string(),
        primary_domain: "example.com".to_string(),
        scope: vec![],
        exclusions: vec![],
        ip_ranges: vec![],
        asns: vec![],
    }
}

#[tokio::test]
async fn ping_pongs() {
    let (_dir, daemon) = test_daemon();
    assert_eq!(handle_request(&daemon, Request::Ping).await, Response::Pong);
}

#[tokio::test]
async fn target_create_get_list_round_trip() {
    let (_dir, daemon) = test_daemon();

    let created = handle_request(
        &daemon,
        Request::CreateTarget { spec: spec("acme") },
    )
    .await;
    let Response::Target { target } = created else {
        panic!("expected target response, got {created:?}");
    };

    let fetched = handle_request(&daemon, Request::GetTarget { id: target.id.clone() }).await;
    assert!(matches!(fetched, Response::Target { .. }));

    let listed = handle_request(&daemon, Request::ListTargets).await;
    let Response::Targets { targets } = listed else {
        panic!("expected targets");
    };
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].name, "acme");
}

#[tokio::test]
async fn scan_admission_queues_a_pending_scan() {
    let (_dir, daemon) = test_daemon();

    let Response::Target { target } =
        handle_request(&daemon, Request::CreateTarget { spec: spec("acme") }).await
    else {
        panic!("target create failed");
    };

    let response = handle_request(
        &daemon,
        Request::CreateScan {
            target_id: target.id.clone(),
            profile: Some("stealth".to_string()),
            stop_on_error: false,
        },
    )
    .await;
    let Response::ScanQueued { scan_id } = response else {
        panic!("expected scan_queued, got {response:?}");
    };

    let Response::Scan { scan } = handle_request(&daemon, Request::GetScan { id: scan_id }).await
    else {
        panic!("scan fetch failed");
    };
    assert_eq!(scan.status, "pending");
    assert_eq!(scan.profile, "stealth");
    assert_eq!(daemon.queue.status().queued, 1);
}

#[tokio::test]
async fn scan_against_unknown_target_is_an_error() {
    let (_dir, daemon) = test_daemon();
    let response = handle_request(
        &daemon,
        Request::CreateScan { target_id: "tgt-missing".to_string(), profile: None, stop_on_error: false },
    )
    .await;
    assert!(matches!(response, Response::Error { .. }));
}

#[tokio::test]
async fn unknown_profile_is_a_tagged_error() {
    let (_dir, daemon) = test_daemon();
    let Response::Target { target } =
        handle_request(&daemon, Request::CreateTarget { spec: spec("acme") }).await
    else {
        panic!("target create failed");
    };

    let response = handle_request(
        &daemon,
        Request::CreateScan {
            target_id: target.id,
            profile: Some("ludicrous".to_string()),
            stop_on_error: false,
        },
    )
    .await;
    let Response::Error { kind, message } = response else {
        panic!("expected error");
    };
    assert_eq!(kind, "internal");
    assert!(message.contains("ludicrous"));
}

#[tokio::test]
async fn pause_of_idle_scan_is_a_tagged_error() {
    let (_dir, daemon) = test_daemon();
    let response =
        handle_request(&daemon, Request::PauseScan { id: "scn-nope".to_string() }).await;
    assert!(matches!(response, Response::Error { .. }));
}

#[tokio::test]
async fn system_status_defaults_before_first_tick() {
    let (_dir, daemon) = test_daemon();
    let Response::System { system } = handle_request(&daemon, Request::SystemStatus).await else {
        panic!("expected system status");
    };
    assert_eq!(system.network_status, "online");
}

#[tokio::test]
async fn system_pause_gates_the_worker() {
    let (_dir, daemon) = test_daemon();

    handle_request(&daemon, Request::SystemPause).await;
    assert!(daemon.queue.status().process_paused);

    handle_request(&daemon, Request::SystemResume).await;
    assert!(!daemon.queue.status().process_paused);
}

#[tokio::test]
async fn second_instance_cannot_take_the_lock() {
    let (dir, _daemon) = test_daemon();
    let err = Daemon::start(DaemonConfig {
        root: dir.path().to_path_buf(),
        tcp: None,
        monitor: Default::default(),
        triage_enabled: false,
    })
    .unwrap_err();
    assert!(matches!(err, crate::lifecycle::DaemonError::AlreadyRunning(_)));
}
