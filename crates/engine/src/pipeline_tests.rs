// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{fixture, stub_stages, StageLog, StubBehavior};
use dn_core::{CheckpointPayload, FakeClock};
use std::collections::HashMap;
use std::sync::Arc;

fn three_ok(log: &Arc<StageLog>) -> Vec<Box<dyn dn_adapters::Stage>> {
    stub_stages(
        log,
        vec![
            ("subdomain_enum", StubBehavior::Ok),
            ("dns_resolution", StubBehavior::Ok),
            ("http_probe", StubBehavior::Ok),
        ],
    )
}

#[tokio::test]
async fn happy_path_completes_and_clears_checkpoint() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let pipeline = Pipeline::new(
        fx.ctx(),
        three_ok(&log),
        Arc::clone(&fx.checkpoints),
        Arc::new(ScanSignals::default()),
        FakeClock::new(),
    );

    let end = pipeline.run(false).await;

    assert_eq!(end, PipelineEnd::Completed);
    assert_eq!(
        *log.runs.lock(),
        ["subdomain_enum", "dns_resolution", "http_probe"]
    );

    let scan = fx.store.scan(&fx.scan.id).unwrap().unwrap();
    assert_eq!(scan.progress.get("subdomain_enum"), Some(&100));
    assert_eq!(scan.progress.get("http_probe"), Some(&100));
    assert_eq!(scan.current_stage.as_deref(), Some("http_probe"));
    // Checkpoint removed on success, both file and row.
    assert!(scan.checkpoint.is_none());
    assert!(fx.checkpoints.load(&fx.store, &fx.scan.id).unwrap().is_none());
}

#[tokio::test]
async fn prior_results_flow_between_stages() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let pipeline = Pipeline::new(
        fx.ctx(),
        three_ok(&log),
        Arc::clone(&fx.checkpoints),
        Arc::new(ScanSignals::default()),
        FakeClock::new(),
    );

    pipeline.run(false).await;

    let prior_keys = log.prior_keys.lock();
    assert!(prior_keys["subdomain_enum"].is_empty());
    assert_eq!(prior_keys["dns_resolution"], ["subdomain_enum"]);
    assert_eq!(prior_keys["http_probe"], ["dns_resolution", "subdomain_enum"]);
}

#[tokio::test]
async fn stage_failure_continues_by_default() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let stages = stub_stages(
        &log,
        vec![
            ("subdomain_enum", StubBehavior::Ok),
            ("dns_resolution", StubBehavior::Fail),
            ("http_probe", StubBehavior::Ok),
        ],
    );
    let pipeline = Pipeline::new(
        fx.ctx(),
        stages,
        Arc::clone(&fx.checkpoints),
        Arc::new(ScanSignals::default()),
        FakeClock::new(),
    );

    let end = pipeline.run(false).await;

    assert_eq!(end, PipelineEnd::Completed);
    assert_eq!(log.runs.lock().len(), 3);
    // The failed stage never reaches 100.
    let scan = fx.store.scan(&fx.scan.id).unwrap().unwrap();
    assert_eq!(scan.progress.get("dns_resolution"), Some(&0));
    assert_eq!(scan.progress.get("http_probe"), Some(&100));
}

#[tokio::test]
async fn stop_on_error_fails_the_scan() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let stages = stub_stages(
        &log,
        vec![
            ("subdomain_enum", StubBehavior::Fail),
            ("dns_resolution", StubBehavior::Ok),
        ],
    );
    let mut ctx = fx.ctx();
    ctx.config.stop_on_error = true;
    let pipeline = Pipeline::new(
        ctx,
        stages,
        Arc::clone(&fx.checkpoints),
        Arc::new(ScanSignals::default()),
        FakeClock::new(),
    );

    let end = pipeline.run(false).await;

    assert!(matches!(end, PipelineEnd::Failed(_)));
    assert_eq!(*log.runs.lock(), ["subdomain_enum"]);
}

#[tokio::test]
async fn stop_signal_aborts_at_the_boundary() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let signals = Arc::new(ScanSignals::default());
    signals.stop();
    let pipeline = Pipeline::new(
        fx.ctx(),
        three_ok(&log),
        Arc::clone(&fx.checkpoints),
        Arc::clone(&signals),
        FakeClock::new(),
    );

    let end = pipeline.run(false).await;

    assert_eq!(end, PipelineEnd::Stopped);
    assert!(log.runs.lock().is_empty());
}

#[tokio::test]
async fn pause_blocks_between_stages_until_resume() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let signals = Arc::new(ScanSignals::default());
    signals.pause();

    let pipeline = Pipeline::new(
        fx.ctx(),
        three_ok(&log),
        Arc::clone(&fx.checkpoints),
        Arc::clone(&signals),
        FakeClock::new(),
    );

    let resume_signals = Arc::clone(&signals);
    let resumer = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        resume_signals.resume();
    });

    let started = std::time::Instant::now();
    let end = pipeline.run(false).await;
    resumer.await.unwrap();

    assert_eq!(end, PipelineEnd::Completed);
    // Nothing ran before the resume landed.
    assert!(started.elapsed() >= std::time::Duration::from_millis(1000));
    assert_eq!(log.runs.lock().len(), 3);
}

#[tokio::test]
async fn resume_skips_completed_stages_and_rehydrates_cache() {
    let fx = fixture();

    // Simulate a prior run that completed the first two stages.
    let mut payload = CheckpointPayload {
        scan_id: fx.scan.id.to_string(),
        timestamp: 1,
        current_module: "dns_resolution".to_string(),
        completed_modules: vec!["subdomain_enum".to_string(), "dns_resolution".to_string()],
        pending_modules: vec!["http_probe".to_string()],
        module_state: HashMap::new(),
        results_cache: [
            ("subdomain_enum".to_string(), serde_json::json!({"total_found": 2})),
            ("dns_resolution".to_string(), serde_json::json!({"resolved": 2})),
        ]
        .into(),
        checksum: String::new(),
    };
    fx.checkpoints.save(&fx.store, &mut payload).unwrap();

    let log = Arc::new(StageLog::default());
    let pipeline = Pipeline::new(
        fx.ctx(),
        three_ok(&log),
        Arc::clone(&fx.checkpoints),
        Arc::new(ScanSignals::default()),
        FakeClock::new(),
    );

    let end = pipeline.run(true).await;

    assert_eq!(end, PipelineEnd::Completed);
    assert_eq!(*log.runs.lock(), ["http_probe"]);
    assert_eq!(
        log.prior_keys.lock()["http_probe"],
        ["dns_resolution", "subdomain_enum"]
    );
    assert!(fx.store.scan(&fx.scan.id).unwrap().unwrap().is_resumed);
}

#[tokio::test]
async fn corrupt_checkpoint_restarts_from_stage_zero() {
    let fx = fixture();
    let mut payload = CheckpointPayload {
        scan_id: fx.scan.id.to_string(),
        timestamp: 1,
        current_module: "dns_resolution".to_string(),
        completed_modules: vec!["subdomain_enum".to_string(), "dns_resolution".to_string()],
        pending_modules: vec!["http_probe".to_string()],
        module_state: HashMap::new(),
        results_cache: HashMap::new(),
        checksum: String::new(),
    };
    fx.checkpoints.save(&fx.store, &mut payload).unwrap();
    std::fs::write(fx.checkpoints.file_path(&fx.scan.id), b"garbage").unwrap();

    let log = Arc::new(StageLog::default());
    let pipeline = Pipeline::new(
        fx.ctx(),
        three_ok(&log),
        Arc::clone(&fx.checkpoints),
        Arc::new(ScanSignals::default()),
        FakeClock::new(),
    );

    let end = pipeline.run(true).await;

    assert_eq!(end, PipelineEnd::Completed);
    assert_eq!(log.runs.lock().len(), 3);
    assert!(!fx.store.scan(&fx.scan.id).unwrap().unwrap().is_resumed);
}

#[tokio::test]
async fn unknown_checkpoint_stage_restarts_from_zero() {
    let fx = fixture();
    let mut payload = CheckpointPayload {
        scan_id: fx.scan.id.to_string(),
        timestamp: 1,
        current_module: "not_a_stage".to_string(),
        completed_modules: vec![],
        pending_modules: vec![],
        module_state: HashMap::new(),
        results_cache: HashMap::new(),
        checksum: String::new(),
    };
    fx.checkpoints.save(&fx.store, &mut payload).unwrap();

    let log = Arc::new(StageLog::default());
    let pipeline = Pipeline::new(
        fx.ctx(),
        three_ok(&log),
        Arc::clone(&fx.checkpoints),
        Arc::new(ScanSignals::default()),
        FakeClock::new(),
    );

    pipeline.run(true).await;

    assert_eq!(log.runs.lock().len(), 3);
}

#[tokio::test]
async fn checkpoint_survives_a_failed_run() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let stages = stub_stages(
        &log,
        vec![
            ("subdomain_enum", StubBehavior::Ok),
            ("dns_resolution", StubBehavior::Fail),
        ],
    );
    let mut ctx = fx.ctx();
    ctx.config.stop_on_error = true;
    let pipeline = Pipeline::new(
        ctx,
        stages,
        Arc::clone(&fx.checkpoints),
        Arc::new(ScanSignals::default()),
        FakeClock::new(),
    );

    let end = pipeline.run(false).await;

    assert!(matches!(end, PipelineEnd::Failed(_)));
    // The boundary crossed before the failure is still on disk.
    let payload = fx.checkpoints.load(&fx.store, &fx.scan.id).unwrap().unwrap();
    assert_eq!(payload.completed_modules, ["subdomain_enum"]);
    assert_eq!(payload.pending_modules, ["dns_resolution"]);
}
