// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{fixture, stub_stages, Fixture, StageLog, StubBehavior};
use dn_core::error::STOPPED_BY_USER;
use dn_core::{FakeClock, ScanStatus};
use std::sync::Arc;
use std::time::Duration;

fn queue_for(fx: &Fixture, log: Arc<StageLog>, slow: bool) -> Arc<TaskQueue<FakeClock>> {
    let deps = QueueDeps {
        store: Arc::clone(&fx.store),
        checkpoints: Arc::clone(&fx.checkpoints),
        tools: Arc::clone(&fx.tools),
        wordlists: Arc::clone(&fx.wordlists),
        http: reqwest::Client::new(),
        triage: None,
        clock: FakeClock::new(),
    };
    let queue = TaskQueue::new(deps).with_stage_factory(move || {
        let behavior = |_name| {
            if slow {
                StubBehavior::Slow(Duration::from_millis(700))
            } else {
                StubBehavior::Ok
            }
        };
        stub_stages(
            &log,
            vec![
                ("subdomain_enum", behavior("subdomain_enum")),
                ("dns_resolution", behavior("dns_resolution")),
                ("http_probe", behavior("http_probe")),
            ],
        )
    });
    Arc::new(queue)
}

async fn wait_for_status(fx: &Fixture, status: ScanStatus) -> dn_core::Scan {
    for _ in 0..200 {
        let scan = fx.store.scan(&fx.scan.id).unwrap().unwrap();
        if scan.status == status {
            return scan;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("scan never reached {status}");
}

fn task(fx: &Fixture) -> ScanTask {
    ScanTask {
        scan_id: fx.scan.id.clone(),
        config: dn_core::ScanConfig::default(),
        is_resumed: false,
    }
}

#[tokio::test]
async fn worker_runs_a_queued_scan_to_completion() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let queue = queue_for(&fx, Arc::clone(&log), false);

    let shutdown = tokio_util::sync::CancellationToken::new();
    let worker = {
        let queue = Arc::clone(&queue);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { queue.run(shutdown).await })
    };

    assert!(queue.add(task(&fx)).await);
    let scan = wait_for_status(&fx, ScanStatus::Completed).await;

    assert!(scan.error.is_none());
    assert_eq!(log.runs.lock().len(), 3);
    assert!(queue.status().active.is_empty());

    shutdown.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn stop_before_dequeue_cancels_the_scan() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let queue = queue_for(&fx, Arc::clone(&log), false);

    // Gate the worker so the task stays queued.
    queue.set_process_paused(true);
    let shutdown = tokio_util::sync::CancellationToken::new();
    let worker = {
        let queue = Arc::clone(&queue);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { queue.run(shutdown).await })
    };

    queue.add(task(&fx)).await;
    queue.stop(&fx.scan.id);
    queue.set_process_paused(false);

    let scan = wait_for_status(&fx, ScanStatus::Failed).await;
    assert_eq!(scan.error.as_deref(), Some(STOPPED_BY_USER));

    // Give the worker a chance to (not) run the cancelled task.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(log.runs.lock().is_empty());

    shutdown.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn stop_during_execution_fails_with_stopped_by_user() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let queue = queue_for(&fx, Arc::clone(&log), true);

    let shutdown = tokio_util::sync::CancellationToken::new();
    let worker = {
        let queue = Arc::clone(&queue);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { queue.run(shutdown).await })
    };

    queue.add(task(&fx)).await;
    // Let the first (slow) stage start, then stop.
    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert!(queue.stop(&fx.scan.id));

    let scan = wait_for_status(&fx, ScanStatus::Failed).await;
    assert_eq!(scan.error.as_deref(), Some(STOPPED_BY_USER));
    // Not every stage ran.
    assert!(log.runs.lock().len() < 3);

    shutdown.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn pause_and_resume_round_trip() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let queue = queue_for(&fx, Arc::clone(&log), true);

    let shutdown = tokio_util::sync::CancellationToken::new();
    let worker = {
        let queue = Arc::clone(&queue);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { queue.run(shutdown).await })
    };

    queue.add(task(&fx)).await;
    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert!(queue.pause(&fx.scan.id));

    let scan = wait_for_status(&fx, ScanStatus::Paused).await;
    assert_eq!(scan.status, ScanStatus::Paused);
    assert_eq!(queue.status().paused.len(), 1);

    assert!(queue.resume(&fx.scan.id));
    let scan = wait_for_status(&fx, ScanStatus::Completed).await;
    assert!(scan.error.is_none());
    assert_eq!(log.runs.lock().len(), 3);

    shutdown.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn pause_all_reports_only_newly_paused_scans() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let queue = queue_for(&fx, Arc::clone(&log), true);

    let shutdown = tokio_util::sync::CancellationToken::new();
    let worker = {
        let queue = Arc::clone(&queue);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { queue.run(shutdown).await })
    };

    queue.add(task(&fx)).await;
    tokio::time::sleep(Duration::from_millis(1300)).await;

    let paused = queue.pause_all("test outage");
    assert_eq!(paused, [fx.scan.id.to_string()]);
    // Second sweep finds nothing new.
    assert!(queue.pause_all("test outage").is_empty());

    queue.resume_scans(&paused);
    wait_for_status(&fx, ScanStatus::Completed).await;

    shutdown.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn pause_of_unknown_scan_is_a_noop() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let queue = queue_for(&fx, log, false);

    assert!(!queue.pause(&dn_core::ScanId::new()));
    assert!(!queue.resume(&fx.scan.id));
}

#[tokio::test]
async fn status_reflects_queue_depth() {
    let fx = fixture();
    let log = Arc::new(StageLog::default());
    let queue = queue_for(&fx, log, false);

    queue.set_process_paused(true);
    queue.add(task(&fx)).await;

    let status = queue.status();
    assert_eq!(status.queued, 1);
    assert!(status.process_paused);
    assert!(status.active.is_empty());
}
