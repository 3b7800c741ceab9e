// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task queue: a single-writer worker over a FIFO of admitted scans.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use dn_adapters::{default_stages, Stage, StageCtx, ToolRegistry, TriageAdapter, WordlistDir};
use dn_core::{
    error::STOPPED_BY_USER, Clock, ScanConfig, ScanId, ScanStatus,
};
use dn_proc::Supervisor;
use dn_storage::{ArtifactStore, CheckpointStore};

use crate::events::EngineEvent;
use crate::monitor::ScanControl;
use crate::pipeline::{Pipeline, PipelineEnd, ScanSignals};

/// Poll interval of the worker loop when idle or gated.
const WORKER_POLL: Duration = Duration::from_secs(1);

/// One admitted scan awaiting execution.
#[derive(Debug, Clone)]
pub struct ScanTask {
    pub scan_id: ScanId,
    /// Typed config, expanded from the profile at admission time.
    pub config: ScanConfig,
    /// Ask the pipeline to rehydrate from a checkpoint.
    pub is_resumed: bool,
}

/// Control handles for one executing scan.
#[derive(Clone)]
pub struct ScanHandle {
    pub signals: Arc<ScanSignals>,
    pub supervisor: Supervisor,
}

/// Queue snapshot for the control surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub active: Vec<String>,
    pub paused: Vec<String>,
    pub process_paused: bool,
}

/// Everything the worker needs to build a pipeline per scan.
pub struct QueueDeps<C: Clock> {
    pub store: Arc<ArtifactStore>,
    pub checkpoints: Arc<CheckpointStore>,
    pub tools: Arc<ToolRegistry>,
    pub wordlists: Arc<WordlistDir>,
    pub http: reqwest::Client,
    pub triage: Option<Arc<TriageAdapter>>,
    pub clock: C,
}

struct QueueShared {
    /// scan id → control handles, present while the scan executes.
    active: Mutex<HashMap<String, ScanHandle>>,
    paused: Mutex<HashSet<String>>,
    /// Scans stopped before the worker dequeued them.
    cancelled: Mutex<HashSet<String>>,
    queued: AtomicUsize,
    /// Process-wide gate; the worker will not dequeue while set.
    process_paused: AtomicBool,
}

type StageFactory = Box<dyn Fn() -> Vec<Box<dyn Stage>> + Send + Sync>;

/// Admits scan requests and runs them one at a time.
pub struct TaskQueue<C: Clock> {
    deps: QueueDeps<C>,
    tx: mpsc::Sender<ScanTask>,
    rx: Mutex<Option<mpsc::Receiver<ScanTask>>>,
    shared: Arc<QueueShared>,
    stage_factory: StageFactory,
    events: Option<broadcast::Sender<EngineEvent>>,
}

impl<C: Clock> std::fmt::Debug for TaskQueue<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue").finish_non_exhaustive()
    }
}

impl<C: Clock> TaskQueue<C> {
    pub fn new(deps: QueueDeps<C>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            deps,
            tx,
            rx: Mutex::new(Some(rx)),
            shared: Arc::new(QueueShared {
                active: Mutex::new(HashMap::new()),
                paused: Mutex::new(HashSet::new()),
                cancelled: Mutex::new(HashSet::new()),
                queued: AtomicUsize::new(0),
                process_paused: AtomicBool::new(false),
            }),
            stage_factory: Box::new(default_stages),
            events: None,
        }
    }

    pub fn with_events(mut self, events: broadcast::Sender<EngineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the stage list built per scan (tests use stub stages).
    pub fn with_stage_factory(
        mut self,
        factory: impl Fn() -> Vec<Box<dyn Stage>> + Send + Sync + 'static,
    ) -> Self {
        self.stage_factory = Box::new(factory);
        self
    }

    /// Enqueue an admitted scan.
    pub async fn add(&self, task: ScanTask) -> bool {
        let scan_id = task.scan_id.clone();
        if self.tx.send(task).await.is_err() {
            tracing::error!(%scan_id, "queue closed, dropping task");
            return false;
        }
        self.shared.queued.fetch_add(1, Ordering::SeqCst);
        tracing::info!(%scan_id, "scan queued");
        true
    }

    /// Pause an executing scan; takes effect at the next stage boundary.
    pub fn pause(&self, scan_id: &ScanId) -> bool {
        let handle = self.shared.active.lock().get(scan_id.as_str()).cloned();
        let Some(handle) = handle else { return false };
        handle.signals.pause();
        self.shared.paused.lock().insert(scan_id.to_string());
        self.write_status(scan_id, ScanStatus::Paused, None);
        tracing::info!(%scan_id, "scan paused");
        true
    }

    /// Resume a paused scan.
    pub fn resume(&self, scan_id: &ScanId) -> bool {
        let handle = self.shared.active.lock().get(scan_id.as_str()).cloned();
        let Some(handle) = handle else { return false };
        if !self.shared.paused.lock().remove(scan_id.as_str()) {
            return false;
        }
        handle.signals.resume();
        self.write_status(scan_id, ScanStatus::Running, None);
        tracing::info!(%scan_id, "scan resumed");
        true
    }

    /// Stop a scan: terminate in-flight children, abort at the boundary.
    ///
    /// A scan still waiting in the FIFO is cancelled and marked failed
    /// immediately.
    pub fn stop(&self, scan_id: &ScanId) -> bool {
        let handle = self.shared.active.lock().get(scan_id.as_str()).cloned();
        if let Some(handle) = handle {
            handle.signals.stop();
            handle.supervisor.stop();
            tracing::info!(%scan_id, "stop requested");
            return true;
        }
        self.shared.cancelled.lock().insert(scan_id.to_string());
        self.write_status(scan_id, ScanStatus::Failed, Some(STOPPED_BY_USER));
        tracing::info!(%scan_id, "queued scan cancelled");
        true
    }

    /// Gate or ungate the worker loop (system-wide pause).
    pub fn set_process_paused(&self, paused: bool) {
        self.shared.process_paused.store(paused, Ordering::SeqCst);
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queued: self.shared.queued.load(Ordering::SeqCst),
            active: self.shared.active.lock().keys().cloned().collect(),
            paused: self.shared.paused.lock().iter().cloned().collect(),
            process_paused: self.shared.process_paused.load(Ordering::SeqCst),
        }
    }

    /// Worker loop. Run exactly once, typically in a spawned task.
    pub async fn run(&self, shutdown: CancellationToken) {
        let Some(mut rx) = self.rx.lock().take() else {
            tracing::error!("queue worker started twice");
            return;
        };
        tracing::info!("queue worker started");

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            if self.shared.process_paused.load(Ordering::SeqCst) {
                tokio::time::sleep(WORKER_POLL).await;
                continue;
            }
            let task = match tokio::time::timeout(WORKER_POLL, rx.recv()).await {
                Err(_) => continue,
                Ok(None) => break,
                Ok(Some(task)) => task,
            };
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            if self.shared.cancelled.lock().remove(task.scan_id.as_str()) {
                continue;
            }
            self.execute(task).await;
        }
        tracing::info!("queue worker stopped");
    }

    async fn execute(&self, task: ScanTask) {
        let scan_id = task.scan_id.clone();

        let target = match self.load_target(&scan_id) {
            Ok(target) => target,
            Err(message) => {
                tracing::error!(%scan_id, message, "cannot start scan");
                self.write_status(&scan_id, ScanStatus::Failed, Some(&message));
                return;
            }
        };

        let signals = Arc::new(ScanSignals::default());
        let supervisor = Supervisor::new();
        self.shared.active.lock().insert(
            scan_id.to_string(),
            ScanHandle { signals: Arc::clone(&signals), supervisor: supervisor.clone() },
        );

        let ctx = StageCtx {
            target,
            scan_id: scan_id.clone(),
            config: task.config,
            supervisor,
            store: Arc::clone(&self.deps.store),
            tools: Arc::clone(&self.deps.tools),
            wordlists: Arc::clone(&self.deps.wordlists),
            http: self.deps.http.clone(),
            triage: self.deps.triage.clone(),
        };
        let mut pipeline = Pipeline::new(
            ctx,
            (self.stage_factory)(),
            Arc::clone(&self.deps.checkpoints),
            signals,
            self.deps.clock.clone(),
        );
        if let Some(events) = &self.events {
            pipeline = pipeline.with_events(events.clone());
        }

        tracing::info!(%scan_id, "scan started");
        let end = pipeline.run(task.is_resumed).await;

        match end {
            PipelineEnd::Completed => {
                self.write_status(&scan_id, ScanStatus::Completed, None);
                tracing::info!(%scan_id, "scan completed");
            }
            PipelineEnd::Stopped => {
                self.write_status(&scan_id, ScanStatus::Failed, Some(STOPPED_BY_USER));
                tracing::info!(%scan_id, "scan stopped by user");
            }
            PipelineEnd::Failed(message) => {
                self.write_status(&scan_id, ScanStatus::Failed, Some(&message));
                tracing::error!(%scan_id, message, "scan failed");
            }
        }

        self.shared.active.lock().remove(scan_id.as_str());
        self.shared.paused.lock().remove(scan_id.as_str());
    }

    fn load_target(&self, scan_id: &ScanId) -> Result<dn_core::Target, String> {
        let scan = self
            .deps
            .store
            .scan(scan_id)
            .map_err(|e| format!("store failure: {e}"))?
            .ok_or_else(|| format!("scan not found: {scan_id}"))?;
        self.deps
            .store
            .target(&scan.target_id)
            .map_err(|e| format!("store failure: {e}"))?
            .ok_or_else(|| format!("target not found: {}", scan.target_id))
    }

    fn write_status(&self, scan_id: &ScanId, status: ScanStatus, error: Option<&str>) {
        if let Err(store_error) = self.deps.store.update_scan_status(
            scan_id,
            status,
            None,
            None,
            error,
            self.deps.clock.epoch_ms(),
        ) {
            tracing::error!(%scan_id, %store_error, "failed to write scan status");
            return;
        }
        if let Some(events) = &self.events {
            let _ = events.send(EngineEvent::ScanStatusChanged {
                scan_id: scan_id.to_string(),
                status,
            });
        }
    }
}

impl<C: Clock> ScanControl for TaskQueue<C> {
    /// Pause every executing scan; returns the ids actually paused.
    fn pause_all(&self, reason: &str) -> Vec<String> {
        let ids: Vec<String> = self.shared.active.lock().keys().cloned().collect();
        let mut paused = Vec::new();
        for id in ids {
            let scan_id = ScanId::from_string(id.clone());
            if self.shared.paused.lock().contains(&id) {
                continue;
            }
            if self.pause(&scan_id) {
                paused.push(id);
            }
        }
        if !paused.is_empty() {
            tracing::warn!(reason, count = paused.len(), "paused all active scans");
        }
        paused
    }

    /// Resume the given scans (those still paused).
    fn resume_scans(&self, scan_ids: &[String]) {
        for id in scan_ids {
            self.resume(&ScanId::from_string(id.clone()));
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
