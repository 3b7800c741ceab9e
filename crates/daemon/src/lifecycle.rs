// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup: wire the root context, recover interrupted scans.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use dn_adapters::{ToolRegistry, TriageAdapter, TriageConfig, WordlistDir};
use dn_core::{Clock, ScanConfig, ScanId, ScanStatus, SystemClock};
use dn_engine::{
    EngineEvent, MonitorConfig, QueueDeps, ResilienceMonitor, ScanTask, TaskQueue, TcpProbe,
};
use dn_storage::{ArtifactStore, CheckpointStore, StoreError};

use crate::env::Paths;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("another daemon instance holds the lock at {0}")]
    AlreadyRunning(PathBuf),
}

/// Daemon configuration from the command line.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub root: PathBuf,
    /// Optional TCP bind address in addition to the unix socket.
    pub tcp: Option<String>,
    pub monitor: MonitorConfig,
    /// Disable the LLM triage adapter entirely.
    pub triage_enabled: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            root: crate::env::default_root(),
            tcp: None,
            monitor: MonitorConfig::default(),
            triage_enabled: true,
        }
    }
}

/// The root context threaded to every request handler.
#[derive(Debug)]
pub struct Daemon {
    pub paths: Paths,
    pub store: Arc<ArtifactStore>,
    pub queue: Arc<TaskQueue<SystemClock>>,
    pub monitor: Arc<ResilienceMonitor<SystemClock, TaskQueue<SystemClock>>>,
    pub events: broadcast::Sender<EngineEvent>,
    pub shutdown: CancellationToken,
    /// Scans paused by an operator-level system pause.
    pub system_paused: Mutex<Option<Vec<String>>>,
    // Held for the daemon's lifetime; dropping releases the flock.
    _instance_lock: File,
}

impl Daemon {
    /// Wire the full context. Does not spawn the worker loops — call
    /// [`Daemon::spawn_workers`] once the process is ready to execute.
    pub fn start(config: DaemonConfig) -> Result<Arc<Self>, DaemonError> {
        let paths = Paths::new(&config.root);
        paths.ensure()?;

        let instance_lock = File::create(&paths.lock)?;
        if instance_lock.try_lock_exclusive().is_err() {
            return Err(DaemonError::AlreadyRunning(paths.lock.clone()));
        }

        let store = Arc::new(ArtifactStore::open(&paths.db)?);
        let checkpoints = Arc::new(CheckpointStore::new(&paths.state)?);
        let tools = Arc::new(ToolRegistry::builtin().with_overrides(&paths.tools_config));
        let wordlists = Arc::new(WordlistDir::new(&paths.wordlists)?);
        let http = reqwest::Client::builder()
            .user_agent("dragnet")
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        let triage = config
            .triage_enabled
            .then(|| Arc::new(TriageAdapter::new(TriageConfig::default())));

        let (events, _) = broadcast::channel(256);

        let queue = Arc::new(
            TaskQueue::new(QueueDeps {
                store: Arc::clone(&store),
                checkpoints,
                tools,
                wordlists,
                http,
                triage: triage.clone(),
                clock: SystemClock,
            })
            .with_events(events.clone()),
        );

        let mut monitor = ResilienceMonitor::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            Arc::new(TcpProbe::default()),
            config.monitor,
            SystemClock,
        )
        .with_events(events.clone());
        if let Some(triage) = triage {
            monitor = monitor.with_triage(triage);
        }

        Ok(Arc::new(Self {
            paths,
            store,
            queue,
            monitor: Arc::new(monitor),
            events,
            shutdown: CancellationToken::new(),
            system_paused: Mutex::new(None),
            _instance_lock: instance_lock,
        }))
    }

    /// Launch the queue worker and resilience monitor, then re-enqueue
    /// scans a previous process left running.
    pub async fn spawn_workers(&self) -> Result<(), DaemonError> {
        {
            let queue = Arc::clone(&self.queue);
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move { queue.run(shutdown).await });
        }
        {
            let monitor = Arc::clone(&self.monitor);
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move { monitor.run(shutdown).await });
        }

        for scan in self.store.interrupted_scans()? {
            // A scan paused before the restart stays paused until the
            // user resumes it; running scans pick their checkpoint up
            // immediately.
            if scan.status == ScanStatus::Paused {
                tracing::info!(scan_id = %scan.id, "leaving paused scan for explicit resume");
                continue;
            }
            tracing::info!(scan_id = %scan.id, "re-enqueueing interrupted scan");
            self.queue
                .add(ScanTask {
                    scan_id: scan.id.clone(),
                    config: ScanConfig::for_profile(scan.profile),
                    is_resumed: true,
                })
                .await;
        }
        Ok(())
    }

    /// Resume a scan: flip the executing pipeline, or re-admit a scan
    /// that was paused across a restart.
    pub async fn resume_scan(&self, scan_id: &ScanId) -> Result<bool, StoreError> {
        if self.queue.resume(scan_id) {
            return Ok(true);
        }
        let Some(scan) = self.store.scan(scan_id)? else {
            return Ok(false);
        };
        if scan.status != ScanStatus::Paused {
            return Ok(false);
        }
        self.store.update_scan_status(
            scan_id,
            ScanStatus::Running,
            None,
            None,
            None,
            SystemClock.epoch_ms(),
        )?;
        self.queue
            .add(ScanTask {
                scan_id: scan_id.clone(),
                config: ScanConfig::for_profile(scan.profile),
                is_resumed: true,
            })
            .await;
        Ok(true)
    }
}
