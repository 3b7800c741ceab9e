// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-scan stage pipeline.
//!
//! One stage at a time, in the fixed order. Every boundary crossing is
//! durable before the next stage starts: artifacts are in the store,
//! progress and the results cache are in the checkpoint. That ordering
//! is what makes resume sound.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;

use dn_adapters::{Stage, StageCtx, StageError};
use dn_core::{stage_index, CheckpointPayload, Clock, ScanStatus};
use dn_storage::{CheckpointStore, StoreError};

use crate::events::EngineEvent;

/// Poll granularity while paused at a stage boundary.
pub const BOUNDARY_POLL: Duration = Duration::from_secs(1);

/// Cooperative pause/stop flags for one scan.
///
/// Pause blocks the pipeline between stages only; stop aborts at the
/// next boundary and overrides pause.
#[derive(Default)]
pub struct ScanSignals {
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl ScanSignals {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEnd {
    Completed,
    /// Stop flag observed; the scan records "stopped by user".
    Stopped,
    Failed(String),
}

/// Executes the stage order for one scan.
pub struct Pipeline<C: Clock> {
    stages: Vec<Box<dyn Stage>>,
    ctx: StageCtx,
    checkpoints: Arc<CheckpointStore>,
    signals: Arc<ScanSignals>,
    clock: C,
    events: Option<broadcast::Sender<EngineEvent>>,
}

impl<C: Clock> Pipeline<C> {
    pub fn new(
        ctx: StageCtx,
        stages: Vec<Box<dyn Stage>>,
        checkpoints: Arc<CheckpointStore>,
        signals: Arc<ScanSignals>,
        clock: C,
    ) -> Self {
        Self { stages, ctx, checkpoints, signals, clock, events: None }
    }

    pub fn with_events(mut self, events: broadcast::Sender<EngineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run the pipeline to a terminal outcome.
    ///
    /// `resume` asks for checkpoint rehydration; a missing or corrupt
    /// checkpoint restarts from stage 0 with `is_resumed` forced false.
    pub async fn run(&self, resume: bool) -> PipelineEnd {
        match self.run_inner(resume).await {
            Ok(end) => end,
            // Store unavailable: fatal to this scan.
            Err(error) => {
                tracing::error!(scan_id = %self.ctx.scan_id, %error, "store failure, failing scan");
                PipelineEnd::Failed(format!("store failure: {error}"))
            }
        }
    }

    async fn run_inner(&self, resume: bool) -> Result<PipelineEnd, StoreError> {
        let scan_id = self.ctx.scan_id.clone();
        let mut results_cache: HashMap<String, Value> = HashMap::new();
        let mut progress: HashMap<String, u8> = HashMap::new();
        let mut start_index = 0;

        if resume {
            match self.checkpoints.load(&self.ctx.store, &scan_id)? {
                Some(payload) if payload.is_order_prefix(&stage_names(&self.stages)) => {
                    start_index = stage_index(&payload.current_module).map(|i| i + 1).unwrap_or(0);
                    for stage in &payload.completed_modules {
                        progress.insert(stage.clone(), 100);
                    }
                    results_cache = payload.results_cache;
                    self.ctx.store.mark_resumed(&scan_id, true)?;
                    tracing::info!(
                        %scan_id,
                        resume_at = self.stages.get(start_index).map(|s| s.name()).unwrap_or("done"),
                        "resuming from checkpoint"
                    );
                }
                Some(_) => {
                    tracing::warn!(%scan_id, "checkpoint is not a stage-order prefix, restarting");
                    self.ctx.store.mark_resumed(&scan_id, false)?;
                }
                None => {
                    self.ctx.store.mark_resumed(&scan_id, false)?;
                }
            }
        }

        for (index, stage) in self.stages.iter().enumerate().skip(start_index) {
            // Stage boundary: the only place pause and stop take effect.
            while self.signals.is_paused() && !self.signals.is_stopped() {
                tokio::time::sleep(BOUNDARY_POLL).await;
            }
            if self.signals.is_stopped() {
                return Ok(PipelineEnd::Stopped);
            }

            let name = stage.name();
            progress.insert(name.to_string(), 0);
            self.ctx.store.update_scan_status(
                &scan_id,
                ScanStatus::Running,
                Some(name),
                Some(&progress),
                None,
                self.clock.epoch_ms(),
            )?;
            self.emit_progress(name, 0);
            tracing::info!(%scan_id, stage = name, "running stage");

            match stage.run(&self.ctx, &results_cache).await {
                Ok(value) => {
                    results_cache.insert(name.to_string(), value);
                    progress.insert(name.to_string(), 100);
                    // A pause raised mid-stage must not flip the row back
                    // to running.
                    let status = if self.signals.is_paused() {
                        ScanStatus::Paused
                    } else {
                        ScanStatus::Running
                    };
                    self.ctx.store.update_scan_status(
                        &scan_id,
                        status,
                        Some(name),
                        Some(&progress),
                        None,
                        self.clock.epoch_ms(),
                    )?;

                    let mut payload = CheckpointPayload {
                        scan_id: scan_id.to_string(),
                        timestamp: self.clock.epoch_ms(),
                        current_module: name.to_string(),
                        completed_modules: self.stages[..=index]
                            .iter()
                            .map(|s| s.name().to_string())
                            .collect(),
                        pending_modules: self.stages[index + 1..]
                            .iter()
                            .map(|s| s.name().to_string())
                            .collect(),
                        module_state: HashMap::new(),
                        results_cache: results_cache.clone(),
                        checksum: String::new(),
                    };
                    self.checkpoints.save(&self.ctx.store, &mut payload)?;
                    self.emit_progress(name, 100);
                }
                Err(StageError::Store(error)) => return Err(error),
                Err(error) => {
                    tracing::error!(
                        %scan_id,
                        stage = name,
                        kind = %error.kind(),
                        %error,
                        "stage failed"
                    );
                    if self.ctx.config.stop_on_error {
                        return Ok(PipelineEnd::Failed(format!("stage {name} failed: {error}")));
                    }
                }
            }
        }

        // A pause raised during the last stage still holds the scan at a
        // boundary; only a resume (or stop) lets it reach terminal state.
        while self.signals.is_paused() && !self.signals.is_stopped() {
            tokio::time::sleep(BOUNDARY_POLL).await;
        }
        if self.signals.is_stopped() {
            return Ok(PipelineEnd::Stopped);
        }
        self.checkpoints.clear(&self.ctx.store, &scan_id)?;
        Ok(PipelineEnd::Completed)
    }

    fn emit_progress(&self, stage: &str, percent: u8) {
        if let Some(events) = &self.events {
            let _ = events.send(EngineEvent::ScanProgress {
                scan_id: self.ctx.scan_id.to_string(),
                stage: stage.to_string(),
                percent,
            });
        }
    }
}

fn stage_names(stages: &[Box<dyn Stage>]) -> Vec<&str> {
    stages.iter().map(|s| s.name()).collect()
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
