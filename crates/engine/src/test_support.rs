// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests: stub stages and a wired StageCtx.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;

use dn_adapters::{Stage, StageCtx, StageError, ToolRegistry, WordlistDir};
use dn_core::test_support::{ScanBuilder, TargetBuilder};
use dn_core::{Scan, ScanConfig, Target};
use dn_storage::{ArtifactStore, CheckpointStore};

/// Records every run: which stage, how many times, what prior keys it saw.
#[derive(Default)]
pub struct StageLog {
    pub runs: Mutex<Vec<String>>,
    pub prior_keys: Mutex<HashMap<String, Vec<String>>>,
}

pub enum StubBehavior {
    Ok,
    Fail,
    /// Sleep before succeeding, to hold the pipeline mid-stage.
    Slow(Duration),
}

pub struct StubStage {
    pub name: &'static str,
    pub behavior: StubBehavior,
    pub log: Arc<StageLog>,
}

#[async_trait]
impl Stage for StubStage {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self, _ctx: &StageCtx, prior: &HashMap<String, Value>) -> Result<Value, StageError> {
        self.log.runs.lock().push(self.name.to_string());
        let mut keys: Vec<String> = prior.keys().cloned().collect();
        keys.sort();
        self.log.prior_keys.lock().insert(self.name.to_string(), keys);

        match &self.behavior {
            StubBehavior::Ok => Ok(json!({"stage": self.name, "ok": true})),
            StubBehavior::Fail => Err(StageError::Failed(format!("{} exploded", self.name))),
            StubBehavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(json!({"stage": self.name, "ok": true}))
            }
        }
    }
}

/// Build a stub stage list over the first N real stage names.
pub fn stub_stages(log: &Arc<StageLog>, behaviors: Vec<(&'static str, StubBehavior)>) -> Vec<Box<dyn Stage>> {
    behaviors
        .into_iter()
        .map(|(name, behavior)| {
            Box::new(StubStage { name, behavior, log: Arc::clone(log) }) as Box<dyn Stage>
        })
        .collect()
}

pub struct Fixture {
    pub dir: TempDir,
    pub store: Arc<ArtifactStore>,
    pub checkpoints: Arc<CheckpointStore>,
    pub tools: Arc<ToolRegistry>,
    pub wordlists: Arc<WordlistDir>,
    pub target: Target,
    pub scan: Scan,
}

pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(ArtifactStore::in_memory().expect("store"));
    let checkpoints =
        Arc::new(CheckpointStore::new(dir.path().join("state")).expect("checkpoint dir"));
    let tools = Arc::new(ToolRegistry::builtin());
    let wordlists = Arc::new(WordlistDir::new(dir.path().join("wordlists")).expect("wordlists"));

    let target = TargetBuilder::new().build();
    store.create_target(&target).expect("create target");
    let scan = ScanBuilder::new(target.id.clone()).build();
    store.create_scan(&scan).expect("create scan");

    Fixture { dir, store, checkpoints, tools, wordlists, target, scan }
}

impl Fixture {
    pub fn ctx(&self) -> StageCtx {
        StageCtx {
            target: self.target.clone(),
            scan_id: self.scan.id.clone(),
            config: ScanConfig::default(),
            supervisor: dn_proc::Supervisor::new(),
            store: Arc::clone(&self.store),
            tools: Arc::clone(&self.tools),
            wordlists: Arc::clone(&self.wordlists),
            http: reqwest::Client::new(),
            triage: None,
        }
    }
}
