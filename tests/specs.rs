// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenarios: full pipeline runs over an in-process
//! engine with scripted stages and a real store + checkpoint directory.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use dn_adapters::{Stage, StageCtx, StageError, ToolRegistry, WordlistDir};
use dn_core::test_support::{ScanBuilder, TargetBuilder};
use dn_core::{FakeClock, Scan, ScanConfig, Subdomain, Target, STAGE_ORDER};
use dn_engine::{Pipeline, PipelineEnd, ScanSignals};
use dn_storage::{ArtifactStore, CheckpointStore};

/// What a scripted stage does when it runs.
#[derive(Clone, Copy)]
enum Script {
    /// Record two discovered hostnames.
    Subdomains,
    /// Resolve the recorded hostnames.
    Resolve,
    /// Mark both hosts live with status 200.
    Probe,
    /// Produce an empty result record.
    Empty,
    /// Raise a stage error.
    Fail,
}

struct ScriptedStage {
    name: &'static str,
    script: Script,
    runs: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl Stage for ScriptedStage {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self, ctx: &StageCtx, prior: &HashMap<String, Value>) -> Result<Value, StageError> {
        self.runs.lock().push(self.name.to_string());
        match self.script {
            Script::Subdomains => {
                for host in ["api.example.com", "www.example.com"] {
                    let subdomain = Subdomain::new(ctx.scan_id.clone(), host)
                        .with_sources(vec!["subfinder".to_string()]);
                    ctx.store.add_subdomain(&subdomain)?;
                }
                Ok(json!({
                    "total_found": 2,
                    "subdomains": [
                        {"subdomain": "api.example.com", "sources": ["subfinder"]},
                        {"subdomain": "www.example.com", "sources": ["subfinder"]},
                    ],
                }))
            }
            Script::Resolve => {
                let hosts: Vec<String> = prior
                    .get("subdomain_enum")
                    .and_then(|v| v.get("subdomains"))
                    .and_then(|v| v.as_array())
                    .map(|subs| {
                        subs.iter()
                            .filter_map(|s| s.get("subdomain").and_then(|h| h.as_str()))
                            .map(|h| h.to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                let mut resolutions = serde_json::Map::new();
                for host in &hosts {
                    ctx.store.update_subdomain_resolution(
                        &ctx.scan_id,
                        host,
                        &["93.184.216.34".to_string()],
                    )?;
                    resolutions.insert(host.clone(), json!(["93.184.216.34"]));
                }
                Ok(json!({"resolved": hosts.len(), "resolutions": resolutions}))
            }
            Script::Probe => {
                let subdomains = ctx.store.subdomains_for_scan(&ctx.scan_id)?;
                for subdomain in &subdomains {
                    ctx.store.update_subdomain_http(
                        &ctx.scan_id,
                        &subdomain.hostname,
                        200,
                        None,
                        &[],
                    )?;
                }
                Ok(json!({"probed": subdomains.len(), "live": subdomains.len()}))
            }
            Script::Empty => Ok(json!({})),
            Script::Fail => Err(StageError::Failed(format!("{} exploded", self.name))),
        }
    }
}

struct Harness {
    dir: tempfile::TempDir,
    store: Arc<ArtifactStore>,
    checkpoints: Arc<CheckpointStore>,
    target: Target,
    scan: Scan,
    runs: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(ArtifactStore::in_memory().expect("store"));
        let checkpoints =
            Arc::new(CheckpointStore::new(dir.path().join("state")).expect("state dir"));
        let target = TargetBuilder::new().name("acme").domain("example.com").build();
        store.create_target(&target).expect("target");
        let scan = ScanBuilder::new(target.id.clone()).build();
        store.create_scan(&scan).expect("scan");
        Self { dir, store, checkpoints, target, scan, runs: Arc::new(Mutex::new(Vec::new())) }
    }

    /// The nine-stage pipeline; the default script is the S1 happy path.
    fn stages(&self, overrides: &[(&'static str, Script)]) -> Vec<Box<dyn Stage>> {
        STAGE_ORDER
            .iter()
            .map(|name| {
                let script = overrides
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, s)| *s)
                    .unwrap_or(match *name {
                        "subdomain_enum" => Script::Subdomains,
                        "dns_resolution" => Script::Resolve,
                        "http_probe" => Script::Probe,
                        _ => Script::Empty,
                    });
                Box::new(ScriptedStage { name: *name, script, runs: Arc::clone(&self.runs) })
                    as Box<dyn Stage>
            })
            .collect()
    }

    fn pipeline(&self, stages: Vec<Box<dyn Stage>>, stop_on_error: bool) -> Pipeline<FakeClock> {
        let mut config = ScanConfig::default();
        config.stop_on_error = stop_on_error;
        let ctx = StageCtx {
            target: self.target.clone(),
            scan_id: self.scan.id.clone(),
            config,
            supervisor: dn_proc::Supervisor::new(),
            store: Arc::clone(&self.store),
            tools: Arc::new(ToolRegistry::builtin()),
            wordlists: Arc::new(
                WordlistDir::new(self.dir.path().join("wordlists")).expect("wordlists"),
            ),
            http: reqwest::Client::new(),
            triage: None,
        };
        Pipeline::new(
            ctx,
            stages,
            Arc::clone(&self.checkpoints),
            Arc::new(ScanSignals::default()),
            FakeClock::new(),
        )
    }

    fn ran(&self) -> Vec<String> {
        self.runs.lock().clone()
    }

    fn reset_runs(&self) {
        self.runs.lock().clear();
    }
}

fn names(stages: &[&str]) -> Vec<String> {
    stages.iter().map(|s| s.to_string()).collect()
}

// S1 — Happy path: all nine stages complete, artifacts persist, the
// checkpoint is gone at the end.
#[tokio::test]
async fn happy_path_full_pipeline() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(harness.stages(&[]), false);

    let end = pipeline.run(false).await;
    assert_eq!(end, PipelineEnd::Completed);

    assert_eq!(harness.ran(), names(&STAGE_ORDER));

    let scan = harness.store.scan(&harness.scan.id).expect("load").expect("scan");
    for stage in STAGE_ORDER {
        assert_eq!(scan.progress.get(stage), Some(&100), "stage {stage}");
    }
    assert!(scan.checkpoint.is_none());
    assert!(!harness.checkpoints.file_path(&harness.scan.id).exists());

    let subdomains = harness.store.subdomains_for_scan(&harness.scan.id).expect("subs");
    assert_eq!(subdomains.len(), 2);
    assert!(subdomains.iter().all(|s| s.is_live && s.status_code == Some(200)));
    assert!(subdomains.iter().all(|s| s.addresses == ["93.184.216.34"]));
}

// S2 — Resume after kill: the process dies after http_probe; a resumed
// run skips the first three stages and finishes the rest.
#[tokio::test]
async fn resume_after_kill_skips_completed_stages() {
    let harness = Harness::new();
    // Simulate the kill: the stage after http_probe aborts the run hard.
    let stages = harness.stages(&[("port_scan", Script::Fail)]);
    let pipeline = harness.pipeline(stages, true);
    let end = pipeline.run(false).await;
    assert!(matches!(end, PipelineEnd::Failed(_)));

    let payload = harness
        .checkpoints
        .load(&harness.store, &harness.scan.id)
        .expect("load")
        .expect("checkpoint present");
    assert_eq!(payload.current_module, "http_probe");
    assert_eq!(payload.completed_modules, names(&STAGE_ORDER[..3]));

    // "Restart": fresh stage set, resumed run.
    harness.reset_runs();
    let pipeline = harness.pipeline(harness.stages(&[]), false);
    let end = pipeline.run(true).await;

    assert_eq!(end, PipelineEnd::Completed);
    assert_eq!(harness.ran(), names(&STAGE_ORDER[3..]));

    let scan = harness.store.scan(&harness.scan.id).expect("load").expect("scan");
    assert!(scan.is_resumed);
    for stage in STAGE_ORDER {
        assert_eq!(scan.progress.get(stage), Some(&100), "stage {stage}");
    }
    assert!(scan.checkpoint.is_none());
}

// S5 — Corrupted checkpoint: arbitrary bytes in the state file force a
// restart from stage zero with is_resumed back to false.
#[tokio::test]
async fn corrupted_checkpoint_restarts_from_zero() {
    let harness = Harness::new();
    let stages = harness.stages(&[("port_scan", Script::Fail)]);
    let pipeline = harness.pipeline(stages, true);
    pipeline.run(false).await;

    std::fs::write(harness.checkpoints.file_path(&harness.scan.id), b"\x00garbage\xff")
        .expect("corrupt");

    harness.reset_runs();
    let pipeline = harness.pipeline(harness.stages(&[]), false);
    let end = pipeline.run(true).await;

    assert_eq!(end, PipelineEnd::Completed);
    assert_eq!(harness.ran(), names(&STAGE_ORDER));
    assert!(!harness.store.scan(&harness.scan.id).expect("load").expect("scan").is_resumed);
}

// Stage boundary property: a stage seeing no upstream data completes
// and yields an empty record rather than erroring.
#[tokio::test]
async fn stages_tolerate_empty_prior_results() {
    let harness = Harness::new();
    let stages: Vec<Box<dyn Stage>> = STAGE_ORDER
        .iter()
        .map(|name| {
            Box::new(ScriptedStage {
                name: *name,
                script: Script::Empty,
                runs: Arc::clone(&harness.runs),
            }) as Box<dyn Stage>
        })
        .collect();
    let pipeline = harness.pipeline(stages, true);

    assert_eq!(pipeline.run(false).await, PipelineEnd::Completed);
    assert_eq!(harness.ran().len(), STAGE_ORDER.len());
}
