// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The stage seam between the engine and the scanners.
//!
//! A stage is a pure function over `(target, scan, config, prior results)`
//! that writes artifacts through the store and returns a serializable
//! result record. Stages never see each other — only the capability
//! bundle in [`StageCtx`] and the prior-results map.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use dn_core::{ErrorKind, ScanConfig, ScanId, Target};
use dn_proc::{RunError, RunOutcome, RunRequest, Supervisor};
use dn_storage::{ArtifactStore, StoreError};

use crate::registry::{ToolError, ToolRegistry};
use crate::triage::TriageAdapter;
use crate::wordlists::WordlistDir;

/// Capability bundle handed to every stage.
///
/// Constructed once per scan by the engine; stages must not reach for
/// anything outside it.
pub struct StageCtx {
    pub target: Target,
    pub scan_id: ScanId,
    pub config: ScanConfig,
    pub supervisor: Supervisor,
    pub store: Arc<ArtifactStore>,
    pub tools: Arc<ToolRegistry>,
    pub wordlists: Arc<WordlistDir>,
    pub http: reqwest::Client,
    pub triage: Option<Arc<TriageAdapter>>,
}

impl StageCtx {
    /// Default per-tool timeout from the scan config.
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.config.tool_timeout_secs)
    }
}

/// Errors surfaced from a stage.
///
/// A store failure is fatal to the scan; everything else is absorbed by
/// the engine (logged and recorded) unless `stop_on_error` is set.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Failed(String),
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::Store(_) => ErrorKind::StoreWriteFailure,
            StageError::Failed(_) => ErrorKind::StageException,
        }
    }
}

/// One named step of the scanning pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the stage. `prior` maps completed stage names to their result
    /// records; an empty map must not be an error.
    async fn run(&self, ctx: &StageCtx, prior: &HashMap<String, Value>) -> Result<Value, StageError>;
}

/// Result of driving one external tool, with the error taxonomy applied.
///
/// Partial output is kept for every outcome — a tool that timed out or
/// exited non-zero usually produced parseable lines first.
pub struct ToolRun {
    pub lines: Vec<String>,
    /// Taxonomy tag when the run was not a clean exit.
    pub error: Option<ErrorKind>,
}

impl ToolRun {
    fn empty(error: ErrorKind) -> Self {
        Self { lines: Vec::new(), error: Some(error) }
    }
}

/// Ensure a tool and run it, classifying the outcome.
///
/// Spawn failures and missing tools are recorded, not raised; the stage
/// decides what to do with an empty result.
pub async fn run_tool(ctx: &StageCtx, tool: &str, command: String, timeout: Duration) -> ToolRun {
    match ctx.tools.ensure(tool).await {
        Ok(()) => {}
        Err(ToolError::Disabled(_)) => {
            tracing::debug!(tool, "tool disabled, skipping");
            return ToolRun::empty(ErrorKind::ToolSpawnFailed);
        }
        Err(error) => {
            tracing::warn!(tool, %error, "tool unavailable");
            return ToolRun::empty(ErrorKind::ToolSpawnFailed);
        }
    }

    let request = RunRequest::new(command, timeout).tag(format!("{}:{}", ctx.scan_id, tool));
    let output = match ctx.supervisor.run(request).await {
        Ok(output) => output,
        Err(RunError::Spawn { source, .. }) => {
            tracing::warn!(tool, error = %source, "tool spawn failed");
            return ToolRun::empty(ErrorKind::ToolSpawnFailed);
        }
        Err(RunError::Tokenize(error)) => {
            tracing::warn!(tool, %error, "bad tool command line");
            return ToolRun::empty(ErrorKind::ToolSpawnFailed);
        }
    };

    let lines: Vec<String> = output
        .stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.to_string())
        .collect();

    let error = match output.outcome {
        RunOutcome::Exited(0) => None,
        RunOutcome::Exited(code) => {
            tracing::warn!(tool, code, "tool exited non-zero, keeping partial output");
            Some(ErrorKind::ToolExitNonZero)
        }
        RunOutcome::TimedOut => {
            tracing::warn!(tool, "timeout, keeping partial output");
            Some(ErrorKind::ToolTimeout)
        }
        RunOutcome::Stopped => Some(ErrorKind::StopRequested),
    };

    ToolRun { lines, error }
}

/// Write a list of lines to a temp file for `-l`-style tool input.
pub(crate) fn write_list_file(lines: &[String]) -> Result<tempfile::NamedTempFile, StageError> {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new()
        .map_err(|e| StageError::Failed(format!("temp file: {e}")))?;
    for line in lines {
        writeln!(file, "{line}").map_err(|e| StageError::Failed(format!("temp file: {e}")))?;
    }
    Ok(file)
}

/// The full pipeline in execution order.
pub fn default_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(crate::stages::subdomain::SubdomainEnum),
        Box::new(crate::stages::dns::DnsResolution),
        Box::new(crate::stages::http::HttpProbe),
        Box::new(crate::stages::ports::PortScan),
        Box::new(crate::stages::wayback::WaybackUrls),
        Box::new(crate::stages::js::JsAnalysis),
        Box::new(crate::stages::patterns::GfPatterns),
        Box::new(crate::stages::fuzz::Fuzzing),
        Box::new(crate::stages::nuclei::NucleiScan),
    ]
}
