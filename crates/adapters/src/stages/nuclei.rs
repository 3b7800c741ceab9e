// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template-driven vulnerability matching with nuclei.
//!
//! Findings stream in as JSONL on stdout and are triaged inline (best
//! effort) before being persisted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use dn_core::{Finding, ScanId, Severity};
use dn_proc::{LineSink, RunRequest};

use crate::stage::{run_tool, write_list_file, Stage, StageCtx, StageError};
use crate::stages::prior_live_urls;

/// Whole-run budget; individual template requests are bounded by the
/// `-timeout` flag.
const NUCLEI_BUDGET: Duration = Duration::from_secs(1800);

pub struct NucleiScan;

#[async_trait]
impl Stage for NucleiScan {
    fn name(&self) -> &'static str {
        "nuclei_scan"
    }

    async fn run(&self, ctx: &StageCtx, prior: &HashMap<String, Value>) -> Result<Value, StageError> {
        let targets = prior_live_urls(prior);
        if targets.is_empty() {
            tracing::info!(scan_id = %ctx.scan_id, "no live hosts for vulnerability matching");
            return Ok(json!({"scanned": 0, "findings": 0, "verified": 0}));
        }

        let cfg = ctx.config.nuclei.clone();
        if let Err(error) = ctx.tools.ensure("nuclei").await {
            tracing::warn!(scan_id = %ctx.scan_id, %error, "nuclei unavailable, no findings produced");
            return Ok(json!({"scanned": 0, "findings": 0, "verified": 0}));
        }

        if cfg.update_templates {
            let run = run_tool(ctx, "nuclei", "nuclei -ut".to_string(), Duration::from_secs(300)).await;
            if run.error.is_some() {
                tracing::warn!("template update failed, continuing with installed templates");
            }
        }

        let list = write_list_file(&targets)?;
        let mut command = format!(
            "nuclei -l {} -severity {} -rate-limit {} -timeout {} -json -silent",
            list.path().display(),
            cfg.severity,
            cfg.rate_limit,
            cfg.timeout_secs,
        );
        if let Some(tags) = &cfg.tags {
            command.push_str(&format!(" -tags {tags}"));
        }
        if let Some(exclude) = &cfg.exclude_tags {
            command.push_str(&format!(" -exclude-tags {exclude}"));
        }

        // Findings are parsed off the stream so a timeout or stop still
        // keeps everything seen so far.
        let parsed: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let sink: LineSink = {
            let parsed = Arc::clone(&parsed);
            Box::new(move |line: &str| {
                if let Some(value) = parse_nuclei_line(line) {
                    parsed.lock().push(value);
                }
            })
        };

        let request = RunRequest::new(command, NUCLEI_BUDGET)
            .tag(format!("{}:nuclei", ctx.scan_id));
        match ctx.supervisor.run_streaming(request, Some(sink), None).await {
            Ok(output) => {
                if !output.success() {
                    tracing::warn!(
                        scan_id = %ctx.scan_id,
                        return_code = output.return_code(),
                        "nuclei ended abnormally, keeping partial findings"
                    );
                }
            }
            Err(error) => {
                tracing::warn!(scan_id = %ctx.scan_id, %error, "nuclei spawn failed");
                return Ok(json!({"scanned": targets.len(), "findings": 0, "verified": 0}));
            }
        }

        let raw_findings = Arc::try_unwrap(parsed)
            .map(|m| m.into_inner())
            .unwrap_or_default();
        let mut verified = 0usize;
        let total = raw_findings.len();

        for raw in raw_findings {
            let mut finding = finding_from(&ctx.scan_id, &raw);
            if cfg.llm_filter {
                if let Some(triage) = &ctx.triage {
                    let review = triage.review(&finding).await;
                    finding.false_positive = review.false_positive;
                    finding.severity = review.adjusted_severity;
                    finding.triage_rationale = Some(review.rationale);
                    finding.triage_model = review.model_id;
                }
            }
            if !finding.false_positive {
                verified += 1;
            }
            ctx.store.add_finding(&finding)?;
        }

        tracing::info!(
            scan_id = %ctx.scan_id,
            scanned = targets.len(),
            findings = total,
            verified,
            "vulnerability matching done"
        );

        Ok(json!({
            "scanned": targets.len(),
            "findings": total,
            "verified": verified,
        }))
    }
}

/// One nuclei JSONL event, reduced to the fields the finding needs.
pub(crate) fn parse_nuclei_line(line: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(line).ok()?;
    let info = value.get("info")?;
    Some(json!({
        "name": info.get("name").and_then(|n| n.as_str()).unwrap_or("Unknown"),
        "severity": info.get("severity").and_then(|s| s.as_str()).unwrap_or("info"),
        "description": info.get("description").and_then(|d| d.as_str()).unwrap_or(""),
        "url": value.get("host").and_then(|h| h.as_str()).unwrap_or(""),
        "template_id": value.get("template-id").and_then(|t| t.as_str()).unwrap_or(""),
        "matcher_name": value.get("matcher-name").and_then(|m| m.as_str()).unwrap_or(""),
        "extracted_results": value.get("extracted-results").cloned().unwrap_or_else(|| json!([])),
        "curl_command": value.get("curl-command").and_then(|c| c.as_str()).unwrap_or(""),
    }))
}

/// Build the finding row from a parsed nuclei event.
pub(crate) fn finding_from(scan_id: &ScanId, raw: &Value) -> Finding {
    let severity = raw
        .get("severity")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<Severity>().ok())
        .unwrap_or(Severity::Info);
    let mut finding = Finding::new(
        scan_id.clone(),
        raw.get("name").and_then(|n| n.as_str()).unwrap_or("Unknown"),
        severity,
        "nuclei",
    );
    finding.affected_url = raw
        .get("url")
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
        .map(|u| u.to_string());
    finding.template_id = raw
        .get("template_id")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string());
    finding.evidence = raw
        .get("extracted_results")
        .map(|e| e.to_string())
        .filter(|e| e != "[]");
    if let Some(curl) = raw.get("curl_command").and_then(|c| c.as_str()) {
        if !curl.is_empty() {
            finding.poc_commands = vec![curl.to_string()];
        }
    }
    finding
}

#[cfg(test)]
#[path = "nuclei_tests.rs"]
mod tests;
