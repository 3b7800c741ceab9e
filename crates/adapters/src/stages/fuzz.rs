// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content discovery with ffuf against live hosts.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use dn_core::Endpoint;

use crate::stage::{run_tool, Stage, StageCtx, StageError};
use crate::stages::prior_live_results;

/// Status codes worth fuzzing behind.
const INTERESTING: [u64; 5] = [200, 301, 302, 401, 403];

pub struct Fuzzing;

#[async_trait]
impl Stage for Fuzzing {
    fn name(&self) -> &'static str {
        "fuzzing"
    }

    async fn run(&self, ctx: &StageCtx, prior: &HashMap<String, Value>) -> Result<Value, StageError> {
        if !ctx.config.fuzzing.enabled {
            return Ok(json!({"fuzzed": 0, "found": 0, "results": []}));
        }

        let targets = fuzz_targets(prior, ctx.config.fuzzing.max_targets);
        if targets.is_empty() {
            tracing::info!(scan_id = %ctx.scan_id, "no live hosts to fuzz");
            return Ok(json!({"fuzzed": 0, "found": 0, "results": []}));
        }

        let mut all_results = Vec::new();
        for target in &targets {
            for (wordlist, matcher, kind) in
                [("directories", "200,301,302,403", "directory"), ("files", "200", "file")]
            {
                let Some(path) = ctx.wordlists.ensure(wordlist, &ctx.http).await else {
                    tracing::warn!(wordlist, "wordlist unavailable, skipping");
                    continue;
                };
                let run = run_tool(
                    ctx,
                    "ffuf",
                    format!(
                        "ffuf -u {target}/FUZZ -w {} -mc {matcher} -rate {} -json -s",
                        path.display(),
                        ctx.config.rate_limit,
                    ),
                    ctx.tool_timeout(),
                )
                .await;
                all_results.extend(parse_ffuf(&run.lines, kind));
            }
        }

        for result in &all_results {
            let Some(url) = result.get("url").and_then(|u| u.as_str()) else {
                continue;
            };
            let mut endpoint = Endpoint::new(ctx.scan_id.clone(), url, "ffuf");
            endpoint.status_code = result
                .get("status_code")
                .and_then(|s| s.as_u64())
                .map(|s| s as u16);
            endpoint.content_length = result.get("content_length").and_then(|l| l.as_u64());
            ctx.store.add_endpoint(&endpoint)?;
        }

        tracing::info!(
            scan_id = %ctx.scan_id,
            targets = targets.len(),
            found = all_results.len(),
            "fuzzing done"
        );

        Ok(json!({
            "fuzzed": targets.len(),
            "found": all_results.len(),
            "results": all_results,
        }))
    }
}

/// Live URLs with interesting status codes, capped by config.
pub(crate) fn fuzz_targets(prior: &HashMap<String, Value>, cap: usize) -> Vec<String> {
    let live = prior_live_results(prior);
    let mut targets: Vec<String> = live
        .iter()
        .filter(|r| {
            let status = r.get("status_code").and_then(|s| s.as_u64()).unwrap_or(0);
            INTERESTING.contains(&status)
        })
        .filter_map(|r| r.get("url").and_then(|u| u.as_str()))
        .map(|u| u.trim_end_matches('/').to_string())
        .collect();

    if targets.is_empty() {
        targets = live
            .iter()
            .filter(|r| r.get("status_code").and_then(|s| s.as_u64()).unwrap_or(0) > 0)
            .filter_map(|r| r.get("url").and_then(|u| u.as_str()))
            .map(|u| u.trim_end_matches('/').to_string())
            .collect();
    }

    targets.truncate(cap);
    targets
}

/// ffuf `-json -s` lines; the FUZZ keyword is substituted back into the URL.
pub(crate) fn parse_ffuf(lines: &[String], kind: &str) -> Vec<Value> {
    lines
        .iter()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| {
            let url = value.get("url").and_then(|u| u.as_str())?;
            let input = value
                .get("input")
                .and_then(|i| i.get("FUZZ"))
                .and_then(|f| f.as_str())
                .unwrap_or("");
            Some(json!({
                "url": url.replace("/FUZZ", &format!("/{input}")),
                "status_code": value.get("status").and_then(|s| s.as_u64()).unwrap_or(0),
                "content_length": value.get("length").and_then(|l| l.as_u64()).unwrap_or(0),
                "method": "GET",
                "type": kind,
            }))
        })
        .collect()
}

#[cfg(test)]
#[path = "fuzz_tests.rs"]
mod tests;
