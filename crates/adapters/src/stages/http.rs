// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP/HTTPS probing with httpx for live-host detection.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::stage::{run_tool, write_list_file, Stage, StageCtx, StageError};
use crate::stages::prior_hostnames;

/// Ports worth re-probing over HTTP when a prior port sweep found them.
const WEB_PORTS: [u16; 6] = [80, 443, 8080, 8443, 3000, 8000];

pub struct HttpProbe;

#[async_trait]
impl Stage for HttpProbe {
    fn name(&self) -> &'static str {
        "http_probe"
    }

    async fn run(&self, ctx: &StageCtx, prior: &HashMap<String, Value>) -> Result<Value, StageError> {
        let mut targets = prior_hostnames(prior);
        targets.extend(web_targets_from_ports(prior));

        if targets.is_empty() {
            tracing::info!(scan_id = %ctx.scan_id, "no hosts to probe");
            return Ok(json!({"probed": 0, "live": 0, "results": []}));
        }

        let cfg = &ctx.config.http;
        let list = write_list_file(&targets)?;
        let mut command = format!(
            "httpx -l {} -silent -json -timeout {} -retries {} \
             -status-code -title -tech-detect -content-length -web-server -location",
            list.path().display(),
            cfg.timeout_secs,
            cfg.retries,
        );
        if cfg.follow_redirects {
            command.push_str(" -follow-redirects");
        }

        let run = run_tool(ctx, "httpx", command, ctx.tool_timeout()).await;
        let results = parse_httpx(&run.lines);

        let mut live = 0usize;
        for result in &results {
            let status = result.get("status_code").and_then(|s| s.as_u64()).unwrap_or(0);
            if status == 0 {
                continue;
            }
            live += 1;
            let Some(host) = result.get("host").and_then(|h| h.as_str()) else {
                continue;
            };
            let tech: Vec<String> = result
                .get("tech")
                .and_then(|t| t.as_array())
                .map(|t| {
                    t.iter()
                        .filter_map(|v| v.as_str())
                        .map(|v| v.to_string())
                        .collect()
                })
                .unwrap_or_default();
            ctx.store.update_subdomain_http(
                &ctx.scan_id,
                host,
                status as u16,
                result.get("title").and_then(|t| t.as_str()),
                &tech,
            )?;
        }

        tracing::info!(scan_id = %ctx.scan_id, probed = targets.len(), live, "http probe done");

        Ok(json!({
            "probed": targets.len(),
            "live": live,
            "results": results,
        }))
    }
}

/// httpx `-json` lines, reduced to the fields downstream stages read.
pub(crate) fn parse_httpx(lines: &[String]) -> Vec<Value> {
    lines
        .iter()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(|value| value.get("url").and_then(|u| u.as_str()).is_some())
        .map(|value| {
            json!({
                "url": value.get("url").and_then(|v| v.as_str()).unwrap_or(""),
                "host": value.get("host")
                    .or_else(|| value.get("input"))
                    .and_then(|v| v.as_str())
                    .unwrap_or(""),
                "status_code": value.get("status_code").and_then(|v| v.as_u64()).unwrap_or(0),
                "title": value.get("title").and_then(|v| v.as_str()).unwrap_or(""),
                "tech": value.get("tech").cloned().unwrap_or_else(|| json!([])),
                "content_length": value.get("content_length").and_then(|v| v.as_u64()).unwrap_or(0),
                "webserver": value.get("webserver").and_then(|v| v.as_str()).unwrap_or(""),
                "location": value.get("location").and_then(|v| v.as_str()).unwrap_or(""),
            })
        })
        .collect()
}

/// `http(s)://ip:port` targets for web ports seen by a prior port sweep.
pub(crate) fn web_targets_from_ports(prior: &HashMap<String, Value>) -> Vec<String> {
    let Some(results) = prior
        .get("port_scan")
        .and_then(|v| v.get("results"))
        .and_then(|v| v.as_object())
    else {
        return Vec::new();
    };

    let mut targets = Vec::new();
    for (ip, ports) in results {
        let Some(ports) = ports.as_array() else { continue };
        for entry in ports {
            let Some(port) = entry.get("port").and_then(|p| p.as_u64()) else {
                continue;
            };
            let port = port as u16;
            if !WEB_PORTS.contains(&port) {
                continue;
            }
            let scheme = if port == 443 || port == 8443 { "https" } else { "http" };
            targets.push(format!("{scheme}://{ip}:{port}"));
        }
    }
    targets
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
