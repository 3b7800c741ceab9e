// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DNS resolution of discovered hostnames via dnsx.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::stage::{run_tool, write_list_file, Stage, StageCtx, StageError};
use crate::stages::prior_hostnames;

pub struct DnsResolution;

#[async_trait]
impl Stage for DnsResolution {
    fn name(&self) -> &'static str {
        "dns_resolution"
    }

    async fn run(&self, ctx: &StageCtx, prior: &HashMap<String, Value>) -> Result<Value, StageError> {
        let hostnames = prior_hostnames(prior);
        if hostnames.is_empty() {
            tracing::info!(scan_id = %ctx.scan_id, "no subdomains to resolve");
            return Ok(json!({"resolved": 0, "wildcards": [], "resolutions": {}}));
        }

        let list = write_list_file(&hostnames)?;
        let run = run_tool(
            ctx,
            "dnsx",
            format!("dnsx -l {} -a -aaaa -silent -json", list.path().display()),
            ctx.tool_timeout(),
        )
        .await;

        let resolutions = parse_resolutions(&run.lines);
        for (hostname, addresses) in &resolutions {
            ctx.store
                .update_subdomain_resolution(&ctx.scan_id, hostname, addresses)?;
        }

        let wildcards = if ctx.config.dns.wildcard_detection {
            self.detect_wildcard(ctx).await
        } else {
            Vec::new()
        };

        tracing::info!(
            scan_id = %ctx.scan_id,
            resolved = resolutions.len(),
            total = hostnames.len(),
            "dns resolution done"
        );

        Ok(json!({
            "resolved": resolutions.len(),
            "wildcards": wildcards,
            "resolutions": resolutions,
        }))
    }
}

impl DnsResolution {
    /// A random label that resolves means the zone wildcards everything,
    /// so per-hostname resolution results are untrustworthy.
    async fn detect_wildcard(&self, ctx: &StageCtx) -> Vec<String> {
        let domain = &ctx.target.primary_domain;
        let probe = format!("{}.{domain}", random_label());
        let run = run_tool(
            ctx,
            "dnsx",
            format!("dnsx -d {probe} -a -silent"),
            std::time::Duration::from_secs(30),
        )
        .await;
        if run.lines.iter().any(|l| !l.trim().is_empty()) {
            tracing::warn!(%domain, "wildcard DNS detected");
            vec![domain.clone()]
        } else {
            Vec::new()
        }
    }
}

/// dnsx `-json` lines: `{host, a: [..], aaaa: [..]}`; A records first.
pub(crate) fn parse_resolutions(lines: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut resolutions = BTreeMap::new();
    for line in lines {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let Some(host) = value.get("host").and_then(|h| h.as_str()) else {
            continue;
        };
        let mut addresses = Vec::new();
        for field in ["a", "aaaa"] {
            if let Some(records) = value.get(field).and_then(|r| r.as_array()) {
                addresses.extend(
                    records
                        .iter()
                        .filter_map(|r| r.as_str())
                        .map(|r| r.to_string()),
                );
            }
        }
        if !addresses.is_empty() {
            resolutions.insert(host.to_string(), addresses);
        }
    }
    resolutions
}

fn random_label() -> String {
    const ALPHABET: [char; 26] = [
        'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
        's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    ];
    nanoid::nanoid!(20, &ALPHABET)
}

#[cfg(test)]
#[path = "dns_tests.rs"]
mod tests;
