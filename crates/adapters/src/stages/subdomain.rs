// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subdomain enumeration: concurrent passive-source fanout.
//!
//! subfinder, amass, assetfinder, and findomain run as external tools;
//! crt.sh is queried directly. Results merge by hostname with source
//! tags unioned.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{json, Value};

use dn_core::Subdomain;

use crate::stage::{run_tool, write_list_file, Stage, StageCtx, StageError};

pub struct SubdomainEnum;

#[async_trait]
impl Stage for SubdomainEnum {
    fn name(&self) -> &'static str {
        "subdomain_enum"
    }

    async fn run(&self, ctx: &StageCtx, _prior: &HashMap<String, Value>) -> Result<Value, StageError> {
        let domain = ctx.target.primary_domain.clone();
        let cfg = ctx.config.subdomain.clone();
        let timeout = ctx.tool_timeout();

        let (subfinder, amass, assetfinder, findomain, crtsh) = tokio::join!(
            async {
                if !cfg.use_subfinder {
                    return Vec::new();
                }
                let run = run_tool(
                    ctx,
                    "subfinder",
                    format!("subfinder -d {domain} -all -silent -json"),
                    timeout,
                )
                .await;
                parse_subfinder(&run.lines)
            },
            async {
                if !cfg.use_amass {
                    return Vec::new();
                }
                let run = run_tool(
                    ctx,
                    "amass",
                    format!("amass enum -passive -d {domain} -json"),
                    timeout,
                )
                .await;
                parse_amass(&run.lines)
            },
            async {
                if !cfg.use_assetfinder {
                    return Vec::new();
                }
                let run = run_tool(
                    ctx,
                    "assetfinder",
                    format!("assetfinder --subs-only {domain}"),
                    timeout,
                )
                .await;
                parse_plain(&run.lines, &domain)
            },
            async {
                if !cfg.use_findomain {
                    return Vec::new();
                }
                let run =
                    run_tool(ctx, "findomain", format!("findomain -t {domain} -q"), timeout).await;
                parse_plain(&run.lines, &domain)
            },
            async {
                if !cfg.use_crtsh {
                    return Vec::new();
                }
                query_crtsh(&ctx.http, &domain).await
            },
        );

        // hostname → unioned source tags, ordered for stable output
        let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let harvests = [
            (subfinder, "subfinder"),
            (amass, "amass"),
            (assetfinder, "assetfinder"),
            (findomain, "findomain"),
            (crtsh, "crt.sh"),
        ];
        for (hosts, source) in harvests {
            for host in hosts {
                let sources = merged.entry(host).or_default();
                if !sources.iter().any(|s| s == source) {
                    sources.push(source.to_string());
                }
            }
        }

        if cfg.brute_force {
            self.brute_force(ctx, &domain, &cfg.wordlist, &mut merged).await?;
        }
        if cfg.permutations {
            self.resolve_permutations(ctx, &domain, &mut merged).await?;
        }

        merged.retain(|host, _| host.contains(&domain) && !ctx.target.is_excluded(host));

        for (hostname, sources) in &merged {
            let subdomain = Subdomain::new(ctx.scan_id.clone(), hostname.clone())
                .with_sources(sources.clone());
            ctx.store.add_subdomain(&subdomain)?;
        }

        tracing::info!(scan_id = %ctx.scan_id, found = merged.len(), "subdomain enumeration done");

        Ok(json!({
            "total_found": merged.len(),
            "subdomains": merged
                .iter()
                .map(|(host, sources)| json!({"subdomain": host, "sources": sources}))
                .collect::<Vec<_>>(),
        }))
    }
}

impl SubdomainEnum {
    async fn brute_force(
        &self,
        ctx: &StageCtx,
        domain: &str,
        wordlist: &str,
        merged: &mut BTreeMap<String, Vec<String>>,
    ) -> Result<(), StageError> {
        let Some(path) = ctx.wordlists.ensure(wordlist, &ctx.http).await else {
            tracing::warn!(wordlist, "wordlist unavailable, skipping brute force");
            return Ok(());
        };
        let run = run_tool(
            ctx,
            "dnsx",
            format!("dnsx -d {domain} -w {} -silent -json", path.display()),
            ctx.tool_timeout(),
        )
        .await;
        for host in parse_dnsx_hosts(&run.lines) {
            merged.entry(host).or_insert_with(|| vec!["brute-force".to_string()]);
        }
        Ok(())
    }

    async fn resolve_permutations(
        &self,
        ctx: &StageCtx,
        domain: &str,
        merged: &mut BTreeMap<String, Vec<String>>,
    ) -> Result<(), StageError> {
        let bases: Vec<String> = merged.keys().cloned().collect();
        let candidates = generate_permutations(domain, &bases);
        if candidates.is_empty() {
            return Ok(());
        }
        let list = write_list_file(&candidates)?;
        let run = run_tool(
            ctx,
            "dnsx",
            format!("dnsx -l {} -silent -json", list.path().display()),
            ctx.tool_timeout(),
        )
        .await;
        for host in parse_dnsx_hosts(&run.lines) {
            merged.entry(host).or_insert_with(|| vec!["permutation".to_string()]);
        }
        Ok(())
    }
}

/// subfinder emits JSONL with a `host` field, or plain hostnames when
/// JSON output is unavailable.
pub(crate) fn parse_subfinder(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| {
            match serde_json::from_str::<Value>(line) {
                Ok(value) => value.get("host").and_then(|h| h.as_str()).map(|h| h.to_string()),
                // Plain-text fallback
                Err(_) if !line.starts_with('[') => Some(line.trim().to_string()),
                Err(_) => None,
            }
        })
        .filter(|h| !h.is_empty())
        .collect()
}

/// amass JSONL carries the hostname in `name`.
pub(crate) fn parse_amass(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| value.get("name").and_then(|n| n.as_str()).map(|n| n.to_string()))
        .filter(|h| !h.is_empty())
        .collect()
}

/// Host-per-line output, scoped to the target domain.
pub(crate) fn parse_plain(lines: &[String], domain: &str) -> Vec<String> {
    lines
        .iter()
        .map(|l| l.trim().to_string())
        .filter(|h| !h.is_empty() && h.contains(domain))
        .collect()
}

/// dnsx JSONL carries the resolved name in `host`.
pub(crate) fn parse_dnsx_hosts(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| value.get("host").and_then(|h| h.as_str()).map(|h| h.to_string()))
        .filter(|h| !h.is_empty())
        .collect()
}

async fn query_crtsh(http: &reqwest::Client, domain: &str) -> Vec<String> {
    let url = format!("https://crt.sh/?q=%.{domain}&output=json");
    let entries: Vec<Value> = match http.get(&url).send().await {
        Ok(response) => match response.json().await {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(%error, "crt.sh returned unparseable JSON");
                return Vec::new();
            }
        },
        Err(error) => {
            tracing::warn!(%error, "crt.sh query failed");
            return Vec::new();
        }
    };

    let mut seen = std::collections::BTreeSet::new();
    for entry in entries {
        let Some(names) = entry.get("name_value").and_then(|n| n.as_str()) else {
            continue;
        };
        for name in names.split('\n') {
            let name = name.trim();
            if !name.is_empty() && name.contains(domain) && !name.starts_with('*') {
                seen.insert(name.to_string());
            }
        }
    }
    seen.into_iter().collect()
}

/// Candidate hostnames derived from discovered labels (dev-api, api-staging, …).
pub(crate) fn generate_permutations(domain: &str, hosts: &[String]) -> Vec<String> {
    const PREFIXES: [&str; 8] = ["dev", "staging", "test", "api", "admin", "portal", "app", "web"];
    const SUFFIXES: [&str; 8] = ["dev", "staging", "test", "prod", "1", "2", "old", "new"];

    let mut candidates = std::collections::BTreeSet::new();
    let dotted = format!(".{domain}");
    for host in hosts {
        if host == domain {
            continue;
        }
        let label = host
            .strip_suffix(&dotted)
            .unwrap_or(host)
            .rsplit('.')
            .next()
            .unwrap_or_default();
        if label.is_empty() {
            continue;
        }
        for prefix in PREFIXES {
            candidates.insert(format!("{prefix}-{label}{dotted}"));
            candidates.insert(format!("{prefix}{label}{dotted}"));
        }
        for suffix in SUFFIXES {
            candidates.insert(format!("{label}-{suffix}{dotted}"));
            candidates.insert(format!("{label}{suffix}{dotted}"));
        }
    }
    for host in hosts {
        candidates.remove(host);
    }
    candidates.into_iter().collect()
}

#[cfg(test)]
#[path = "subdomain_tests.rs"]
mod tests;
