// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! URL pattern matching for vulnerability indicators.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use dn_core::{Finding, Severity};

use crate::stage::{Stage, StageCtx, StageError};
use crate::stages::prior_live_urls;

pub struct GfPatterns;

struct UrlPattern {
    name: &'static str,
    regex: Regex,
    severity: Severity,
    description: &'static str,
}

fn url_patterns() -> &'static [UrlPattern] {
    static PATTERNS: OnceLock<Vec<UrlPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let raw: [(&str, &str, Severity, &str); 9] = [
            (
                "xss",
                r#"[?&][^=]*=([^&]*)(<|>|"|'|%3C|%3E|%22|%27)"#,
                Severity::High,
                "reflected special characters in parameter",
            ),
            (
                "sqli",
                r"(?i)[?&][^=]*=([^&]*)(union|select|insert|update|delete|drop|--|%23)",
                Severity::Critical,
                "SQL keywords in parameter",
            ),
            (
                "ssrf",
                r"(?i)[?&](url|path|dest|redirect|uri|src|next|continue)=",
                Severity::High,
                "URL-like parameter names",
            ),
            (
                "lfi",
                r"(?i)[?&][^=]*=([^&]*)(\.\./|%2e%2e|/etc/|/var/|/proc/|/home/)",
                Severity::High,
                "path traversal patterns",
            ),
            (
                "rce",
                r"(?i)[?&][^=]*=([^&]*)(;|`|\$\(|%60|wget|curl|bash)",
                Severity::Critical,
                "command injection patterns",
            ),
            (
                "idor",
                r"(?i)[?&](id|user|account|number|order|item|profile|doc|file)=[0-9]+",
                Severity::Medium,
                "numeric identifier parameter",
            ),
            (
                "debug",
                r"(?i)(debug|staging|internal|beta)[=/.]",
                Severity::Low,
                "debug or pre-production endpoint",
            ),
            (
                "api_key",
                r"(?i)[?&](api[_-]?key|token|secret|password|passwd|pwd|auth)=[^&]{8,}",
                Severity::Critical,
                "credential material in URL",
            ),
            (
                "s3_bucket",
                r"(?i)(s3\.amazonaws\.com|\.s3-[a-z0-9-]+\.amazonaws\.com|s3://)",
                Severity::Medium,
                "S3 bucket reference",
            ),
        ];
        raw.into_iter()
            .filter_map(|(name, pattern, severity, description)| {
                Regex::new(pattern).ok().map(|regex| UrlPattern { name, regex, severity, description })
            })
            .collect()
    })
}

#[async_trait]
impl Stage for GfPatterns {
    fn name(&self) -> &'static str {
        "gf_patterns"
    }

    async fn run(&self, ctx: &StageCtx, prior: &HashMap<String, Value>) -> Result<Value, StageError> {
        if !ctx.config.patterns.enabled {
            return Ok(json!({"analyzed": 0, "matches": 0}));
        }

        let urls = collect_urls(prior);
        if urls.is_empty() {
            tracing::info!(scan_id = %ctx.scan_id, "no urls to pattern-match");
            return Ok(json!({"analyzed": 0, "matches": 0}));
        }

        let mut total_matches = 0usize;
        for url in &urls {
            let classes = classify_url(url);
            if classes.is_empty() {
                continue;
            }
            total_matches += classes.len();

            let names: Vec<String> = classes.iter().map(|p| p.name.to_string()).collect();
            ctx.store.update_endpoint_patterns(&ctx.scan_id, url, &names)?;

            // Credential material in a URL is a finding on its own; the
            // other classes only steer later fuzzing.
            if let Some(pattern) = classes.iter().find(|p| p.name == "api_key") {
                let mut finding = Finding::new(
                    ctx.scan_id.clone(),
                    "Credential material in URL",
                    pattern.severity,
                    "gf-patterns",
                );
                finding.affected_url = Some(url.clone());
                finding.evidence = Some(pattern.description.to_string());
                ctx.store.add_finding(&finding)?;
            }
        }

        tracing::info!(
            scan_id = %ctx.scan_id,
            analyzed = urls.len(),
            matches = total_matches,
            "pattern analysis done"
        );

        Ok(json!({
            "analyzed": urls.len(),
            "matches": total_matches,
        }))
    }
}

/// Every URL seen so far: live probes, fuzzing hits, historical URLs.
pub(crate) fn collect_urls(prior: &HashMap<String, Value>) -> Vec<String> {
    let mut urls: BTreeSet<String> = prior_live_urls(prior).into_iter().collect();

    if let Some(results) = prior
        .get("fuzzing")
        .and_then(|v| v.get("results"))
        .and_then(|v| v.as_array())
    {
        urls.extend(
            results
                .iter()
                .filter_map(|r| r.get("url").and_then(|u| u.as_str()))
                .map(|u| u.to_string()),
        );
    }
    if let Some(wayback) = prior
        .get("wayback_urls")
        .and_then(|v| v.get("urls"))
        .and_then(|v| v.as_array())
    {
        urls.extend(wayback.iter().filter_map(|u| u.as_str()).map(|u| u.to_string()));
    }
    urls.into_iter().collect()
}

fn classify_url(url: &str) -> Vec<&'static UrlPattern> {
    url_patterns().iter().filter(|p| p.regex.is_match(url)).collect()
}

/// Pattern class names matching a URL (test seam).
pub(crate) fn classify(url: &str) -> Vec<&'static str> {
    classify_url(url).iter().map(|p| p.name).collect()
}

#[cfg(test)]
#[path = "patterns_tests.rs"]
mod tests;
