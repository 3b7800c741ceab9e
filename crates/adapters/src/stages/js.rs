// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JavaScript analysis: secret and endpoint extraction from fetched JS.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use dn_core::{Endpoint, Finding, Severity};

use crate::stage::{Stage, StageCtx, StageError};
use crate::stages::prior_live_urls;

pub struct JsAnalysis;

struct SecretPattern {
    name: &'static str,
    regex: Regex,
    severity: Severity,
}

fn secret_patterns() -> &'static [SecretPattern] {
    static PATTERNS: OnceLock<Vec<SecretPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let raw: [(&str, &str, Severity); 9] = [
            ("aws_access_key", r"AKIA[0-9A-Z]{16}", Severity::High),
            ("google_api_key", r"AIza[0-9A-Za-z_-]{35}", Severity::High),
            ("github_token", r"gh[pousr]_[A-Za-z0-9_]{36,}", Severity::High),
            (
                "slack_token",
                r"xox[baprs]-[0-9]{10,13}-[0-9]{10,13}(-[a-zA-Z0-9]{24})?",
                Severity::High,
            ),
            (
                "private_key",
                r"-----BEGIN (RSA |DSA |EC |OPENSSH )?PRIVATE KEY-----",
                Severity::Critical,
            ),
            (
                "jwt_token",
                r"eyJ[A-Za-z0-9_-]*\.eyJ[A-Za-z0-9_-]*\.[A-Za-z0-9_-]*",
                Severity::Medium,
            ),
            (
                "api_key_generic",
                r#"(?i)(api[_-]?key|apikey)\s*[:=]\s*['"][a-z0-9]{16,}['"]"#,
                Severity::Medium,
            ),
            (
                "password",
                r#"(?i)(password|passwd|pwd)\s*[:=]\s*['"][^'"]{8,}['"]"#,
                Severity::Medium,
            ),
            (
                "secret",
                r#"(?i)(secret|token)\s*[:=]\s*['"][a-z0-9]{16,}['"]"#,
                Severity::Medium,
            ),
        ];
        raw.into_iter()
            .filter_map(|(name, pattern, severity)| {
                Regex::new(pattern).ok().map(|regex| SecretPattern { name, regex, severity })
            })
            .collect()
    })
}

fn endpoint_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#"['"](/api/[a-zA-Z0-9/_-]+)['"]"#,
            r#"['"](/v[0-9]+/[a-zA-Z0-9/_-]+)['"]"#,
            r#"fetch\(['"]([^'"]+)['"]"#,
            r#"axios\.(?:get|post|put|delete)\(['"]([^'"]+)['"]"#,
        ]
        .into_iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

#[async_trait]
impl Stage for JsAnalysis {
    fn name(&self) -> &'static str {
        "js_analysis"
    }

    async fn run(&self, ctx: &StageCtx, prior: &HashMap<String, Value>) -> Result<Value, StageError> {
        let js_urls = collect_js_urls(prior, ctx.config.js.max_files);
        if js_urls.is_empty() {
            tracing::info!(scan_id = %ctx.scan_id, "no javascript files to analyze");
            return Ok(json!({"analyzed": 0, "secrets": 0, "endpoints": 0}));
        }

        let mut secrets = 0usize;
        let mut endpoints = 0usize;
        let mut analyzed = 0usize;

        for js_url in &js_urls {
            let body = match fetch(&ctx.http, js_url).await {
                Some(body) => body,
                None => continue,
            };
            analyzed += 1;

            for (name, sample, severity) in scan_secrets(&body) {
                let mut finding = Finding::new(
                    ctx.scan_id.clone(),
                    format!("Hardcoded {name} in JavaScript"),
                    severity,
                    "js-analyzer",
                );
                finding.affected_url = Some(js_url.clone());
                finding.evidence = Some(redact(&sample));
                ctx.store.add_finding(&finding)?;
                secrets += 1;
            }

            for path in scan_endpoints(&body) {
                let url = absolutize(js_url, &path);
                ctx.store.add_endpoint(&Endpoint::new(ctx.scan_id.clone(), url, "js"))?;
                endpoints += 1;
            }
        }

        tracing::info!(scan_id = %ctx.scan_id, analyzed, secrets, endpoints, "js analysis done");

        Ok(json!({
            "analyzed": analyzed,
            "secrets": secrets,
            "endpoints": endpoints,
        }))
    }
}

async fn fetch(http: &reqwest::Client, url: &str) -> Option<String> {
    match http
        .get(url)
        .timeout(std::time::Duration::from_secs(15))
        .send()
        .await
        .and_then(|r| r.error_for_status())
    {
        Ok(response) => response.text().await.ok(),
        Err(error) => {
            tracing::debug!(url, %error, "js fetch failed");
            None
        }
    }
}

/// JS file URLs from live hosts and historical discovery, capped.
pub(crate) fn collect_js_urls(prior: &HashMap<String, Value>, cap: usize) -> Vec<String> {
    let mut urls = BTreeSet::new();
    for url in prior_live_urls(prior) {
        if url.to_lowercase().ends_with(".js") {
            urls.insert(url);
        }
    }
    if let Some(wayback) = prior.get("wayback_urls").and_then(|v| v.get("urls")).and_then(|v| v.as_array()) {
        for url in wayback.iter().filter_map(|u| u.as_str()) {
            if url.to_lowercase().ends_with(".js") {
                urls.insert(url.to_string());
            }
        }
    }
    urls.into_iter().take(cap).collect()
}

/// All secret-pattern hits in a JS body: `(pattern name, matched text, severity)`.
pub(crate) fn scan_secrets(body: &str) -> Vec<(&'static str, String, Severity)> {
    let mut hits = Vec::new();
    for pattern in secret_patterns() {
        for found in pattern.regex.find_iter(body).take(5) {
            hits.push((pattern.name, found.as_str().to_string(), pattern.severity));
        }
    }
    hits
}

/// Endpoint paths referenced by the JS body.
pub(crate) fn scan_endpoints(body: &str) -> Vec<String> {
    let mut endpoints = BTreeSet::new();
    for pattern in endpoint_patterns() {
        for captures in pattern.captures_iter(body) {
            if let Some(m) = captures.get(1) {
                let path = m.as_str();
                if path.starts_with('/') || path.starts_with("http") {
                    endpoints.insert(path.to_string());
                }
            }
        }
    }
    endpoints.into_iter().collect()
}

/// Join a path found in JS onto the origin of the JS file's URL.
pub(crate) fn absolutize(js_url: &str, path: &str) -> String {
    if path.starts_with("http") {
        return path.to_string();
    }
    origin(js_url).map(|o| format!("{o}{path}")).unwrap_or_else(|| path.to_string())
}

fn origin(url: &str) -> Option<String> {
    let scheme_end = url.find("://")?;
    let rest = &url[scheme_end + 3..];
    let host_end = rest.find('/').unwrap_or(rest.len());
    Some(format!("{}{}", &url[..scheme_end + 3], &rest[..host_end]))
}

/// Keep only a prefix of the matched secret as evidence.
fn redact(sample: &str) -> String {
    let keep = sample.len().min(12);
    format!("{}…", &sample[..keep])
}

#[cfg(test)]
#[path = "js_tests.rs"]
mod tests;
