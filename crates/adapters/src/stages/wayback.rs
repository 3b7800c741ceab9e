// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Historical URL discovery: gau, waybackurls, and the CDX API.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::{json, Value};

use dn_core::Endpoint;

use crate::stage::{run_tool, Stage, StageCtx, StageError};

pub struct WaybackUrls;

#[async_trait]
impl Stage for WaybackUrls {
    fn name(&self) -> &'static str {
        "wayback_urls"
    }

    async fn run(&self, ctx: &StageCtx, _prior: &HashMap<String, Value>) -> Result<Value, StageError> {
        let domain = ctx.target.primary_domain.clone();
        let cfg = &ctx.config.wayback;
        let timeout = ctx.tool_timeout();

        let mut urls: BTreeSet<String> = BTreeSet::new();

        if cfg.use_gau {
            let run = run_tool(ctx, "gau", format!("gau {domain} --subs --threads 5"), timeout).await;
            urls.extend(http_urls(&run.lines));
        }
        if cfg.use_waybackurls {
            let run = run_tool(ctx, "waybackurls", format!("waybackurls {domain}"), timeout).await;
            urls.extend(http_urls(&run.lines));
        }
        if cfg.use_cdx_api {
            urls.extend(query_cdx(&ctx.http, &domain).await);
        }

        let categories = categorize_urls(&urls);
        let parameters = extract_parameters(&urls);

        for url in urls.iter().take(cfg.max_saved_urls) {
            let mut endpoint = Endpoint::new(ctx.scan_id.clone(), url.clone(), "wayback");
            endpoint.parameters = query_params(url);
            ctx.store.add_endpoint(&endpoint)?;
        }

        tracing::info!(
            scan_id = %ctx.scan_id,
            urls = urls.len(),
            parameters = parameters.len(),
            "historical url discovery done"
        );

        Ok(json!({
            "urls_discovered": urls.len(),
            "unique_parameters": parameters.len(),
            "urls": urls.iter().take(100).collect::<Vec<_>>(),
            "parameters": parameters,
            "categories": categories.iter().map(|(k, v)| (k, v.len())).collect::<BTreeMap<_, _>>(),
        }))
    }
}

fn http_urls(lines: &[String]) -> impl Iterator<Item = String> + '_ {
    lines
        .iter()
        .map(|l| l.trim().to_string())
        .filter(|l| l.starts_with("http"))
}

async fn query_cdx(http: &reqwest::Client, domain: &str) -> BTreeSet<String> {
    let url = format!(
        "http://web.archive.org/cdx/search/cdx?url=*.{domain}/*&output=json&fl=original&collapse=urlkey"
    );
    let rows: Vec<Vec<String>> = match http.get(&url).send().await {
        Ok(response) => match response.json().await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!(%error, "CDX API returned unparseable JSON");
                return BTreeSet::new();
            }
        },
        Err(error) => {
            tracing::warn!(%error, "CDX API query failed");
            return BTreeSet::new();
        }
    };
    // First row is the field header.
    rows.into_iter()
        .skip(1)
        .filter_map(|row| row.into_iter().next())
        .filter(|u| u.starts_with("http"))
        .collect()
}

/// Bucket URLs by rough type for the result record.
pub(crate) fn categorize_urls(urls: &BTreeSet<String>) -> BTreeMap<&'static str, Vec<String>> {
    let mut categories: BTreeMap<&'static str, Vec<String>> =
        [("js", vec![]), ("api", vec![]), ("doc", vec![]), ("other", vec![])].into();
    for url in urls {
        let lower = url.to_lowercase();
        let bucket = if lower.ends_with(".js") {
            "js"
        } else if lower.contains("/api/") || lower.contains("/v1/") || lower.contains("/v2/") {
            "api"
        } else if [".pdf", ".doc", ".docx", ".xls", ".xlsx"].iter().any(|e| lower.ends_with(e)) {
            "doc"
        } else {
            "other"
        };
        if let Some(list) = categories.get_mut(bucket) {
            list.push(url.clone());
        }
    }
    categories
}

/// Query parameter names of one URL.
pub(crate) fn query_params(url: &str) -> Vec<String> {
    let Some((_, query)) = url.split_once('?') else {
        return Vec::new();
    };
    let query = query.split('#').next().unwrap_or(query);
    let mut params: Vec<String> = query
        .split('&')
        .filter_map(|pair| pair.split('=').next())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .collect();
    params.dedup();
    params
}

/// Unique parameter names across a URL set, for downstream fuzzing.
pub(crate) fn extract_parameters(urls: &BTreeSet<String>) -> Vec<String> {
    let mut parameters = BTreeSet::new();
    for url in urls {
        parameters.extend(query_params(url));
    }
    parameters.into_iter().collect()
}

#[cfg(test)]
#[path = "wayback_tests.rs"]
mod tests;
