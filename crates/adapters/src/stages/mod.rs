// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The nine pipeline stage adapters, one module per tool family.

pub mod dns;
pub mod fuzz;
pub mod http;
pub mod js;
pub mod nuclei;
pub mod patterns;
pub mod ports;
pub mod subdomain;
pub mod wayback;

use serde_json::Value;

/// Hostnames recorded by the subdomain stage, read back out of `prior`.
pub(crate) fn prior_hostnames(prior: &std::collections::HashMap<String, Value>) -> Vec<String> {
    prior
        .get("subdomain_enum")
        .and_then(|v| v.get("subdomains"))
        .and_then(|v| v.as_array())
        .map(|subs| {
            subs.iter()
                .filter_map(|s| s.get("subdomain").and_then(|h| h.as_str()))
                .map(|h| h.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Live probe results recorded by the HTTP stage.
pub(crate) fn prior_live_results(prior: &std::collections::HashMap<String, Value>) -> Vec<Value> {
    prior
        .get("http_probe")
        .and_then(|v| v.get("results"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

/// Live URLs (status > 0) from the HTTP stage.
pub(crate) fn prior_live_urls(prior: &std::collections::HashMap<String, Value>) -> Vec<String> {
    prior_live_results(prior)
        .iter()
        .filter(|r| r.get("status_code").and_then(|s| s.as_u64()).unwrap_or(0) > 0)
        .filter_map(|r| r.get("url").and_then(|u| u.as_str()))
        .map(|u| u.to_string())
        .collect()
}
