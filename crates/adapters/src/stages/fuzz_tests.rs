// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn probe_results(statuses: &[u64]) -> HashMap<String, Value> {
    let results: Vec<Value> = statuses
        .iter()
        .enumerate()
        .map(|(i, s)| json!({"url": format!("https://h{i}.example.com/"), "status_code": s}))
        .collect();
    let mut prior = HashMap::new();
    prior.insert("http_probe".to_string(), json!({ "results": results }));
    prior
}

#[test]
fn targets_prefer_interesting_statuses() {
    let prior = probe_results(&[200, 404, 403, 500]);
    let targets = fuzz_targets(&prior, 10);
    assert_eq!(
        targets,
        ["https://h0.example.com", "https://h2.example.com"]
    );
}

#[test]
fn targets_fall_back_to_any_live_host() {
    let prior = probe_results(&[500, 404]);
    let targets = fuzz_targets(&prior, 10);
    assert_eq!(targets.len(), 2);
}

#[test]
fn target_cap_applies() {
    let prior = probe_results(&[200, 200, 200, 200, 200, 200, 200]);
    assert_eq!(fuzz_targets(&prior, 5).len(), 5);
}

#[test]
fn ffuf_lines_substitute_fuzz_keyword() {
    let lines = vec![
        json!({
            "url": "https://example.com/FUZZ",
            "input": {"FUZZ": "admin"},
            "status": 403,
            "length": 1234
        })
        .to_string(),
        "nonsense".to_string(),
    ];

    let results = parse_ffuf(&lines, "directory");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["url"], "https://example.com/admin");
    assert_eq!(results[0]["status_code"], 403);
    assert_eq!(results[0]["type"], "directory");
}
