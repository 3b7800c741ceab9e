// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn sample_event() -> String {
    json!({
        "template-id": "git-config-exposure",
        "host": "https://www.example.com",
        "matcher-name": "git-config",
        "extracted-results": ["[core]"],
        "curl-command": "curl https://www.example.com/.git/config",
        "info": {
            "name": "Git Config Exposure",
            "severity": "medium",
            "description": "Git configuration file is publicly reachable"
        }
    })
    .to_string()
}

#[test]
fn nuclei_event_parses() {
    let parsed = parse_nuclei_line(&sample_event()).unwrap();

    assert_eq!(parsed["name"], "Git Config Exposure");
    assert_eq!(parsed["severity"], "medium");
    assert_eq!(parsed["template_id"], "git-config-exposure");
    assert_eq!(parsed["url"], "https://www.example.com");
}

#[test]
fn non_event_lines_are_skipped() {
    assert!(parse_nuclei_line("[INF] templates loaded").is_none());
    assert!(parse_nuclei_line(r#"{"no_info": true}"#).is_none());
}

#[test]
fn finding_built_from_event() {
    let scan_id = ScanId::new();
    let parsed = parse_nuclei_line(&sample_event()).unwrap();
    let finding = finding_from(&scan_id, &parsed);

    assert_eq!(finding.title, "Git Config Exposure");
    assert_eq!(finding.severity, Severity::Medium);
    assert_eq!(finding.affected_url.as_deref(), Some("https://www.example.com"));
    assert_eq!(finding.template_id.as_deref(), Some("git-config-exposure"));
    assert_eq!(finding.poc_commands.len(), 1);
    assert!(finding.evidence.is_some());
    assert!(!finding.false_positive);
}

#[test]
fn unknown_severity_defaults_to_info() {
    let scan_id = ScanId::new();
    let raw = json!({"name": "X", "severity": "weird", "url": ""});
    let finding = finding_from(&scan_id, &raw);
    assert_eq!(finding.severity, Severity::Info);
    assert!(finding.affected_url.is_none());
}
