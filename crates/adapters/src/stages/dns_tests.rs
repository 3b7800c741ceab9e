// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn resolutions_keep_record_order() {
    let lines = vec![
        r#"{"host":"www.example.com","a":["93.184.216.34"],"aaaa":["2606:2800::1"]}"#.to_string(),
        r#"{"host":"api.example.com","a":["93.184.216.34"]}"#.to_string(),
        r#"{"host":"dead.example.com"}"#.to_string(),
        "noise".to_string(),
    ];

    let resolutions = parse_resolutions(&lines);

    assert_eq!(resolutions.len(), 2);
    assert_eq!(
        resolutions["www.example.com"],
        ["93.184.216.34", "2606:2800::1"]
    );
    assert_eq!(resolutions["api.example.com"], ["93.184.216.34"]);
    // Hosts with no records are omitted entirely.
    assert!(!resolutions.contains_key("dead.example.com"));
}

#[test]
fn random_label_is_dns_safe() {
    let label = random_label();
    assert_eq!(label.len(), 20);
    assert!(label.chars().all(|c| c.is_ascii_lowercase()));
}
