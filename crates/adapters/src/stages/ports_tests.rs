// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn naabu_jsonl_with_plain_fallback() {
    let lines = vec![
        r#"{"ip":"93.184.216.34","port":443}"#.to_string(),
        "example.com:8080".to_string(),
        "noise without port".to_string(),
    ];

    let open = parse_naabu(&lines, "example.com");

    assert_eq!(open.len(), 2);
    assert_eq!(open[0]["port"], 443);
    assert_eq!(open[0]["ip"], "93.184.216.34");
    assert_eq!(open[0]["service"], "https");
    assert_eq!(open[1]["port"], 8080);
    assert_eq!(open[1]["ip"], "example.com");
}

#[test]
fn nmap_service_lines() {
    let lines = vec![
        "PORT     STATE SERVICE  VERSION".to_string(),
        "443/tcp  open  ssl/http nginx 1.25.3".to_string(),
        "22/tcp   open  ssh      OpenSSH 9.6".to_string(),
        "8080/tcp closed http-proxy".to_string(),
        "Service detection performed.".to_string(),
    ];

    let services = parse_nmap_services(&lines);

    assert_eq!(
        services,
        [
            (443, "ssl/http".to_string(), Some("nginx 1.25.3".to_string())),
            (22, "ssh".to_string(), Some("OpenSSH 9.6".to_string())),
        ]
    );
}

#[parameterized(
    https = { 443, "https" },
    ssh = { 22, "ssh" },
    http_alt = { 3000, "http-alt" },
    redis = { 6379, "redis" },
    obscure = { 31337, "unknown" },
)]
fn service_guesses(port: u16, expected: &str) {
    assert_eq!(guess_service(port), expected);
}
