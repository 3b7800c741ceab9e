// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn present_tool() -> ToolSpec {
    // `sh` exists everywhere the tests run.
    ToolSpec {
        name: "sh".to_string(),
        binary_path: "sh".to_string(),
        install_cmd: None,
        version_probe: None,
        category: "test".to_string(),
        enabled: true,
    }
}

fn missing_tool(install_cmd: Option<&str>) -> ToolSpec {
    ToolSpec {
        name: "ghost".to_string(),
        binary_path: "definitely-not-a-real-binary-xyz".to_string(),
        install_cmd: install_cmd.map(|s| s.to_string()),
        version_probe: None,
        category: "test".to_string(),
        enabled: true,
    }
}

#[tokio::test]
async fn ensure_succeeds_for_present_binary() {
    let registry = ToolRegistry::from_specs([present_tool()]);
    registry.ensure("sh").await.unwrap();
    // Second call hits the memo.
    registry.ensure("sh").await.unwrap();
}

#[tokio::test]
async fn ensure_fails_for_missing_binary_without_installer() {
    let registry = ToolRegistry::from_specs([missing_tool(None)]);
    let err = registry.ensure("ghost").await.unwrap_err();
    assert!(matches!(err, ToolError::Unavailable(_)));

    // The failure is memoized, not retried.
    let err = registry.ensure("ghost").await.unwrap_err();
    assert!(matches!(err, ToolError::Unavailable(_)));
}

#[tokio::test]
async fn unknown_tool_is_an_error() {
    let registry = ToolRegistry::builtin();
    assert!(matches!(
        registry.ensure("no-such-tool").await.unwrap_err(),
        ToolError::Unknown(_)
    ));
}

#[tokio::test]
async fn disabled_tool_is_not_ensured() {
    let mut spec = present_tool();
    spec.enabled = false;
    let registry = ToolRegistry::from_specs([spec]);
    assert!(matches!(
        registry.ensure("sh").await.unwrap_err(),
        ToolError::Disabled(_)
    ));
}

#[tokio::test]
async fn concurrent_ensure_runs_one_install_attempt() {
    // The "installer" is a command that always runs but cannot make the
    // binary appear, so every install attempt is observable via a marker
    // file append.
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("attempts");
    let install_cmd = format!("sh -c 'echo x >> {}'", marker.display());
    let registry = std::sync::Arc::new(ToolRegistry::from_specs([missing_tool(Some(&install_cmd))]));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = std::sync::Arc::clone(&registry);
        handles.push(tokio::spawn(async move { registry.ensure("ghost").await }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }

    let attempts = std::fs::read_to_string(&marker).unwrap_or_default();
    assert_eq!(attempts.lines().count(), 1);
}

#[test]
fn home_expansion() {
    let registry = ToolRegistry::from_specs([ToolSpec {
        name: "local".to_string(),
        binary_path: "~/go/bin/local".to_string(),
        install_cmd: None,
        version_probe: None,
        category: "test".to_string(),
        enabled: true,
    }]);
    let resolved = registry.resolve("local").unwrap();
    assert!(!resolved.to_string_lossy().contains('~'));
    assert!(resolved.to_string_lossy().ends_with("go/bin/local"));
}

#[test]
fn builtin_table_covers_the_pipeline() {
    let registry = ToolRegistry::builtin();
    for tool in ["subfinder", "dnsx", "httpx", "naabu", "gau", "ffuf", "nuclei"] {
        assert!(registry.resolve(tool).is_ok(), "missing builtin: {tool}");
    }
}
