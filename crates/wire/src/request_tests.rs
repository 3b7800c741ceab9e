// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn requests_tag_with_snake_case_type() {
    let json = serde_json::to_value(Request::SystemPause).unwrap();
    assert_eq!(json["type"], "system_pause");

    let json = serde_json::to_value(Request::PauseScan { id: "scn-1".to_string() }).unwrap();
    assert_eq!(json["type"], "pause_scan");
    assert_eq!(json["id"], "scn-1");
}

#[test]
fn create_scan_defaults_are_optional_on_the_wire() {
    let request: Request =
        serde_json::from_str(r#"{"type":"create_scan","target_id":"tgt-1"}"#).unwrap();
    assert_eq!(
        request,
        Request::CreateScan { target_id: "tgt-1".to_string(), profile: None, stop_on_error: false }
    );
}

#[test]
fn create_target_carries_the_spec() {
    let request: Request = serde_json::from_str(
        r#"{"type":"create_target","spec":{"name":"acme","primary_domain":"example.com"}}"#,
    )
    .unwrap();
    let Request::CreateTarget { spec } = request else {
        panic!("wrong variant");
    };
    assert_eq!(spec.name, "acme");
    assert!(spec.scope.is_empty());
}
