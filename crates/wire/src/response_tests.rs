// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dn_core::test_support::{sample_finding, TargetBuilder};
use dn_core::{ErrorKind, ScanId};

#[test]
fn error_responses_carry_a_taxonomy_tag() {
    let response = Response::error(ErrorKind::ToolTimeout, "nuclei exceeded budget");
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["type"], "error");
    assert_eq!(json["kind"], "tool_timeout");
    assert_eq!(json["message"], "nuclei exceeded budget");
}

#[test]
fn target_dto_from_entity() {
    let target = TargetBuilder::new().name("acme").domain("example.com").build();
    let dto = crate::TargetDto::from(&target);

    assert_eq!(dto.name, "acme");
    assert_eq!(dto.primary_domain, "example.com");
    assert_eq!(dto.id, target.id.to_string());
}

#[test]
fn finding_dto_from_entity() {
    let finding = sample_finding(ScanId::new());
    let dto = crate::FindingDto::from(&finding);

    assert_eq!(dto.severity, "high");
    assert_eq!(dto.tool_source, "nuclei");
    assert!(!dto.false_positive);
}

#[test]
fn response_round_trips() {
    let response = Response::Queue {
        queued: 2,
        active: vec!["scn-a".to_string()],
        paused: vec![],
        process_paused: false,
    };
    let json = serde_json::to_string(&response).unwrap();
    let back: Response = serde_json::from_str(&json).unwrap();
    assert_eq!(back, response);
}
