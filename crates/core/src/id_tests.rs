// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::short;
use crate::scan::ScanId;
use crate::target::TargetId;

#[test]
fn generated_ids_carry_prefix() {
    let id = ScanId::new();
    assert!(id.as_str().starts_with("scn-"));
    assert_eq!(id.suffix().len(), 19);
}

#[test]
fn ids_are_unique() {
    let a = TargetId::new();
    let b = TargetId::new();
    assert_ne!(a, b);
}

#[test]
fn from_string_round_trips() {
    let id = ScanId::from_string("scn-abc123");
    assert_eq!(id.as_str(), "scn-abc123");
    assert_eq!(id.suffix(), "abc123");
    assert_eq!(id, "scn-abc123");
}

#[test]
fn suffix_without_prefix_is_identity() {
    let id = ScanId::from_string("weird");
    assert_eq!(id.suffix(), "weird");
}

#[test]
fn serde_is_transparent() {
    let id = TargetId::from_string("tgt-x");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"tgt-x\"");
    let back: TargetId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn short_truncates() {
    assert_eq!(short("abcdef", 3), "abc");
    assert_eq!(short("ab", 3), "ab");
}
