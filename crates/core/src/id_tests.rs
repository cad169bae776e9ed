// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

crate::define_uuid_id! {
    pub struct TestId;
}

#[test]
fn new_ids_are_unique() {
    let a = TestId::new();
    let b = TestId::new();
    assert_ne!(a, b);
}

#[test]
fn simple_form_is_32_hex() {
    let id = TestId::new();
    let s = id.simple();
    assert_eq!(s.len(), 32);
    assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(!s.contains('-'));
}

#[test]
fn parse_accepts_simple_and_hyphenated() {
    let id = TestId::new();
    let simple = id.simple();
    let hyphenated = id.as_uuid().hyphenated().to_string();
    assert_eq!(TestId::parse(&simple).unwrap(), id);
    assert_eq!(TestId::parse(&hyphenated).unwrap(), id);
    assert_eq!(TestId::parse(&format!("  {}  ", simple)).unwrap(), id);
}

#[test]
fn parse_rejects_garbage() {
    assert!(TestId::parse("not-a-uuid").is_err());
}

#[test]
fn serde_round_trip_uses_simple_form() {
    let id = TestId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id.simple()));
    let back: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn deserialize_accepts_hyphenated() {
    let id = TestId::new();
    let json = format!("\"{}\"", id.as_uuid().hyphenated());
    let back: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn short_truncates() {
    let id = TestId::new();
    assert_eq!(id.short(8).len(), 8);
    assert_eq!(id.short(100), id.simple());
}

#[test]
fn short_helper_truncates_str() {
    assert_eq!(short("abcdef", 3), "abc");
    assert_eq!(short("ab", 3), "ab");
}
