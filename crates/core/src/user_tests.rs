// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::entity::Entity as _;

#[test]
fn normalize_casefolds_username() {
    let mut user = User::create(SystemId::new(), "  Alice  ", "hash", "salt");
    user.normalize();
    assert_eq!(user.username, "alice");
}

#[test]
fn normalize_drops_blank_email() {
    let mut user = User::create(SystemId::new(), "alice", "hash", "salt");
    user.email = Some("   ".to_string());
    user.normalize();
    assert_eq!(user.email, None);

    user.email = Some("  a@example.com ".to_string());
    user.normalize();
    assert_eq!(user.email.as_deref(), Some("a@example.com"));
}

#[test]
fn empty_username_is_invalid() {
    let mut user = User::create(SystemId::new(), "   ", "hash", "salt");
    assert!(user.check().is_err());
}

#[test]
fn serde_writes_camel_case_and_string_bools() {
    let user = User::create(SystemId::new(), "alice", "hash", "salt");
    let json = serde_json::to_string(&user).unwrap();
    assert!(json.contains("\"systemId\""));
    assert!(json.contains("\"passwordHash\""));
    assert!(json.contains("\"isActive\":\"true\""));
    assert!(json.contains("\"isAdmin\":\"false\""));
    // email is None and must be omitted
    assert!(!json.contains("email"));
}

#[test]
fn serde_reads_snake_case_too() {
    let id = UserId::new();
    let sys = SystemId::new();
    let json = format!(
        r#"{{"id":"{}","system_id":"{}","username":"bob","password_hash":"h","password_salt":"s","is_admin":"false","is_active":"true","is_system":"false"}}"#,
        id.simple(),
        sys.simple()
    );
    let user: User = serde_json::from_str(&json).unwrap();
    assert_eq!(user.id, id);
    assert_eq!(user.system_id, sys);
    assert!(user.is_active);
    assert_eq!(user.ver, 0);
}
