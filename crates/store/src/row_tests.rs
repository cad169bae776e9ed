// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn mask_contains_and_union() {
    let mask = ColumnMask::ID | ColumnMask::VER;
    assert!(mask.contains(ColumnMask::ID));
    assert!(mask.contains(ColumnMask::VER));
    assert!(!mask.contains(ColumnMask::DLARGE));
    assert!(ColumnMask::ALL.contains(mask));
    assert!(ColumnMask::ALL.contains(ColumnMask::DLARGE));
}

#[test]
fn mask_or_assign() {
    let mut mask = ColumnMask::ID;
    mask |= ColumnMask::DSMALL;
    assert!(mask.contains(ColumnMask::DSMALL));
    assert!(!mask.contains(ColumnMask::VER));
}

#[test]
fn mask_debug_lists_columns() {
    let mask = ColumnMask::ID | ColumnMask::DLARGE;
    assert_eq!(format!("{:?}", mask), "ID|DLARGE");
    assert_eq!(format!("{:?}", ColumnMask::ALL), "ID|VER|DSMALL|DMEDIUM|DLARGE");
}

#[test]
fn row_id_display() {
    assert_eq!(RowId::Int(42).to_string(), "42");
    let u = Uuid::new_v4();
    assert_eq!(RowId::Uuid(u).to_string(), u.simple().to_string());
}

#[test]
fn row_id_accessors() {
    assert_eq!(RowId::Int(7).as_int(), Some(7));
    assert_eq!(RowId::Int(7).as_uuid(), None);
    let u = Uuid::new_v4();
    assert_eq!(RowId::Uuid(u).as_uuid(), Some(u));
}

#[test]
fn row_display_marks_unselected_columns() {
    let row = Row { id: Some(RowId::Int(1)), ver: Some(2), ..Row::default() };
    let s = row.to_string();
    assert!(s.contains("id=1"));
    assert!(s.contains("ver=2"));
    assert!(s.contains("dsmall=<None>"));
}
