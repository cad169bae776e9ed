// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn server_type_parses_case_insensitively() {
    assert_eq!("web".parse::<ServerType>().unwrap(), ServerType::Web);
    assert_eq!(" Scheduler ".parse::<ServerType>().unwrap(), ServerType::Scheduler);
    assert!(matches!(
        "other".parse::<ServerType>().unwrap_err(),
        ConfigError::InvalidServerType(_)
    ));
}

#[test]
fn server_type_displays_lowercase() {
    assert_eq!(ServerType::Web.to_string(), "web");
    assert_eq!(ServerType::Scheduler.to_string(), "scheduler");
}
