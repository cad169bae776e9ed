// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User accounts.

use crate::entity::Entity;
use crate::serde_support::bool_string;
use crate::system::SystemId;
use crate::validate::{trim, trim_casefold, ValidationIssue};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

crate::define_uuid_id! {
    /// Identifier of a [`User`] record.
    pub struct UserId;
}

/// A user account within a System.
///
/// Usernames are stored casefolded and compared case-insensitively. At most
/// one user per System carries `is_system = true`; that user cannot be
/// deleted or demoted (enforced by the data service).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub ver: i64,
    #[serde(alias = "system_id")]
    pub system_id: SystemId,
    pub username: String,
    #[serde(alias = "password_hash")]
    pub password_hash: String,
    #[serde(alias = "password_salt")]
    pub password_salt: String,
    #[serde(with = "bool_string", alias = "is_admin")]
    pub is_admin: bool,
    #[serde(with = "bool_string", alias = "is_active")]
    pub is_active: bool,
    #[serde(with = "bool_string", alias = "is_system")]
    pub is_system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    pub fn create(
        system_id: SystemId,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        password_salt: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId::new(),
            ver: 0,
            system_id,
            username: username.into(),
            password_hash: password_hash.into(),
            password_salt: password_salt.into(),
            is_admin: false,
            is_active: true,
            is_system: false,
            email: None,
        }
    }
}

impl Entity for User {
    const TYPE_TAG: &'static str = "gantry.model.User";

    fn id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn ver(&self) -> i64 {
        self.ver
    }

    fn set_ver(&mut self, ver: i64) {
        self.ver = ver;
    }

    fn normalize(&mut self) {
        if let Some(username) = trim_casefold(&self.username) {
            self.username = username;
        } else {
            self.username.clear();
        }
        self.password_hash = self.password_hash.trim().to_string();
        self.password_salt = self.password_salt.trim().to_string();
        self.email = self.email.as_deref().and_then(trim);
    }

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.username.trim().is_empty() {
            issues.push(ValidationIssue::new("username", "must not be empty"));
        }
        issues
    }
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;
