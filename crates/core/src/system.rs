// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The root System record and per-system configuration items.

use crate::entity::Entity;
use crate::validate::{trim_casefold, ValidationIssue};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

crate::define_uuid_id! {
    /// Identifier of the root [`System`] record.
    pub struct SystemId;
}

crate::define_uuid_id! {
    /// Identifier of a [`ConfigItem`] record.
    pub struct ConfigItemId;
}

/// Root context; every other entity references it directly or transitively.
///
/// Exactly one System is the logical root. It is created once at bootstrap
/// and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    pub id: SystemId,
    #[serde(default)]
    pub ver: i64,
    pub name: String,
}

impl System {
    pub fn create(name: impl Into<String>) -> Self {
        Self { id: SystemId::new(), ver: 0, name: name.into() }
    }
}

impl Entity for System {
    const TYPE_TAG: &'static str = "gantry.model.System";

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
        self.name = self.name.trim().to_string();
    }

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.name.trim().is_empty() {
            issues.push(ValidationIssue::new("name", "must not be empty"));
        }
        issues
    }
}

/// A named configuration value scoped to a System.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigItem {
    pub id: ConfigItemId,
    #[serde(default)]
    pub ver: i64,
    #[serde(alias = "system_id")]
    pub system_id: SystemId,
    pub name: String,
    pub value: String,
}

impl ConfigItem {
    pub fn create(
        system_id: SystemId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: ConfigItemId::new(),
            ver: 0,
            system_id,
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Entity for ConfigItem {
    const TYPE_TAG: &'static str = "gantry.model.ConfigItem";

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
        if let Some(name) = trim_casefold(&self.name) {
            self.name = name;
        } else {
            self.name.clear();
        }
        self.value = self.value.trim().to_string();
    }

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.name.trim().is_empty() {
            issues.push(ValidationIssue::new("name", "must not be empty"));
        }
        issues
    }
}

#[cfg(test)]
#[path = "system_tests.rs"]
mod tests;
