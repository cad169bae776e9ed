// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Jobs and their ordered tasks, cron schedules, and tags.

use crate::entity::Entity;
use crate::serde_support::bool_string;
use crate::system::SystemId;
use crate::validate::{trim, trim_casefold, ValidationIssue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

crate::define_uuid_id! {
    /// Identifier of a [`Job`] record.
    pub struct JobId;
}

crate::define_uuid_id! {
    /// Identifier of a [`Task`] record.
    pub struct TaskId;
}

crate::define_uuid_id! {
    /// Identifier of a [`Schedule`] record.
    pub struct ScheduleId;
}

/// A `(name, value)` label attached to a Job.
///
/// Both halves are trimmed and casefolded; exact duplicates within one Job
/// collapse to set semantics, so a name may carry several distinct values.
/// Tags persist with the Job row in its `dmedium` column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// One step of a Job: an ordered action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    #[serde(default)]
    pub ver: i64,
    #[serde(alias = "job_id")]
    pub job_id: JobId,
    /// 0-based position within the Job; dense after normalization.
    pub step: i64,
    /// Name of the action handler to invoke.
    pub action: String,
    #[serde(with = "bool_string", alias = "is_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Task {
    /// Create a task with an unassigned step; saving the owning Job
    /// re-indexes steps densely.
    pub fn create(job_id: JobId, action: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            ver: 0,
            job_id,
            step: -1,
            action: action.into(),
            is_active: true,
            name: None,
        }
    }
}

impl Entity for Task {
    const TYPE_TAG: &'static str = "gantry.model.Task";

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
        if let Some(action) = trim_casefold(&self.action) {
            self.action = action;
        } else {
            self.action.clear();
        }
        self.name = self.name.as_deref().and_then(trim);
    }

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.action.trim().is_empty() {
            issues.push(ValidationIssue::new("action", "must not be empty"));
        }
        if self.step < 0 {
            issues.push(ValidationIssue::new("step", "must not be negative"));
        }
        issues
    }
}

/// A cron-style firing rule attached to a Job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: ScheduleId,
    #[serde(default)]
    pub ver: i64,
    #[serde(alias = "job_id")]
    pub job_id: JobId,
    /// Cron expression; parsing is delegated to the cron oracle.
    pub cron: String,
    #[serde(with = "bool_string", alias = "is_active")]
    pub is_active: bool,
}

impl Schedule {
    pub fn create(job_id: JobId, cron: impl Into<String>) -> Self {
        Self { id: ScheduleId::new(), ver: 0, job_id, cron: cron.into(), is_active: true }
    }
}

impl Entity for Schedule {
    const TYPE_TAG: &'static str = "gantry.model.Schedule";

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
        if let Some(cron) = trim(&self.cron) {
            self.cron = cron;
        } else {
            self.cron.clear();
        }
    }

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.cron.trim().is_empty() {
            issues.push(ValidationIssue::new("cron", "must not be empty"));
        }
        issues
    }
}

/// A named unit of schedulable work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    #[serde(default)]
    pub ver: i64,
    #[serde(alias = "system_id")]
    pub system_id: SystemId,
    pub name: String,
    #[serde(with = "bool_string", alias = "is_active")]
    pub is_active: bool,
}

impl Job {
    pub fn create(system_id: SystemId, name: impl Into<String>) -> Self {
        Self { id: JobId::new(), ver: 0, system_id, name: name.into(), is_active: true }
    }
}

impl Entity for Job {
    const TYPE_TAG: &'static str = "gantry.model.Job";

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
        if let Some(name) = trim(&self.name) {
            self.name = name;
        } else {
            self.name.clear();
        }
    }

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.name.trim().is_empty() {
            issues.push(ValidationIssue::new("name", "must not be empty"));
        }
        issues
    }
}

/// A Job together with its ordered tasks, schedules, and tags.
///
/// This is the aggregate the data service loads and saves, and the shape
/// serialized into an Execution's job snapshot at trigger time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub job: Job,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl JobSpec {
    pub fn new(job: Job) -> Self {
        Self { job, tasks: Vec::new(), schedules: Vec::new(), tags: Vec::new() }
    }

    /// Canonicalize the aggregate: trim/casefold members, point children at
    /// the owning Job, collapse tags, and re-index steps densely from 0.
    pub fn normalize(&mut self) {
        self.job.normalize();

        self.tasks.sort_by_key(|t| t.step);
        for (i, task) in self.tasks.iter_mut().enumerate() {
            task.job_id = self.job.id;
            task.step = i as i64;
            task.normalize();
        }

        for schedule in &mut self.schedules {
            schedule.job_id = self.job.id;
            schedule.normalize();
        }

        // Collapse exact tag duplicates to set semantics, sorted by name
        // then value.
        let mut collapsed: BTreeSet<(String, String)> = BTreeSet::new();
        for tag in &self.tags {
            let (name, value) = (trim_casefold(&tag.name), trim_casefold(&tag.value));
            if let (Some(name), Some(value)) = (name, value) {
                collapsed.insert((name, value));
            }
        }
        self.tags = collapsed.into_iter().map(|(name, value)| Tag { name, value }).collect();
    }

    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = self.job.validate();
        for task in &self.tasks {
            issues.extend(task.validate());
        }
        for schedule in &self.schedules {
            issues.extend(schedule.validate());
        }
        issues
    }

    /// Normalize, then fail with [`crate::InvalidState`] on any issue.
    pub fn check(&mut self) -> Result<(), crate::validate::InvalidState> {
        self.normalize();
        let issues = self.validate();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(crate::validate::InvalidState::new(issues))
        }
    }

    /// Active tasks in ascending step order.
    pub fn runnable_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_active)
    }

    /// Serialize the aggregate for an Execution's immutable job snapshot.
    pub fn to_snapshot(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_snapshot(snapshot: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(snapshot)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
