// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution servers, worker threads, and the scheduler leader row.

use crate::entity::Entity;
use crate::execution::ExecutionId;
use crate::job::ScheduleId;
use crate::system::SystemId;
use crate::validate::ValidationIssue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// How often servers and worker threads refresh `heartbeat_on`.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// A heartbeat older than this marks its owner stale; its work may be
/// reclaimed.
pub const STALE_AFTER: Duration = Duration::from_secs(30);

fn is_stale(heartbeat_on: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(heartbeat_on)
        .to_std()
        .map(|age| age > STALE_AFTER)
        .unwrap_or(false)
}

crate::define_uuid_id! {
    /// Identifier of an [`ExecutionServer`] record.
    pub struct ExecutionServerId;
}

crate::define_uuid_id! {
    /// Identifier of a [`WorkerThread`] record.
    pub struct WorkerThreadId;
}

crate::define_uuid_id! {
    /// Identifier of the [`SchedulerState`] named row.
    pub struct SchedulerStateId;
}

/// Liveness record of a host process running worker threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionServer {
    pub id: ExecutionServerId,
    #[serde(default)]
    pub ver: i64,
    #[serde(alias = "system_id")]
    pub system_id: SystemId,
    #[serde(alias = "started_on")]
    pub started_on: DateTime<Utc>,
    #[serde(alias = "heartbeat_on")]
    pub heartbeat_on: DateTime<Utc>,
}

impl ExecutionServer {
    pub fn create(system_id: SystemId, now: DateTime<Utc>) -> Self {
        Self {
            id: ExecutionServerId::new(),
            ver: 0,
            system_id,
            started_on: now,
            heartbeat_on: now,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        is_stale(self.heartbeat_on, now)
    }
}

impl Entity for ExecutionServer {
    const TYPE_TAG: &'static str = "gantry.model.ExecutionServer";

    fn id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn ver(&self) -> i64 {
        self.ver
    }

    fn set_ver(&mut self, ver: i64) {
        self.ver = ver;
    }

    fn normalize(&mut self) {}

    fn validate(&self) -> Vec<ValidationIssue> {
        Vec::new()
    }
}

/// Liveness record of a single worker; `execution_id` is its current lease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerThread {
    pub id: WorkerThreadId,
    #[serde(default)]
    pub ver: i64,
    #[serde(alias = "execution_server_id")]
    pub execution_server_id: ExecutionServerId,
    #[serde(alias = "started_on")]
    pub started_on: DateTime<Utc>,
    #[serde(alias = "heartbeat_on")]
    pub heartbeat_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "execution_id")]
    pub execution_id: Option<ExecutionId>,
}

impl WorkerThread {
    pub fn create(execution_server_id: ExecutionServerId, now: DateTime<Utc>) -> Self {
        Self {
            id: WorkerThreadId::new(),
            ver: 0,
            execution_server_id,
            started_on: now,
            heartbeat_on: now,
            execution_id: None,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        is_stale(self.heartbeat_on, now)
    }
}

impl Entity for WorkerThread {
    const TYPE_TAG: &'static str = "gantry.model.WorkerThread";

    fn id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn ver(&self) -> i64 {
        self.ver
    }

    fn set_ver(&mut self, ver: i64) {
        self.ver = ver;
    }

    fn normalize(&mut self) {}

    fn validate(&self) -> Vec<ValidationIssue> {
        Vec::new()
    }
}

/// The `scheduler` named row: leader lease plus fired-minute bookkeeping.
///
/// Leadership is best-effort: claiming is an optimistic `(id, ver)` update,
/// and a leader whose server heartbeat goes stale is simply replaced. The
/// fired-minute map is what keeps a schedule from firing twice in one minute
/// bucket, and a freshly elected leader inherits it rather than back-firing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerState {
    pub id: SchedulerStateId,
    #[serde(default)]
    pub ver: i64,
    #[serde(alias = "system_id")]
    pub system_id: SystemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "leader_server_id")]
    pub leader_server_id: Option<ExecutionServerId>,
    /// Schedule id (32-hex) → last fired minute bucket (epoch minutes).
    #[serde(default)]
    #[serde(alias = "fired_minutes")]
    pub fired_minutes: BTreeMap<String, i64>,
}

impl SchedulerState {
    pub fn create(system_id: SystemId) -> Self {
        Self {
            id: SchedulerStateId::new(),
            ver: 0,
            system_id,
            leader_server_id: None,
            fired_minutes: BTreeMap::new(),
        }
    }

    pub fn already_fired(&self, schedule_id: ScheduleId, minute: i64) -> bool {
        self.fired_minutes.get(&schedule_id.simple()) == Some(&minute)
    }

    pub fn record_fired(&mut self, schedule_id: ScheduleId, minute: i64) {
        self.fired_minutes.insert(schedule_id.simple(), minute);
    }
}

impl Entity for SchedulerState {
    const TYPE_TAG: &'static str = "gantry.model.SchedulerState";

    fn id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn ver(&self) -> i64 {
        self.ver
    }

    fn set_ver(&mut self, ver: i64) {
        self.ver = ver;
    }

    fn normalize(&mut self) {}

    fn validate(&self) -> Vec<ValidationIssue> {
        Vec::new()
    }
}

#[cfg(test)]
#[path = "fleet_tests.rs"]
mod tests;
