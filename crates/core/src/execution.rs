// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger events, cancellation events, and the Execution state machine.

use crate::entity::Entity;
use crate::fleet::WorkerThreadId;
use crate::job::{JobId, ScheduleId, TaskId};
use crate::system::SystemId;
use crate::user::UserId;
use crate::validate::{InvalidState, ValidationIssue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

crate::define_uuid_id! {
    /// Identifier of a [`TriggerEvent`] record.
    pub struct TriggerEventId;
}

crate::define_uuid_id! {
    /// Identifier of a [`CancellationEvent`] record.
    pub struct CancellationEventId;
}

crate::define_uuid_id! {
    /// Identifier of an [`Execution`] record.
    pub struct ExecutionId;
}

/// Durable record that a Job should run.
///
/// Exactly one of `triggered_by_schedule_id` / `triggered_by_user_id` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub id: TriggerEventId,
    #[serde(default)]
    pub ver: i64,
    #[serde(alias = "job_id")]
    pub job_id: JobId,
    #[serde(alias = "triggered_on")]
    pub triggered_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "triggered_by_schedule_id")]
    pub triggered_by_schedule_id: Option<ScheduleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "triggered_by_user_id")]
    pub triggered_by_user_id: Option<UserId>,
}

impl TriggerEvent {
    pub fn scheduled(job_id: JobId, schedule_id: ScheduleId, now: DateTime<Utc>) -> Self {
        Self {
            id: TriggerEventId::new(),
            ver: 0,
            job_id,
            triggered_on: now,
            triggered_by_schedule_id: Some(schedule_id),
            triggered_by_user_id: None,
        }
    }

    pub fn manual(job_id: JobId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: TriggerEventId::new(),
            ver: 0,
            job_id,
            triggered_on: now,
            triggered_by_schedule_id: None,
            triggered_by_user_id: Some(user_id),
        }
    }
}

impl Entity for TriggerEvent {
    const TYPE_TAG: &'static str = "gantry.model.TriggerEvent";

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
        let mut issues = Vec::new();
        match (&self.triggered_by_schedule_id, &self.triggered_by_user_id) {
            (None, None) => issues.push(ValidationIssue::new(
                "triggered_by",
                "either a schedule or a user must be set",
            )),
            (Some(_), Some(_)) => issues.push(ValidationIssue::new(
                "triggered_by",
                "a schedule and a user cannot both be set",
            )),
            _ => {}
        }
        issues
    }
}

/// Durable request to stop an Execution at its next cooperative check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationEvent {
    pub id: CancellationEventId,
    #[serde(default)]
    pub ver: i64,
    #[serde(alias = "execution_id")]
    pub execution_id: ExecutionId,
    #[serde(alias = "cancelled_on")]
    pub cancelled_on: DateTime<Utc>,
    #[serde(alias = "cancelled_by_user_id")]
    pub cancelled_by_user_id: UserId,
}

impl CancellationEvent {
    pub fn create(execution_id: ExecutionId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: CancellationEventId::new(),
            ver: 0,
            execution_id,
            cancelled_on: now,
            cancelled_by_user_id: user_id,
        }
    }
}

impl Entity for CancellationEvent {
    const TYPE_TAG: &'static str = "gantry.model.CancellationEvent";

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

/// Lifecycle of an Execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Triggered,
    Queued,
    Started,
    Completed,
    Cancelled,
    Error,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }
}

crate::simple_display! {
    ExecutionState {
        Triggered => "triggered",
        Queued => "queued",
        Started => "started",
        Completed => "completed",
        Cancelled => "cancelled",
        Error => "error",
    }
}

/// Classification of an Execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionErrorKind {
    Validation,
    Task,
    Other,
}

crate::simple_display! {
    ExecutionErrorKind {
        Validation => "validation",
        Task => "task",
        Other => "other",
    }
}

/// One run of a Job, driven through its tasks by a worker thread.
///
/// Carries an immutable snapshot of the Job aggregate taken at trigger time,
/// so editing or deleting the Job cannot change in-flight work. The
/// `(state, worker_thread_id)` pair is the worker lease; all transitions go
/// through the optimistic `(id, ver)` row update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: ExecutionId,
    #[serde(default)]
    pub ver: i64,
    #[serde(alias = "system_id")]
    pub system_id: SystemId,
    #[serde(alias = "trigger_event_id")]
    pub trigger_event_id: TriggerEventId,
    pub state: ExecutionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "executing_task_id")]
    pub executing_task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "started_on")]
    pub started_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "completed_on")]
    pub completed_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "cancellation_event_id")]
    pub cancellation_event_id: Option<CancellationEventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "error_kind")]
    pub error_kind: Option<ExecutionErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "error_message")]
    pub error_message: Option<String>,
    #[serde(alias = "job_snapshot")]
    pub job_snapshot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "worker_thread_id")]
    pub worker_thread_id: Option<WorkerThreadId>,
}

impl Execution {
    pub fn create(
        system_id: SystemId,
        trigger_event_id: TriggerEventId,
        job_snapshot: String,
    ) -> Self {
        Self {
            id: ExecutionId::new(),
            ver: 0,
            system_id,
            trigger_event_id,
            state: ExecutionState::Triggered,
            executing_task_id: None,
            started_on: None,
            completed_on: None,
            cancellation_event_id: None,
            error_kind: None,
            error_message: None,
            job_snapshot,
            worker_thread_id: None,
        }
    }

    /// Parse the immutable job snapshot taken at trigger time.
    pub fn job_spec(&self) -> Result<crate::job::JobSpec, serde_json::Error> {
        crate::job::JobSpec::from_snapshot(&self.job_snapshot)
    }

    fn expect_state(&self, allowed: &[ExecutionState]) -> Result<(), InvalidState> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(InvalidState::msg(
                "state",
                format!("transition not allowed from state '{}'", self.state),
            ))
        }
    }

    /// Lease this execution to a worker: `TRIGGERED → QUEUED`.
    ///
    /// A `QUEUED` execution whose lease was cleared by recovery may be
    /// re-leased.
    pub fn lease(&mut self, worker: WorkerThreadId) -> Result<(), InvalidState> {
        match self.state {
            ExecutionState::Triggered => {}
            ExecutionState::Queued if self.worker_thread_id.is_none() => {}
            _ => {
                return Err(InvalidState::msg(
                    "state",
                    format!("cannot lease execution in state '{}'", self.state),
                ))
            }
        }
        self.state = ExecutionState::Queued;
        self.worker_thread_id = Some(worker);
        Ok(())
    }

    /// `QUEUED → STARTED`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), InvalidState> {
        self.expect_state(&[ExecutionState::Queued])?;
        if self.worker_thread_id.is_none() {
            return Err(InvalidState::msg("worker_thread_id", "cannot start without a lease"));
        }
        self.state = ExecutionState::Started;
        self.started_on = Some(now);
        Ok(())
    }

    /// Record the task currently being executed.
    pub fn step(&mut self, task_id: TaskId) -> Result<(), InvalidState> {
        self.expect_state(&[ExecutionState::Started])?;
        self.executing_task_id = Some(task_id);
        Ok(())
    }

    /// `STARTED → COMPLETED`.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), InvalidState> {
        self.expect_state(&[ExecutionState::Started])?;
        self.state = ExecutionState::Completed;
        self.completed_on = Some(now);
        Ok(())
    }

    /// `QUEUED | STARTED → ERROR`.
    pub fn fail(
        &mut self,
        kind: ExecutionErrorKind,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidState> {
        self.expect_state(&[ExecutionState::Queued, ExecutionState::Started])?;
        self.state = ExecutionState::Error;
        self.error_kind = Some(kind);
        self.error_message = Some(message.into());
        self.completed_on = Some(now);
        Ok(())
    }

    /// `TRIGGERED | QUEUED | STARTED → CANCELLED`.
    pub fn cancel(
        &mut self,
        event: CancellationEventId,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidState> {
        self.expect_state(&[
            ExecutionState::Triggered,
            ExecutionState::Queued,
            ExecutionState::Started,
        ])?;
        self.state = ExecutionState::Cancelled;
        self.cancellation_event_id = Some(event);
        self.completed_on = Some(now);
        Ok(())
    }

    /// Recovery reset: clear the lease and return to `QUEUED`.
    pub fn requeue(&mut self) -> Result<(), InvalidState> {
        self.expect_state(&[ExecutionState::Queued, ExecutionState::Started])?;
        self.state = ExecutionState::Queued;
        self.worker_thread_id = None;
        self.executing_task_id = None;
        self.started_on = None;
        Ok(())
    }
}

impl Entity for Execution {
    const TYPE_TAG: &'static str = "gantry.model.Execution";

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
        self.error_message = self.error_message.as_deref().and_then(crate::validate::trim);
    }

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.job_snapshot.trim().is_empty() {
            issues.push(ValidationIssue::new("job_snapshot", "must not be empty"));
        }
        if self.state == ExecutionState::Error && self.error_kind.is_none() {
            issues.push(ValidationIssue::new("error_kind", "required in state 'error'"));
        }
        issues
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
