// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! High-level data service: per-type stores plus cross-entity invariants.
//!
//! Synchronization is deliberately optimistic: the store's `(id, ver)`
//! predicate is the only lock. Callers that hit `Concurrency` re-read and
//! re-attempt; nothing here retries on their behalf.

use crate::db::{Database, TableSpec};
use crate::error::StoreError;
use crate::row::{IdKind, RowId};
use crate::table::RowTable;
use crate::typed::TypedStore;
use chrono::{DateTime, Utc};
use gantry_core::{
    CancellationEvent, ConfigItem, Entity, Execution, ExecutionId, ExecutionServer, InvalidState,
    Job, JobId, JobSpec, Schedule, SchedulerState, System, SystemId, Task, TriggerEvent, User,
    UserId, WorkerThread,
};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Salted SHA-256 password hash, hex encoded.
pub fn password_hash(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn password_verify(password: &str, salt: &str, expected_hash: &str) -> bool {
    password_hash(password, salt) == expected_hash
}

/// The data service: one shared row table, one typed store per family.
#[derive(Clone)]
pub struct DataService {
    database: Database,
    table: Arc<RowTable>,
    systems: TypedStore<System>,
    configs: TypedStore<ConfigItem>,
    users: TypedStore<User>,
    jobs: TypedStore<Job>,
    tasks: TypedStore<Task>,
    schedules: TypedStore<Schedule>,
    trigger_events: TypedStore<TriggerEvent>,
    cancellation_events: TypedStore<CancellationEvent>,
    executions: TypedStore<Execution>,
    servers: TypedStore<ExecutionServer>,
    worker_threads: TypedStore<WorkerThread>,
    scheduler_states: TypedStore<SchedulerState>,
}

impl DataService {
    /// Open the service over `table_name`, creating the table if needed.
    pub async fn open(database: Database, table_name: &str) -> Result<Self, StoreError> {
        let table = database.create_table(TableSpec::new(table_name, IdKind::Uuid)).await?;
        Ok(Self {
            database,
            systems: TypedStore::new(Arc::clone(&table)),
            configs: TypedStore::new(Arc::clone(&table)),
            users: TypedStore::new(Arc::clone(&table)),
            jobs: TypedStore::new(Arc::clone(&table)),
            tasks: TypedStore::new(Arc::clone(&table)),
            schedules: TypedStore::new(Arc::clone(&table)),
            trigger_events: TypedStore::new(Arc::clone(&table)),
            cancellation_events: TypedStore::new(Arc::clone(&table)),
            executions: TypedStore::new(Arc::clone(&table)),
            servers: TypedStore::new(Arc::clone(&table)),
            worker_threads: TypedStore::new(Arc::clone(&table)),
            scheduler_states: TypedStore::new(Arc::clone(&table)),
            table,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn table(&self) -> &Arc<RowTable> {
        &self.table
    }

    // ── Bootstrap ───────────────────────────────────────────────────────

    /// Ensure the System row and the bootstrap system user exist.
    ///
    /// The admin credentials are applied only when no system user exists.
    pub async fn bootstrap(
        &self,
        admin_username: &str,
        admin_password: &str,
    ) -> Result<System, StoreError> {
        let mut systems = self.systems.get_all().await?;
        systems.sort_by_key(|s| s.id);
        let system = match systems.into_iter().next() {
            Some(system) => system,
            None => {
                let mut system = System::create("gantry");
                self.systems.save(&mut system).await?;
                tracing::info!(system = %system.id, "created system row");
                system
            }
        };

        let users = self.users.get_all().await?;
        let has_system_user =
            users.iter().any(|u| u.system_id == system.id && u.is_system);
        if !has_system_user {
            let salt = nanoid::nanoid!();
            let hash = password_hash(admin_password, &salt);
            let mut admin = User::create(system.id, admin_username, hash, salt);
            admin.is_admin = true;
            admin.is_system = true;
            self.save_user(&mut admin).await?;
            tracing::info!(username = admin_username, "created bootstrap system user");
        }
        Ok(system)
    }

    pub async fn system(&self) -> Result<Option<System>, StoreError> {
        let mut systems = self.systems.get_all().await?;
        systems.sort_by_key(|s| s.id);
        Ok(systems.into_iter().next())
    }

    // ── Users ───────────────────────────────────────────────────────────

    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.users.get_all().await
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.users.get(id.as_uuid()).await
    }

    pub async fn save_user(&self, user: &mut User) -> Result<(), StoreError> {
        user.check()?;
        let peers: Vec<User> = self
            .users
            .get_all()
            .await?
            .into_iter()
            .filter(|u| u.system_id == user.system_id)
            .collect();
        check_system_user(user, &peers)?;
        check_duplicate_username(user, &peers)?;
        self.users.save(user).await
    }

    pub async fn delete_user(&self, user: &User) -> Result<(), StoreError> {
        if self.users.get(user.id.as_uuid()).await?.is_none() {
            tracing::warn!(username = %user.username, "attempt to delete non-existent user");
            return Ok(());
        }
        let peers = self.users.get_all().await?;
        if let Some(system_user) =
            peers.iter().find(|u| u.system_id == user.system_id && u.is_system)
        {
            if system_user.id == user.id {
                return Err(InvalidState::msg(
                    "is_system",
                    format!("cannot delete system user '{}'", user.username),
                )
                .into());
            }
        }
        self.users.delete(user).await
    }

    // ── Configs ─────────────────────────────────────────────────────────

    pub async fn get_configs(&self) -> Result<Vec<ConfigItem>, StoreError> {
        self.configs.get_all().await
    }

    pub async fn save_config(&self, config: &mut ConfigItem) -> Result<(), StoreError> {
        self.configs.save(config).await
    }

    pub async fn delete_config(&self, config: &ConfigItem) -> Result<(), StoreError> {
        if self.configs.get(config.id.as_uuid()).await?.is_none() {
            tracing::warn!(name = %config.name, "attempt to delete non-existent config");
            return Ok(());
        }
        self.configs.delete(config).await
    }

    // ── Jobs ────────────────────────────────────────────────────────────

    async fn tasks_for(&self, job_id: JobId) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .get_all()
            .await?
            .into_iter()
            .filter(|t| t.job_id == job_id)
            .collect();
        tasks.sort_by_key(|t| t.step);
        Ok(tasks)
    }

    async fn schedules_for(&self, job_id: JobId) -> Result<Vec<Schedule>, StoreError> {
        Ok(self
            .schedules
            .get_all()
            .await?
            .into_iter()
            .filter(|s| s.job_id == job_id)
            .collect())
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobSpec>, StoreError> {
        let jobs = self.jobs.get_all_with_tags().await?;
        let mut tasks_by_job: HashMap<JobId, Vec<Task>> = HashMap::new();
        for task in self.tasks.get_all().await? {
            tasks_by_job.entry(task.job_id).or_default().push(task);
        }
        let mut schedules_by_job: HashMap<JobId, Vec<Schedule>> = HashMap::new();
        for schedule in self.schedules.get_all().await? {
            schedules_by_job.entry(schedule.job_id).or_default().push(schedule);
        }

        let mut specs = Vec::with_capacity(jobs.len());
        for (job, tags) in jobs {
            let mut tasks = tasks_by_job.remove(&job.id).unwrap_or_default();
            tasks.sort_by_key(|t| t.step);
            let schedules = schedules_by_job.remove(&job.id).unwrap_or_default();
            specs.push(JobSpec { job, tasks, schedules, tags });
        }
        specs.sort_by(|a, b| a.job.name.cmp(&b.job.name));
        Ok(specs)
    }

    pub async fn get_job(&self, id: JobId) -> Result<Option<JobSpec>, StoreError> {
        let Some((job, tags)) = self.jobs.get_with_tags(id.as_uuid()).await? else {
            return Ok(None);
        };
        let tasks = self.tasks_for(id).await?;
        let schedules = self.schedules_for(id).await?;
        Ok(Some(JobSpec { job, tasks, schedules, tags }))
    }

    /// Save the Job aggregate: the job row (tags in its `dmedium` column)
    /// plus each task and schedule row, deleting children dropped from the
    /// aggregate.
    pub async fn save_job(&self, spec: &mut JobSpec) -> Result<(), StoreError> {
        spec.check()?;
        let tags = spec.tags.clone();
        self.jobs.save_with_tags(&mut spec.job, tags).await?;

        for old in self.tasks_for(spec.job.id).await? {
            if !spec.tasks.iter().any(|t| t.id == old.id) {
                self.tasks.delete(&old).await?;
            }
        }
        for task in &mut spec.tasks {
            self.tasks.save(task).await?;
        }

        for old in self.schedules_for(spec.job.id).await? {
            if !spec.schedules.iter().any(|s| s.id == old.id) {
                self.schedules.delete(&old).await?;
            }
        }
        for schedule in &mut spec.schedules {
            self.schedules.save(schedule).await?;
        }
        Ok(())
    }

    /// Delete the Job aggregate; a missing id is a warn-logged no-op.
    /// Executions keep running off their snapshots.
    pub async fn delete_job(&self, spec: &JobSpec) -> Result<(), StoreError> {
        if self.jobs.get(spec.job.id.as_uuid()).await?.is_none() {
            tracing::warn!(job = %spec.job.id, "attempt to delete non-existent job");
            return Ok(());
        }
        for task in self.tasks_for(spec.job.id).await? {
            self.tasks.delete(&task).await?;
        }
        for schedule in self.schedules_for(spec.job.id).await? {
            self.schedules.delete(&schedule).await?;
        }
        self.jobs.delete(&spec.job).await
    }

    // ── Trigger / cancel ────────────────────────────────────────────────

    /// Manual trigger: persist a user-sourced TriggerEvent and admit its
    /// Execution. Triggering an inactive job is a caller error.
    pub async fn trigger_job(
        &self,
        job_id: JobId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<(TriggerEvent, Execution), StoreError> {
        let spec = self.get_job(job_id).await?.ok_or_else(|| StoreError::NotFound {
            table: self.table.name().to_string(),
            id: RowId::Uuid(job_id.as_uuid()),
        })?;
        if !spec.job.is_active {
            return Err(InvalidState::msg(
                "is_active",
                format!("cannot trigger inactive job '{}'", spec.job.name),
            )
            .into());
        }
        let mut event = TriggerEvent::manual(job_id, user_id, now);
        self.trigger_events.save(&mut event).await?;
        let execution = self.admit_trigger(&event, &spec).await?;
        Ok((event, execution))
    }

    /// Create the `TRIGGERED` Execution for a persisted TriggerEvent,
    /// snapshotting the Job aggregate as of now.
    pub async fn admit_trigger(
        &self,
        event: &TriggerEvent,
        spec: &JobSpec,
    ) -> Result<Execution, StoreError> {
        let snapshot = spec.to_snapshot()?;
        let mut execution = Execution::create(spec.job.system_id, event.id, snapshot);
        self.executions.save(&mut execution).await?;
        Ok(execution)
    }

    pub async fn save_trigger_event(&self, event: &mut TriggerEvent) -> Result<(), StoreError> {
        self.trigger_events.save(event).await
    }

    pub async fn get_trigger_event(
        &self,
        id: gantry_core::TriggerEventId,
    ) -> Result<Option<TriggerEvent>, StoreError> {
        self.trigger_events.get(id.as_uuid()).await
    }

    /// Request cancellation of an Execution. Idempotent: an existing
    /// cancellation for the execution is returned unchanged.
    pub async fn cancel_execution(
        &self,
        execution_id: ExecutionId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<CancellationEvent, StoreError> {
        if let Some(existing) = self.find_cancellation(execution_id).await? {
            return Ok(existing);
        }
        if self.executions.get(execution_id.as_uuid()).await?.is_none() {
            return Err(StoreError::NotFound {
                table: self.table.name().to_string(),
                id: RowId::Uuid(execution_id.as_uuid()),
            });
        }
        let mut event = CancellationEvent::create(execution_id, user_id, now);
        self.cancellation_events.save(&mut event).await?;
        Ok(event)
    }

    pub async fn find_cancellation(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Option<CancellationEvent>, StoreError> {
        Ok(self
            .cancellation_events
            .get_all()
            .await?
            .into_iter()
            .find(|c| c.execution_id == execution_id))
    }

    // ── Executions ──────────────────────────────────────────────────────

    pub async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        self.executions.get(id.as_uuid()).await
    }

    pub async fn list_executions(&self) -> Result<Vec<Execution>, StoreError> {
        self.executions.get_all().await
    }

    pub async fn save_execution(&self, execution: &mut Execution) -> Result<(), StoreError> {
        self.executions.save(execution).await
    }

    // ── Fleet ───────────────────────────────────────────────────────────

    pub async fn list_servers(&self) -> Result<Vec<ExecutionServer>, StoreError> {
        self.servers.get_all().await
    }

    pub async fn save_server(&self, server: &mut ExecutionServer) -> Result<(), StoreError> {
        self.servers.save(server).await
    }

    pub async fn delete_server(&self, server: &ExecutionServer) -> Result<(), StoreError> {
        self.servers.delete(server).await
    }

    pub async fn list_worker_threads(&self) -> Result<Vec<WorkerThread>, StoreError> {
        self.worker_threads.get_all().await
    }

    pub async fn save_worker_thread(&self, thread: &mut WorkerThread) -> Result<(), StoreError> {
        self.worker_threads.save(thread).await
    }

    pub async fn delete_worker_thread(&self, thread: &WorkerThread) -> Result<(), StoreError> {
        self.worker_threads.delete(thread).await
    }

    /// The `scheduler` named row for a system, created on first use.
    ///
    /// Two servers racing the creation both succeed; readers pick the row
    /// with the smallest id, so the fleet converges on one.
    pub async fn scheduler_state(
        &self,
        system_id: SystemId,
    ) -> Result<SchedulerState, StoreError> {
        let mut all: Vec<SchedulerState> = self
            .scheduler_states
            .get_all()
            .await?
            .into_iter()
            .filter(|s| s.system_id == system_id)
            .collect();
        all.sort_by_key(|s| s.id);
        match all.into_iter().next() {
            Some(state) => Ok(state),
            None => {
                let mut state = SchedulerState::create(system_id);
                self.scheduler_states.save(&mut state).await?;
                Ok(state)
            }
        }
    }

    pub async fn save_scheduler_state(
        &self,
        state: &mut SchedulerState,
    ) -> Result<(), StoreError> {
        self.scheduler_states.save(state).await
    }
}

fn check_system_user(user: &User, peers: &[User]) -> Result<(), InvalidState> {
    let existing = peers.iter().find(|u| u.id == user.id);
    let Some(system_user) = peers.iter().find(|u| u.is_system) else {
        return Ok(()); // no system user yet, nothing to protect
    };
    match existing {
        None => {
            if user.is_system {
                return Err(InvalidState::msg(
                    "is_system",
                    format!(
                        "cannot create system user '{}': system user '{}' already exists",
                        user.username, system_user.username
                    ),
                ));
            }
        }
        Some(_) if user.id == system_user.id => {
            if !user.is_system {
                return Err(InvalidState::msg(
                    "is_system",
                    format!("cannot demote system user '{}'", user.username),
                ));
            }
        }
        Some(_) => {
            if user.is_system {
                return Err(InvalidState::msg(
                    "is_system",
                    format!("cannot promote user '{}' to system user", user.username),
                ));
            }
        }
    }
    Ok(())
}

fn check_duplicate_username(user: &User, peers: &[User]) -> Result<(), InvalidState> {
    // usernames are already casefolded by normalization
    let Some(taken) = peers.iter().find(|u| u.username == user.username) else {
        return Ok(());
    };
    let is_new = !peers.iter().any(|u| u.id == user.id);
    if is_new || taken.id != user.id {
        return Err(InvalidState::msg(
            "username",
            format!("username '{}' is already taken", user.username),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
