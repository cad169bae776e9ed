// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker loop: lease one Execution, drive it through its tasks, record the
//! terminal state.
//!
//! At most one worker holds an Execution at a time: the lease is the
//! `(state, worker_thread_id)` pair written under a matching `(id, ver)`
//! update. A worker that loses the CAS race simply returns to polling.

use crate::actions::{ActionContext, ActionError, ActionRegistry};
use crate::error::EngineError;
use crate::queue::{JobQueue, POP_TIMEOUT};
use gantry_core::{
    Clock, Execution, ExecutionErrorKind, ExecutionId, ExecutionServerId, WorkerThread,
    HEARTBEAT_INTERVAL,
};
use gantry_store::{DataService, StoreError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct Worker<C: Clock> {
    data: DataService,
    queue: Arc<JobQueue>,
    actions: Arc<ActionRegistry>,
    clock: C,
    record: Mutex<WorkerThread>,
    last_heartbeat: Mutex<Instant>,
}

impl<C: Clock> Worker<C> {
    /// Persist a fresh WorkerThread row and wrap it in a worker.
    pub async fn register(
        data: DataService,
        queue: Arc<JobQueue>,
        actions: Arc<ActionRegistry>,
        clock: C,
        server_id: ExecutionServerId,
    ) -> Result<Self, EngineError> {
        let now = clock.now_utc();
        let started = clock.now();
        let mut record = WorkerThread::create(server_id, now);
        data.save_worker_thread(&mut record).await?;
        tracing::debug!(worker = %record.id, "worker thread registered");
        Ok(Self {
            data,
            queue,
            actions,
            clock,
            record: Mutex::new(record),
            last_heartbeat: Mutex::new(started),
        })
    }

    pub fn id(&self) -> gantry_core::WorkerThreadId {
        self.record.lock().id
    }

    /// Poll the queue until cancelled; on cancellation keep draining what is
    /// already queued, then stop.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() && self.queue.is_empty() {
                break;
            }
            if let Err(e) = self.maybe_heartbeat().await {
                tracing::warn!(error = %e, "worker heartbeat failed");
            }
            let Some(execution_id) = self.queue.pop(POP_TIMEOUT).await else {
                continue;
            };
            if let Err(e) = self.run_one(execution_id, &cancel).await {
                tracing::error!(
                    execution = %execution_id,
                    error = %e,
                    "execution run failed"
                );
            }
        }
        tracing::debug!(worker = %self.id(), "worker loop stopped");
    }

    /// Lease and drive a single execution. Losing the lease race, or finding
    /// the execution already terminal, is a quiet no-op.
    pub async fn run_one(
        &self,
        execution_id: ExecutionId,
        shutdown: &CancellationToken,
    ) -> Result<(), EngineError> {
        let Some(mut execution) = self.data.get_execution(execution_id).await? else {
            tracing::warn!(execution = %execution_id, "queued execution no longer exists");
            return Ok(());
        };

        let me = self.id();
        if execution.lease(me).is_err() {
            return Ok(());
        }
        match self.data.save_execution(&mut execution).await {
            Ok(()) => {}
            Err(StoreError::Concurrency { .. }) => {
                tracing::debug!(execution = %execution_id, "lost lease race");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        self.save_own(|record| record.execution_id = Some(execution_id)).await?;
        let outcome = self.drive(&mut execution, shutdown).await;
        self.save_own(|record| record.execution_id = None).await?;
        outcome
    }

    /// Drive a leased execution through its tasks in ascending step order.
    async fn drive(
        &self,
        execution: &mut Execution,
        shutdown: &CancellationToken,
    ) -> Result<(), EngineError> {
        let spec = match execution.job_spec() {
            Ok(spec) => spec,
            Err(e) => {
                return self
                    .finish_error(
                        execution,
                        ExecutionErrorKind::Validation,
                        format!("invalid job snapshot: {}", e),
                    )
                    .await;
            }
        };

        if self.check_cancelled(execution).await? {
            return Ok(());
        }

        execution.start(self.clock.now_utc())?;
        self.data.save_execution(execution).await?;
        tracing::info!(execution = %execution.id, job = %spec.job.name, "execution started");

        let tasks: Vec<_> = spec.runnable_tasks().cloned().collect();
        for task in tasks {
            // Between tasks: cooperative cancellation check, then liveness.
            if self.check_cancelled(execution).await? {
                return Ok(());
            }
            if let Err(e) = self.heartbeat().await {
                tracing::warn!(error = %e, "worker heartbeat failed");
            }

            execution.step(task.id)?;
            self.data.save_execution(execution).await?;

            let result = match self.actions.get(&task.action) {
                Some(handler) => {
                    let ctx = ActionContext {
                        execution_id: execution.id,
                        job: spec.clone(),
                        task: task.clone(),
                        shutdown: shutdown.clone(),
                    };
                    handler.run(&ctx).await
                }
                None => Err(ActionError::new(format!(
                    "no handler registered for action '{}'",
                    task.action
                ))),
            };

            if let Err(err) = result {
                let kind = if self.actions.get(&task.action).is_none() {
                    ExecutionErrorKind::Validation
                } else {
                    ExecutionErrorKind::Task
                };
                tracing::warn!(
                    execution = %execution.id,
                    step = task.step,
                    action = %task.action,
                    error = %err,
                    "task failed"
                );
                return self.finish_error(execution, kind, err.message).await;
            }
        }

        execution.complete(self.clock.now_utc())?;
        self.data.save_execution(execution).await?;
        tracing::info!(execution = %execution.id, "execution completed");
        Ok(())
    }

    /// Record a handler failure as durable `ERROR` state; failures of task
    /// `i` never run task `i + 1`.
    async fn finish_error(
        &self,
        execution: &mut Execution,
        kind: ExecutionErrorKind,
        message: String,
    ) -> Result<(), EngineError> {
        execution.fail(kind, message, self.clock.now_utc())?;
        self.data.save_execution(execution).await?;
        Ok(())
    }

    /// Poll for a CancellationEvent; when present, record terminal
    /// `CANCELLED` state and stop.
    async fn check_cancelled(&self, execution: &mut Execution) -> Result<bool, EngineError> {
        let Some(event) = self.data.find_cancellation(execution.id).await? else {
            return Ok(false);
        };
        execution.cancel(event.id, self.clock.now_utc())?;
        self.data.save_execution(execution).await?;
        tracing::info!(execution = %execution.id, cancellation = %event.id, "execution cancelled");
        Ok(true)
    }

    /// Refresh `heartbeat_on` when the interval has elapsed.
    pub async fn maybe_heartbeat(&self) -> Result<(), EngineError> {
        let due = {
            let last = self.last_heartbeat.lock();
            self.clock.now().duration_since(*last) >= HEARTBEAT_INTERVAL
        };
        if due {
            self.heartbeat().await?;
        }
        Ok(())
    }

    /// Refresh `heartbeat_on` now. A row reclaimed by recovery is replaced
    /// with a fresh registration.
    pub async fn heartbeat(&self) -> Result<(), EngineError> {
        let now = self.clock.now_utc();
        self.save_own(|record| record.heartbeat_on = now).await?;
        *self.last_heartbeat.lock() = self.clock.now();
        Ok(())
    }

    /// Delete this worker's row (graceful shutdown).
    pub async fn deregister(&self) -> Result<(), EngineError> {
        let record = self.record.lock().clone();
        match self.data.delete_worker_thread(&record).await {
            Ok(()) => Ok(()),
            Err(StoreError::Concurrency { .. }) => Ok(()), // reclaimed already
            Err(e) => Err(e.into()),
        }
    }

    async fn save_own(
        &self,
        mutate: impl FnOnce(&mut WorkerThread),
    ) -> Result<(), EngineError> {
        let mut record = self.record.lock().clone();
        mutate(&mut record);
        match self.data.save_worker_thread(&mut record).await {
            Ok(()) => {
                *self.record.lock() = record;
                Ok(())
            }
            Err(StoreError::NotFound { .. } | StoreError::Concurrency { .. }) => {
                // Recovery reclaimed the row while we were away; register a
                // fresh thread and carry on.
                tracing::warn!(worker = %record.id, "worker row reclaimed; re-registering");
                let server_id = record.execution_server_id;
                let mut fresh = WorkerThread::create(server_id, self.clock.now_utc());
                fresh.execution_id = record.execution_id;
                self.data.save_worker_thread(&mut fresh).await?;
                *self.record.lock() = fresh;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
