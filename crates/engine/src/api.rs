// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process trigger and cancellation entry points.
//!
//! Manual triggers bypass the scheduler loop but not the queue: the
//! execution is admitted durably first, then enqueued immediately. A
//! trigger created by a process without a queue (a web front end on a
//! separate `SERVER_TYPE`) is picked up by the recovery scan instead.

use crate::error::EngineError;
use crate::queue::JobQueue;
use chrono::{DateTime, Utc};
use gantry_core::{CancellationEventId, ExecutionId, JobId, TriggerEventId, UserId};
use gantry_store::DataService;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct TriggerApi {
    data: DataService,
    queue: Option<Arc<JobQueue>>,
}

impl TriggerApi {
    pub fn new(data: DataService, queue: Option<Arc<JobQueue>>) -> Self {
        Self { data, queue }
    }

    /// Manually trigger a job on behalf of a user; returns the TriggerEvent
    /// id.
    pub async fn trigger_job(
        &self,
        job_id: JobId,
        user_id: UserId,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<TriggerEventId, EngineError> {
        let (event, execution) = self.data.trigger_job(job_id, user_id, now).await?;
        if let Some(queue) = &self.queue {
            queue.push(execution.id, cancel).await?;
        }
        Ok(event.id)
    }

    /// Request cancellation of an execution; repeated cancels return the
    /// original event.
    pub async fn cancel_execution(
        &self,
        execution_id: ExecutionId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<CancellationEventId, EngineError> {
        Ok(self.data.cancel_execution(execution_id, user_id, now).await?.id)
    }
}
