// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler loop: turns due Schedules into TriggerEvents and Executions.
//!
//! Exactly one server runs the loop at a time. Leadership is a best-effort
//! CAS lease on the `scheduler` named row; a leader whose server heartbeat
//! goes stale is replaced on some other server's next tick. Fired-minute
//! bookkeeping is persisted with the leader state, so a freshly elected
//! leader never back-fires minutes the old leader missed.

use crate::error::EngineError;
use crate::queue::JobQueue;
use chrono::{DateTime, Utc};
use gantry_core::{
    Clock, ExecutionServerId, ScheduleId, SchedulerState, SystemId, TriggerEvent,
};
use gantry_store::{DataService, StoreError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default tick interval.
pub const SCHEDULER_TICK: Duration = Duration::from_secs(1);

/// The black-box cron oracle: next fire time of `expr` strictly after
/// `since`, or `None` when the expression has no future firings.
pub fn next_fire_time(
    expr: &str,
    since: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, EngineError> {
    let schedule = cron::Schedule::from_str(expr)
        .map_err(|e| EngineError::Cron { expr: expr.to_string(), message: e.to_string() })?;
    Ok(schedule.after(&since).next())
}

fn minute_bucket(when: DateTime<Utc>) -> i64 {
    when.timestamp() / 60
}

pub struct Scheduler<C: Clock> {
    data: DataService,
    queue: Arc<JobQueue>,
    clock: C,
    server_id: ExecutionServerId,
    system_id: SystemId,
    interval: Duration,
    /// Cached next fire time per schedule. Cleared on (re-)election so fire
    /// times are computed from "now" and missed minutes are never replayed.
    next_fire: Mutex<HashMap<ScheduleId, DateTime<Utc>>>,
    leading: Mutex<bool>,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(
        data: DataService,
        queue: Arc<JobQueue>,
        clock: C,
        server_id: ExecutionServerId,
        system_id: SystemId,
        interval: Duration,
    ) -> Self {
        Self {
            data,
            queue,
            clock,
            server_id,
            system_id,
            interval,
            next_fire: Mutex::new(HashMap::new()),
            leading: Mutex::new(false),
        }
    }

    pub fn is_leading(&self) -> bool {
        *self.leading.lock()
    }

    /// One pass: confirm or claim leadership, then fire due schedules.
    /// Returns the number of executions admitted.
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<usize, EngineError> {
        let now = self.clock.now_utc();
        let mut state = self.data.scheduler_state(self.system_id).await?;
        if !self.ensure_leader(&mut state, now).await? {
            *self.leading.lock() = false;
            return Ok(0);
        }

        let specs = self.data.list_jobs().await?;
        let mut fired = 0usize;
        let mut dirty = false;

        for spec in specs.iter().filter(|s| s.job.is_active) {
            for schedule in spec.schedules.iter().filter(|s| s.is_active) {
                let due = { self.next_fire.lock().get(&schedule.id).copied() };
                let due = match due {
                    Some(due) => due,
                    None => {
                        // first sight: compute from now, fire on a later tick
                        match next_fire_time(&schedule.cron, now) {
                            Ok(Some(next)) => {
                                self.next_fire.lock().insert(schedule.id, next);
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!(
                                    schedule = %schedule.id,
                                    error = %e,
                                    "skipping schedule with bad cron expression"
                                );
                            }
                        }
                        continue;
                    }
                };
                if due > now {
                    continue;
                }

                let bucket = minute_bucket(now);
                if state.already_fired(schedule.id, bucket) {
                    self.cache_next(schedule.id, &schedule.cron, now);
                    continue;
                }

                let mut event = TriggerEvent::scheduled(spec.job.id, schedule.id, now);
                self.data.save_trigger_event(&mut event).await?;
                let execution = self.data.admit_trigger(&event, spec).await?;
                self.queue.push(execution.id, cancel).await?;
                state.record_fired(schedule.id, bucket);
                dirty = true;
                fired += 1;
                tracing::info!(
                    job = %spec.job.name,
                    schedule = %schedule.id,
                    execution = %execution.id,
                    "schedule fired"
                );
                self.cache_next(schedule.id, &schedule.cron, now);
            }
        }

        if dirty {
            match self.data.save_scheduler_state(&mut state).await {
                Ok(()) => {}
                Err(StoreError::Concurrency { .. }) => {
                    tracing::warn!("scheduler state written by another server; dropping lead");
                    *self.leading.lock() = false;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(fired)
    }

    fn cache_next(&self, schedule_id: ScheduleId, expr: &str, now: DateTime<Utc>) {
        match next_fire_time(expr, now) {
            Ok(Some(next)) => {
                self.next_fire.lock().insert(schedule_id, next);
            }
            _ => {
                self.next_fire.lock().remove(&schedule_id);
            }
        }
    }

    /// Confirm we lead, or claim the lease when it is free or its holder's
    /// heartbeat is stale. Losing the claim race is not an error.
    async fn ensure_leader(
        &self,
        state: &mut SchedulerState,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        if state.leader_server_id == Some(self.server_id) {
            *self.leading.lock() = true;
            return Ok(true);
        }

        if let Some(leader) = state.leader_server_id {
            let servers = self.data.list_servers().await?;
            let leader_alive = servers
                .iter()
                .find(|s| s.id == leader)
                .map(|s| !s.is_stale(now))
                .unwrap_or(false);
            if leader_alive {
                return Ok(false);
            }
        }

        state.leader_server_id = Some(self.server_id);
        match self.data.save_scheduler_state(state).await {
            Ok(()) => {
                tracing::info!(server = %self.server_id, "took over scheduler lead");
                self.next_fire.lock().clear();
                *self.leading.lock() = true;
                Ok(true)
            }
            Err(StoreError::Concurrency { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Tick until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.tick(&cancel).await {
                Ok(_) => {}
                Err(EngineError::Overflow) => {
                    tracing::warn!("queue full during shutdown; trigger dropped to recovery");
                }
                Err(e) => tracing::error!(error = %e, "scheduler tick failed"),
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::debug!("scheduler loop stopped");
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
