// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution server host: worker pool, heartbeats, recovery, scheduler.

use crate::actions::ActionRegistry;
use crate::error::EngineError;
use crate::queue::{JobQueue, DEFAULT_QUEUE_CAPACITY};
use crate::scheduler::{Scheduler, SCHEDULER_TICK};
use crate::worker::Worker;
use gantry_core::{
    Clock, ExecutionServer, ExecutionState, InvalidState, SystemId, WorkerThread,
    HEARTBEAT_INTERVAL,
};
use gantry_store::{DataService, StoreError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How often the recovery scan runs.
pub const RECOVERY_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub scheduler_interval: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            scheduler_interval: SCHEDULER_TICK,
        }
    }
}

/// One execution server process: owns N workers, refreshes liveness rows,
/// reclaims orphaned work, and runs the scheduler loop when elected.
pub struct ExecutionHost<C: Clock + 'static> {
    data: DataService,
    clock: C,
    queue: Arc<JobQueue>,
    workers: Vec<Arc<Worker<C>>>,
    scheduler: Arc<Scheduler<C>>,
    server: Mutex<ExecutionServer>,
    system_id: SystemId,
}

impl<C: Clock + 'static> ExecutionHost<C> {
    /// Register the server row and its worker threads.
    ///
    /// Requires a bootstrapped system (the System row must exist).
    pub async fn start(
        data: DataService,
        clock: C,
        actions: Arc<ActionRegistry>,
        config: HostConfig,
    ) -> Result<Arc<Self>, EngineError> {
        let system = data
            .system()
            .await?
            .ok_or_else(|| InvalidState::msg("system", "system has not been bootstrapped"))?;

        let now = clock.now_utc();
        let mut server = ExecutionServer::create(system.id, now);
        data.save_server(&mut server).await?;
        tracing::info!(server = %server.id, workers = config.worker_count, "execution server started");

        let queue = Arc::new(JobQueue::new(config.queue_capacity));
        let mut workers = Vec::with_capacity(config.worker_count);
        for _ in 0..config.worker_count {
            workers.push(Arc::new(
                Worker::register(
                    data.clone(),
                    Arc::clone(&queue),
                    Arc::clone(&actions),
                    clock.clone(),
                    server.id,
                )
                .await?,
            ));
        }

        let scheduler = Arc::new(Scheduler::new(
            data.clone(),
            Arc::clone(&queue),
            clock.clone(),
            server.id,
            system.id,
            config.scheduler_interval,
        ));

        Ok(Arc::new(Self {
            data,
            clock,
            queue,
            workers,
            scheduler,
            server: Mutex::new(server),
            system_id: system.id,
        }))
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn server_id(&self) -> gantry_core::ExecutionServerId {
        self.server.lock().id
    }

    pub fn system_id(&self) -> SystemId {
        self.system_id
    }

    pub fn scheduler(&self) -> &Arc<Scheduler<C>> {
        &self.scheduler
    }

    /// Run every loop until `cancel` fires, then drain and clean up.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), EngineError> {
        let mut handles = Vec::new();

        for worker in &self.workers {
            let worker = Arc::clone(worker);
            let token = cancel.clone();
            handles.push(tokio::spawn(async move { worker.run(token).await }));
        }

        {
            let scheduler = Arc::clone(&self.scheduler);
            let token = cancel.clone();
            handles.push(tokio::spawn(async move { scheduler.run(token).await }));
        }

        {
            let host = Arc::clone(&self);
            let token = cancel.clone();
            handles.push(tokio::spawn(async move { host.heartbeat_loop(token).await }));
        }

        {
            let host = Arc::clone(&self);
            let token = cancel.clone();
            handles.push(tokio::spawn(async move { host.recovery_loop(token).await }));
        }

        cancel.cancelled().await;
        tracing::info!("execution server shutting down");
        for handle in handles {
            let _ = handle.await;
        }
        self.shutdown().await
    }

    async fn heartbeat_loop(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {}
            }
            if let Err(e) = self.heartbeat().await {
                tracing::warn!(error = %e, "server heartbeat failed");
            }
        }
    }

    /// Refresh the server row's `heartbeat_on`; a reclaimed row is
    /// re-registered.
    pub async fn heartbeat(&self) -> Result<(), EngineError> {
        let mut server = self.server.lock().clone();
        server.heartbeat_on = self.clock.now_utc();
        match self.data.save_server(&mut server).await {
            Ok(()) => {
                *self.server.lock() = server;
                Ok(())
            }
            Err(StoreError::NotFound { .. } | StoreError::Concurrency { .. }) => {
                tracing::warn!(server = %server.id, "server row reclaimed; re-registering");
                let mut fresh = ExecutionServer::create(self.system_id, self.clock.now_utc());
                self.data.save_server(&mut fresh).await?;
                *self.server.lock() = fresh;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn recovery_loop(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(RECOVERY_INTERVAL) => {}
            }
            if let Err(e) = self.recover().await {
                tracing::warn!(error = %e, "recovery pass failed");
            }
        }
    }

    /// Reclaim orphaned work: delete stale liveness rows, reset their
    /// executions from `STARTED` back to `QUEUED`, and (re-)enqueue
    /// unclaimed executions.
    ///
    /// Every step is an optimistic `(id, ver)` mutation, so a row whose
    /// owner heartbeats concurrently survives (the CAS fails) and the pass
    /// is safe to re-run at any time.
    pub async fn recover(&self) -> Result<(), EngineError> {
        let now = self.clock.now_utc();
        let servers = self.data.list_servers().await?;
        let threads = self.data.list_worker_threads().await?;

        let stale_servers: HashSet<_> =
            servers.iter().filter(|s| s.is_stale(now)).map(|s| s.id).collect();
        let live_servers: HashSet<_> =
            servers.iter().filter(|s| !s.is_stale(now)).map(|s| s.id).collect();

        let mut live_threads = HashSet::new();
        for thread in &threads {
            let orphaned = stale_servers.contains(&thread.execution_server_id)
                || !live_servers.contains(&thread.execution_server_id);
            if thread.is_stale(now) || orphaned {
                self.reclaim_thread(thread).await?;
            } else {
                live_threads.insert(thread.id);
            }
        }

        for server in servers.iter().filter(|s| s.is_stale(now)) {
            match self.data.delete_server(server).await {
                Ok(()) => tracing::info!(server = %server.id, "deleted stale server"),
                Err(StoreError::Concurrency { .. }) => {} // came back to life
                Err(e) => return Err(e.into()),
            }
        }

        // Rebuild queue contents: TRIGGERED executions and QUEUED/STARTED
        // ones whose lease no longer points at a live thread.
        for mut execution in self.data.list_executions().await? {
            match execution.state {
                ExecutionState::Triggered => {
                    self.queue.try_push(execution.id);
                }
                ExecutionState::Queued | ExecutionState::Started => {
                    let lease_live = execution
                        .worker_thread_id
                        .map(|id| live_threads.contains(&id))
                        .unwrap_or(false);
                    if lease_live {
                        continue;
                    }
                    if execution.worker_thread_id.is_some()
                        || execution.state == ExecutionState::Started
                    {
                        if execution.requeue().is_err() {
                            continue;
                        }
                        match self.data.save_execution(&mut execution).await {
                            Ok(()) => {}
                            Err(StoreError::Concurrency { .. }) => continue,
                            Err(e) => return Err(e.into()),
                        }
                    }
                    self.queue.try_push(execution.id);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Delete a stale thread row after clearing its execution lease.
    async fn reclaim_thread(&self, thread: &WorkerThread) -> Result<(), EngineError> {
        if let Some(execution_id) = thread.execution_id {
            if let Some(mut execution) = self.data.get_execution(execution_id).await? {
                if execution.requeue().is_ok() {
                    match self.data.save_execution(&mut execution).await {
                        Ok(()) => {
                            self.queue.try_push(execution.id);
                        }
                        Err(StoreError::Concurrency { .. }) => {}
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
        match self.data.delete_worker_thread(thread).await {
            Ok(()) => {
                tracing::info!(worker = %thread.id, "deleted stale worker thread");
                Ok(())
            }
            Err(StoreError::Concurrency { .. }) => Ok(()), // heartbeated since
            Err(e) => Err(e.into()),
        }
    }

    /// Graceful exit: remove this server's liveness rows.
    async fn shutdown(&self) -> Result<(), EngineError> {
        for worker in &self.workers {
            if let Err(e) = worker.deregister().await {
                tracing::warn!(error = %e, "worker deregistration failed");
            }
        }
        let server = self.server.lock().clone();
        match self.data.delete_server(&server).await {
            Ok(()) => {}
            Err(StoreError::Concurrency { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(server = %server.id, "execution server stopped");
        Ok(())
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
