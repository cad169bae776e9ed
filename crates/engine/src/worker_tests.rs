// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::actions::{Action, ActionContext, ActionError};
use async_trait::async_trait;
use chrono::TimeZone as _;
use gantry_core::{ExecutionState, FakeClock, Job, JobSpec, Task, UserId};
use gantry_store::Database;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct CountAction {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Action for CountAction {
    async fn run(&self, _ctx: &ActionContext) -> Result<(), ActionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Fixture {
    svc: DataService,
    clock: FakeClock,
    worker: Worker<FakeClock>,
    user: UserId,
    calls: Arc<AtomicUsize>,
}

async fn fixture() -> Fixture {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let svc = DataService::open(db, "gantry_data").await.unwrap();
    let system = svc.bootstrap("admin", "password").await.unwrap();
    let user = svc.list_users().await.unwrap().remove(0).id;

    let clock = FakeClock::new();
    clock.set_utc(chrono::Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap());
    let mut server = gantry_core::ExecutionServer::create(system.id, clock.now_utc());
    svc.save_server(&mut server).await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ActionRegistry::builtin();
    registry.register("count", Arc::new(CountAction { calls: Arc::clone(&calls) }));

    let queue = Arc::new(JobQueue::new(16));
    let worker = Worker::register(svc.clone(), queue, Arc::new(registry), clock.clone(), server.id)
        .await
        .unwrap();

    Fixture { svc, clock, worker, user, calls }
}

async fn job_with_actions(f: &Fixture, actions: &[&str]) -> JobSpec {
    let system = f.svc.system().await.unwrap().unwrap();
    let mut spec = JobSpec::new(Job::create(system.id, "work"));
    for action in actions {
        spec.tasks.push(Task::create(spec.job.id, *action));
    }
    f.svc.save_job(&mut spec).await.unwrap();
    spec
}

#[tokio::test]
async fn drives_an_execution_to_completed() {
    let f = fixture().await;
    let spec = job_with_actions(&f, &["count", "count"]).await;
    let (_, execution) =
        f.svc.trigger_job(spec.job.id, f.user, f.clock.now_utc()).await.unwrap();

    let cancel = CancellationToken::new();
    f.worker.run_one(execution.id, &cancel).await.unwrap();

    let done = f.svc.get_execution(execution.id).await.unwrap().unwrap();
    assert_eq!(done.state, ExecutionState::Completed);
    assert_eq!(f.calls.load(Ordering::SeqCst), 2);

    // executing task is the last one, completion timestamps are ordered
    let snapshot = done.job_spec().unwrap();
    assert_eq!(done.executing_task_id, Some(snapshot.tasks[1].id));
    assert!(done.completed_on.unwrap() >= done.started_on.unwrap());
    assert_eq!(done.worker_thread_id, Some(f.worker.id()));

    // the worker's own lease is cleared
    let threads = f.svc.list_worker_threads().await.unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].execution_id, None);
}

#[tokio::test]
async fn task_failure_records_error_and_skips_the_rest() {
    let f = fixture().await;
    let spec = job_with_actions(&f, &["fail", "count"]).await;
    let (_, execution) =
        f.svc.trigger_job(spec.job.id, f.user, f.clock.now_utc()).await.unwrap();

    let cancel = CancellationToken::new();
    f.worker.run_one(execution.id, &cancel).await.unwrap();

    let done = f.svc.get_execution(execution.id).await.unwrap().unwrap();
    assert_eq!(done.state, ExecutionState::Error);
    assert_eq!(done.error_kind, Some(gantry_core::ExecutionErrorKind::Task));
    assert_eq!(done.error_message.as_deref(), Some("task failed"));
    assert!(done.completed_on.is_some());
    // the failing task never handed control to the next one
    assert_eq!(f.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_action_is_a_validation_error() {
    let f = fixture().await;
    let spec = job_with_actions(&f, &["no-such-handler"]).await;
    let (_, execution) =
        f.svc.trigger_job(spec.job.id, f.user, f.clock.now_utc()).await.unwrap();

    let cancel = CancellationToken::new();
    f.worker.run_one(execution.id, &cancel).await.unwrap();

    let done = f.svc.get_execution(execution.id).await.unwrap().unwrap();
    assert_eq!(done.state, ExecutionState::Error);
    assert_eq!(done.error_kind, Some(gantry_core::ExecutionErrorKind::Validation));
}

#[tokio::test]
async fn inactive_tasks_are_skipped() {
    let f = fixture().await;
    let mut spec = job_with_actions(&f, &["count", "count", "count"]).await;
    spec.tasks[1].is_active = false;
    f.svc.save_job(&mut spec).await.unwrap();
    let (_, execution) =
        f.svc.trigger_job(spec.job.id, f.user, f.clock.now_utc()).await.unwrap();

    let cancel = CancellationToken::new();
    f.worker.run_one(execution.id, &cancel).await.unwrap();

    let done = f.svc.get_execution(execution.id).await.unwrap().unwrap();
    assert_eq!(done.state, ExecutionState::Completed);
    assert_eq!(f.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cancellation_before_start_wins() {
    let f = fixture().await;
    let spec = job_with_actions(&f, &["count"]).await;
    let (_, execution) =
        f.svc.trigger_job(spec.job.id, f.user, f.clock.now_utc()).await.unwrap();
    let event =
        f.svc.cancel_execution(execution.id, f.user, f.clock.now_utc()).await.unwrap();

    let cancel = CancellationToken::new();
    f.worker.run_one(execution.id, &cancel).await.unwrap();

    let done = f.svc.get_execution(execution.id).await.unwrap().unwrap();
    assert_eq!(done.state, ExecutionState::Cancelled);
    assert_eq!(done.cancellation_event_id, Some(event.id));
    assert_eq!(done.started_on, None);
    assert!(done.completed_on.is_some());
    assert_eq!(f.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn terminal_executions_are_left_alone() {
    let f = fixture().await;
    let spec = job_with_actions(&f, &["count"]).await;
    let (_, execution) =
        f.svc.trigger_job(spec.job.id, f.user, f.clock.now_utc()).await.unwrap();

    let cancel = CancellationToken::new();
    f.worker.run_one(execution.id, &cancel).await.unwrap();
    let after_first = f.svc.get_execution(execution.id).await.unwrap().unwrap();

    // a second pop of the same id is a quiet no-op
    f.worker.run_one(execution.id, &cancel).await.unwrap();
    let after_second = f.svc.get_execution(execution.id).await.unwrap().unwrap();
    assert_eq!(after_first, after_second);
    assert_eq!(f.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn heartbeat_refreshes_the_row() {
    let f = fixture().await;
    let before = f.svc.list_worker_threads().await.unwrap().remove(0);
    f.clock.advance(Duration::from_secs(7));
    f.worker.heartbeat().await.unwrap();
    let after = f.svc.list_worker_threads().await.unwrap().remove(0);
    assert!(after.heartbeat_on > before.heartbeat_on);
}
