// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone as _;
use gantry_core::{ExecutionState, Tag};

async fn service() -> DataService {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    DataService::open(db, "gantry_data").await.unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap()
}

async fn seeded() -> (DataService, System) {
    let svc = service().await;
    let system = svc.bootstrap("admin", "password").await.unwrap();
    (svc, system)
}

#[tokio::test]
async fn bootstrap_creates_system_and_admin_once() {
    let svc = service().await;
    let system = svc.bootstrap("admin", "password").await.unwrap();

    let users = svc.list_users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert!(users[0].is_system);
    assert!(users[0].is_admin);
    assert_eq!(users[0].username, "admin");
    assert!(password_verify("password", &users[0].password_salt, &users[0].password_hash));

    // applied only when no system user exists
    let again = svc.bootstrap("other", "pw").await.unwrap();
    assert_eq!(again.id, system.id);
    assert_eq!(svc.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_username_is_rejected_case_insensitively() {
    let (svc, system) = seeded().await;
    let mut alice = User::create(system.id, "alice", "h", "s");
    svc.save_user(&mut alice).await.unwrap();

    let mut shouty = User::create(system.id, "ALICE", "h", "s");
    assert!(matches!(
        svc.save_user(&mut shouty).await.unwrap_err(),
        StoreError::InvalidState(_)
    ));

    // updating alice herself is fine
    alice.email = Some("alice@example.com".to_string());
    svc.save_user(&mut alice).await.unwrap();
}

#[tokio::test]
async fn renaming_onto_a_taken_username_is_rejected() {
    let (svc, system) = seeded().await;
    let mut alice = User::create(system.id, "alice", "h", "s");
    let mut bob = User::create(system.id, "bob", "h", "s");
    svc.save_user(&mut alice).await.unwrap();
    svc.save_user(&mut bob).await.unwrap();

    bob.username = "Alice".to_string();
    assert!(matches!(
        svc.save_user(&mut bob).await.unwrap_err(),
        StoreError::InvalidState(_)
    ));
}

#[tokio::test]
async fn system_user_rules() {
    let (svc, system) = seeded().await;
    let users = svc.list_users().await.unwrap();
    let mut admin = users.into_iter().find(|u| u.is_system).unwrap();

    // a second system user cannot be created
    let mut usurper = User::create(system.id, "usurper", "h", "s");
    usurper.is_system = true;
    assert!(svc.save_user(&mut usurper).await.is_err());

    // the lone system user cannot be demoted
    admin.is_system = false;
    assert!(svc.save_user(&mut admin).await.is_err());
    admin.is_system = true;

    // no other user can be promoted
    let mut bob = User::create(system.id, "bob", "h", "s");
    svc.save_user(&mut bob).await.unwrap();
    bob.is_system = true;
    assert!(svc.save_user(&mut bob).await.is_err());

    // the system user cannot be deleted; others can
    assert!(svc.delete_user(&admin).await.is_err());
    bob.is_system = false;
    let bob_fresh = svc.get_user(bob.id).await.unwrap().unwrap();
    svc.delete_user(&bob_fresh).await.unwrap();

    // deleting a user that no longer exists is a warn-logged no-op
    svc.delete_user(&bob_fresh).await.unwrap();
}

#[tokio::test]
async fn job_aggregate_round_trip() {
    let (svc, system) = seeded().await;
    let mut spec = JobSpec::new(Job::create(system.id, "nightly"));
    let mut t1 = Task::create(spec.job.id, "Extract");
    t1.step = 5;
    let mut t2 = Task::create(spec.job.id, "load");
    t2.step = 2;
    spec.tasks.push(t1);
    spec.tasks.push(t2);
    spec.schedules.push(Schedule::create(spec.job.id, "0 0 3 * * *"));
    spec.tags.push(Tag::new(" Env ", " PROD "));
    spec.tags.push(Tag::new("env", "prod"));
    spec.tags.push(Tag::new("env", "staging"));

    svc.save_job(&mut spec).await.unwrap();

    let loaded = svc.get_job(spec.job.id).await.unwrap().unwrap();
    assert_eq!(loaded.job.name, "nightly");
    // steps re-indexed densely, ordered by the original step values
    let actions: Vec<&str> = loaded.tasks.iter().map(|t| t.action.as_str()).collect();
    assert_eq!(actions, vec!["load", "extract"]);
    assert_eq!(loaded.tasks[0].step, 0);
    assert_eq!(loaded.tasks[1].step, 1);
    assert_eq!(loaded.schedules.len(), 1);
    // exact duplicates collapse; distinct values under one name survive
    assert_eq!(
        loaded.tags,
        vec![Tag::new("env", "prod"), Tag::new("env", "staging")]
    );
}

#[tokio::test]
async fn save_job_deletes_dropped_children() {
    let (svc, system) = seeded().await;
    let mut spec = JobSpec::new(Job::create(system.id, "shrinking"));
    spec.tasks.push(Task::create(spec.job.id, "a"));
    spec.tasks.push(Task::create(spec.job.id, "b"));
    svc.save_job(&mut spec).await.unwrap();

    spec.tasks.remove(1);
    svc.save_job(&mut spec).await.unwrap();

    let loaded = svc.get_job(spec.job.id).await.unwrap().unwrap();
    assert_eq!(loaded.tasks.len(), 1);
    assert_eq!(loaded.tasks[0].action, "a");
}

#[tokio::test]
async fn delete_job_cascades_and_is_idempotent() {
    let (svc, system) = seeded().await;
    let mut spec = JobSpec::new(Job::create(system.id, "doomed"));
    spec.tasks.push(Task::create(spec.job.id, "a"));
    spec.schedules.push(Schedule::create(spec.job.id, "0 * * * * *"));
    svc.save_job(&mut spec).await.unwrap();

    svc.delete_job(&spec).await.unwrap();
    assert!(svc.get_job(spec.job.id).await.unwrap().is_none());
    // the system and admin rows are untouched
    assert!(svc.table().select_count_all().await.unwrap() > 0);

    // second delete: warn-logged no-op
    svc.delete_job(&spec).await.unwrap();
}

#[tokio::test]
async fn trigger_job_creates_event_and_triggered_execution() {
    let (svc, system) = seeded().await;
    let mut spec = JobSpec::new(Job::create(system.id, "runnable"));
    spec.tasks.push(Task::create(spec.job.id, "noop"));
    svc.save_job(&mut spec).await.unwrap();
    let user = svc.list_users().await.unwrap().remove(0);

    let (event, execution) = svc.trigger_job(spec.job.id, user.id, now()).await.unwrap();
    assert_eq!(event.job_id, spec.job.id);
    assert_eq!(event.triggered_by_user_id, Some(user.id));
    assert_eq!(event.triggered_by_schedule_id, None);

    assert_eq!(execution.state, ExecutionState::Triggered);
    assert_eq!(execution.trigger_event_id, event.id);
    let snapshot = execution.job_spec().unwrap();
    assert_eq!(snapshot.job.id, spec.job.id);
    assert_eq!(snapshot.tasks.len(), 1);
}

#[tokio::test]
async fn trigger_inactive_job_is_rejected() {
    let (svc, system) = seeded().await;
    let mut spec = JobSpec::new(Job::create(system.id, "sleeping"));
    spec.job.is_active = false;
    spec.tasks.push(Task::create(spec.job.id, "noop"));
    svc.save_job(&mut spec).await.unwrap();
    let user = svc.list_users().await.unwrap().remove(0);

    assert!(matches!(
        svc.trigger_job(spec.job.id, user.id, now()).await.unwrap_err(),
        StoreError::InvalidState(_)
    ));
}

#[tokio::test]
async fn trigger_unknown_job_is_not_found() {
    let (svc, _) = seeded().await;
    let user = svc.list_users().await.unwrap().remove(0);
    assert!(matches!(
        svc.trigger_job(JobId::new(), user.id, now()).await.unwrap_err(),
        StoreError::NotFound { .. }
    ));
}

#[tokio::test]
async fn cancel_execution_is_idempotent() {
    let (svc, system) = seeded().await;
    let mut spec = JobSpec::new(Job::create(system.id, "cancellable"));
    spec.tasks.push(Task::create(spec.job.id, "noop"));
    svc.save_job(&mut spec).await.unwrap();
    let user = svc.list_users().await.unwrap().remove(0);
    let (_, execution) = svc.trigger_job(spec.job.id, user.id, now()).await.unwrap();

    let first = svc.cancel_execution(execution.id, user.id, now()).await.unwrap();
    let second = svc.cancel_execution(execution.id, user.id, now()).await.unwrap();
    assert_eq!(first.id, second.id);

    let found = svc.find_cancellation(execution.id).await.unwrap().unwrap();
    assert_eq!(found.id, first.id);
}

#[tokio::test]
async fn cancel_of_unknown_execution_is_not_found() {
    let (svc, _) = seeded().await;
    let user = svc.list_users().await.unwrap().remove(0);
    assert!(matches!(
        svc.cancel_execution(ExecutionId::new(), user.id, now()).await.unwrap_err(),
        StoreError::NotFound { .. }
    ));
}

#[tokio::test]
async fn scheduler_state_is_a_singleton_per_system() {
    let (svc, system) = seeded().await;
    let first = svc.scheduler_state(system.id).await.unwrap();
    let second = svc.scheduler_state(system.id).await.unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn password_hash_round_trip() {
    let hash = password_hash("secret", "salty");
    assert_eq!(hash.len(), 64);
    assert!(password_verify("secret", "salty", &hash));
    assert!(!password_verify("wrong", "salty", &hash));
    assert_ne!(password_hash("secret", "other"), hash);
}
