// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::db::{Database, TableSpec};
use crate::error::StoreError;
use crate::row::IdKind;
use gantry_core::{Job, SystemId, Tag, User};

async fn stores() -> (TypedStore<Job>, TypedStore<User>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let table = db.create_table(TableSpec::new("t", IdKind::Uuid)).await.unwrap();
    (TypedStore::new(Arc::clone(&table)), TypedStore::new(table))
}

#[tokio::test]
async fn save_inserts_then_updates() {
    let (jobs, _) = stores().await;
    let mut job = Job::create(SystemId::new(), "first");
    assert_eq!(job.ver, 0);

    jobs.save(&mut job).await.unwrap();
    assert_eq!(job.ver, 1);

    job.name = "renamed".to_string();
    jobs.save(&mut job).await.unwrap();
    assert_eq!(job.ver, 2);

    let stored = jobs.get(job.id.as_uuid()).await.unwrap().unwrap();
    assert_eq!(stored.name, "renamed");
    assert_eq!(stored.ver, 2);
}

#[tokio::test]
async fn stale_save_fails_with_concurrency() {
    let (jobs, _) = stores().await;
    let mut job = Job::create(SystemId::new(), "contested");
    jobs.save(&mut job).await.unwrap();

    let mut stale = job.clone();
    job.name = "winner".to_string();
    jobs.save(&mut job).await.unwrap();

    stale.name = "loser".to_string();
    assert!(matches!(
        jobs.save(&mut stale).await.unwrap_err(),
        StoreError::Concurrency { .. }
    ));

    let stored = jobs.get(job.id.as_uuid()).await.unwrap().unwrap();
    assert_eq!(stored.name, "winner");
}

#[tokio::test]
async fn save_rejects_invalid_records() {
    let (jobs, _) = stores().await;
    let mut job = Job::create(SystemId::new(), "   ");
    assert!(matches!(
        jobs.save(&mut job).await.unwrap_err(),
        StoreError::InvalidState(_)
    ));
}

#[tokio::test]
async fn get_ignores_rows_of_other_families() {
    let (jobs, users) = stores().await;
    let mut user = User::create(SystemId::new(), "alice", "hash", "salt");
    users.save(&mut user).await.unwrap();

    // A User row under that id is not a Job.
    assert!(jobs.get(user.id.as_uuid()).await.unwrap().is_none());
    assert!(users.get(user.id.as_uuid()).await.unwrap().is_some());
}

#[tokio::test]
async fn get_all_filters_by_type_and_count_matches() {
    let (jobs, users) = stores().await;
    let system = SystemId::new();
    for name in ["a", "b"] {
        jobs.save(&mut Job::create(system, name)).await.unwrap();
    }
    users.save(&mut User::create(system, "alice", "h", "s")).await.unwrap();

    assert_eq!(jobs.get_all().await.unwrap().len(), 2);
    assert_eq!(users.get_all().await.unwrap().len(), 1);
    assert_eq!(jobs.count().await.unwrap(), 2);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (jobs, _) = stores().await;
    let mut job = Job::create(SystemId::new(), "gone");
    jobs.save(&mut job).await.unwrap();

    jobs.delete(&job).await.unwrap();
    assert!(jobs.get(job.id.as_uuid()).await.unwrap().is_none());
    // second delete of a missing row is a no-op
    jobs.delete(&job).await.unwrap();
}

#[tokio::test]
async fn tags_persist_with_the_row() {
    let (jobs, _) = stores().await;
    let mut job = Job::create(SystemId::new(), "tagged");
    let tags = vec![Tag::new("env", "prod"), Tag::new("env", "staging")];
    jobs.save_with_tags(&mut job, tags.clone()).await.unwrap();

    let (_, stored_tags) = jobs.get_with_tags(job.id.as_uuid()).await.unwrap().unwrap();
    assert_eq!(stored_tags, tags);
}
