// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone as _;
use chrono::{DateTime, Utc};
use gantry_core::{
    CancellationEventId, ExecutionId, ExecutionServerId, ExecutionState, JobId, JobSpec,
    ScheduleId, SystemId, Tag, TriggerEventId, UserId,
};

fn now() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap()
}

fn round_trip<T: Entity + PartialEq + std::fmt::Debug>(obj: &T) {
    let row = encode(obj).unwrap();
    assert_eq!(row.id, None);
    assert_eq!(row.ver, None);
    assert_eq!(row.dsmall.as_deref(), Some(T::TYPE_TAG));
    let back: T = decode(&row).unwrap();
    assert_eq!(&back, obj);
}

#[test]
fn round_trip_every_variant() {
    let system_id = SystemId::new();
    let job_id = JobId::new();

    round_trip(&System::create("root"));
    round_trip(&ConfigItem::create(system_id, "retries", "3"));

    let mut user = User::create(system_id, "alice", "hash", "salt");
    user.email = Some("a@example.com".to_string());
    round_trip(&user);

    round_trip(&Job::create(system_id, "nightly"));
    let mut task = Task::create(job_id, "noop");
    task.step = 0;
    round_trip(&task);
    round_trip(&Schedule::create(job_id, "0 0 * * * *"));
    round_trip(&TriggerEvent::scheduled(job_id, ScheduleId::new(), now()));
    round_trip(&TriggerEvent::manual(job_id, UserId::new(), now()));
    round_trip(&CancellationEvent::create(ExecutionId::new(), UserId::new(), now()));

    let mut execution =
        Execution::create(system_id, TriggerEventId::new(), "{\"k\":1}".to_string());
    execution.state = ExecutionState::Started;
    execution.started_on = Some(now());
    execution.cancellation_event_id = Some(CancellationEventId::new());
    round_trip(&execution);

    round_trip(&ExecutionServer::create(system_id, now()));
    round_trip(&WorkerThread::create(ExecutionServerId::new(), now()));

    let mut state = SchedulerState::create(system_id);
    state.record_fired(ScheduleId::new(), 42);
    round_trip(&state);
}

#[test]
fn encode_omits_null_fields() {
    let user = User::create(SystemId::new(), "alice", "hash", "salt");
    let row = encode(&user).unwrap();
    let payload = row.dlarge.unwrap();
    assert!(!payload.contains("email"));
    assert!(payload.contains("\"isActive\":\"true\""));
}

#[test]
fn encode_with_tags_fills_dmedium() {
    let job = Job::create(SystemId::new(), "tagged");
    // two distinct values under one name stay distinct
    let tags = vec![Tag::new("env", "prod"), Tag::new("env", "staging")];
    let row = encode_with_tags(&job, &tags).unwrap();
    assert_eq!(
        row.dmedium.as_deref(),
        Some(r#"[{"name":"env","value":"prod"},{"name":"env","value":"staging"}]"#)
    );
    assert_eq!(decode_tags(&row).unwrap(), tags);
}

#[test]
fn decode_tags_of_empty_column_is_empty() {
    let row = Row::new("gantry.model.Job", "", "{}");
    assert!(decode_tags(&row).unwrap().is_empty());
}

#[test]
fn decode_accepts_snake_case_keys_and_trims_strings() {
    let id = JobId::new();
    let system_id = SystemId::new();
    let payload = format!(
        r#"{{"id":"{}","system_id":"{}","name":"  padded name  ","is_active":"true"}}"#,
        id.simple(),
        system_id.simple()
    );
    let row = Row::new(Job::TYPE_TAG, "{}", payload);
    let job: Job = decode(&row).unwrap();
    assert_eq!(job.id, id);
    assert_eq!(job.system_id, system_id);
    assert_eq!(job.name, "padded name");
    assert!(job.is_active);
}

#[test]
fn decode_applies_row_ver() {
    let job = Job::create(SystemId::new(), "versioned");
    let mut row = encode(&job).unwrap();
    row.ver = Some(7);
    let back: Job = decode(&row).unwrap();
    assert_eq!(back.ver, 7);
}

#[test]
fn registry_fallback_chain() {
    let reg = registry();
    // exact
    assert_eq!(reg.resolve("gantry.model.User").unwrap(), RecordKind::User);
    // case-insensitive
    assert_eq!(reg.resolve("GANTRY.MODEL.USER").unwrap(), RecordKind::User);
    // last dotted segment
    assert_eq!(reg.resolve("User").unwrap(), RecordKind::User);
    assert_eq!(reg.resolve("legacy.ns.User").unwrap(), RecordKind::User);
    // case-insensitive last segment
    assert_eq!(reg.resolve("legacy.ns.user").unwrap(), RecordKind::User);
    // miss
    assert!(matches!(
        reg.resolve("gantry.model.Nope").unwrap_err(),
        StoreError::UnknownType(_)
    ));
}

#[test]
fn decode_with_mismatched_tag_fails() {
    let user = User::create(SystemId::new(), "alice", "hash", "salt");
    let row = encode(&user).unwrap();
    assert!(matches!(decode::<Job>(&row), Err(StoreError::UnknownType(_))));
}

#[test]
fn decode_any_dispatches_on_tag() {
    let job = Job::create(SystemId::new(), "dispatch");
    let row = encode(&job).unwrap();
    match decode_any(&row).unwrap() {
        Record::Job(back) => assert_eq!(back.id, job.id),
        other => panic!("expected Record::Job, got {:?}", other),
    }

    // last-segment tag still finds the variant
    let mut legacy = encode(&job).unwrap();
    legacy.dsmall = Some("Job".to_string());
    assert!(matches!(decode_any(&legacy).unwrap(), Record::Job(_)));
}

#[test]
fn job_spec_snapshot_survives_codec() {
    let mut spec = JobSpec::new(Job::create(SystemId::new(), "snap"));
    spec.tasks.push(gantry_core::Task::create(spec.job.id, "noop"));
    spec.tags.push(Tag::new("env", "prod"));
    spec.normalize();

    let mut execution = Execution::create(
        spec.job.system_id,
        TriggerEventId::new(),
        spec.to_snapshot().unwrap(),
    );
    execution.ver = 1;
    let row = encode(&execution).unwrap();
    let back: Execution = decode(&row).unwrap();
    assert_eq!(back.job_spec().unwrap(), spec);
}
