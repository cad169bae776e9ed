// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone as _;

fn now() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap()
}

#[test]
fn fresh_heartbeat_is_not_stale() {
    let server = ExecutionServer::create(SystemId::new(), now());
    assert!(!server.is_stale(now()));
    assert!(!server.is_stale(now() + chrono::Duration::seconds(30)));
}

#[test]
fn old_heartbeat_is_stale() {
    let thread = WorkerThread::create(ExecutionServerId::new(), now());
    assert!(thread.is_stale(now() + chrono::Duration::seconds(31)));
}

#[test]
fn heartbeat_in_the_future_is_not_stale() {
    let server = ExecutionServer::create(SystemId::new(), now());
    assert!(!server.is_stale(now() - chrono::Duration::seconds(120)));
}

#[test]
fn scheduler_state_records_fired_minutes() {
    let mut state = SchedulerState::create(SystemId::new());
    let schedule = ScheduleId::new();
    assert!(!state.already_fired(schedule, 100));
    state.record_fired(schedule, 100);
    assert!(state.already_fired(schedule, 100));
    assert!(!state.already_fired(schedule, 101));
    // a later bucket replaces the previous one
    state.record_fired(schedule, 101);
    assert!(!state.already_fired(schedule, 100));
}
